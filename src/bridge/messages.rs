use crate::protocol::models::PcmFormat;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single frame on the caller-facing socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

/// Control messages the caller may send as text frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// A typed user turn.
    Text {
        #[serde(alias = "content")]
        message: String,
    },
    /// The caller stopped speaking.
    AudioEnd,
    #[serde(other)]
    Unknown,
}

impl IncomingMessage {
    /// # Errors
    /// Returns the decode error for non-JSON input or a malformed known variant.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Messages sent to the caller as text frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    AudioFormat {
        encoding: String,
        sample_rate: u32,
        channels: u16,
    },
    Transcript {
        message: String,
    },
    ToolEvent {
        tool: String,
        status: String,
        message: String,
    },
    Error {
        message: String,
    },
}

impl OutgoingMessage {
    #[must_use]
    pub fn audio_format(format: PcmFormat) -> Self {
        Self::AudioFormat {
            encoding: "pcm16".to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// # Errors
    /// Returns an error if serialization fails.
    #[allow(clippy::result_large_err)]
    pub fn to_frame(&self) -> crate::Result<Frame> {
        Ok(Frame::Text(serde_json::to_string(self)?))
    }
}
