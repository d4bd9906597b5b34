use serde::{Deserialize, Serialize};

use super::models::{Blob, Content, FunctionResponse, GenerationConfig, Tool};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Box<Setup>),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    /// A completed user turn carrying a single text part.
    #[must_use]
    pub fn user_turn(text: impl Into<String>) -> Self {
        Self::ClientContent(ClientContent {
            turns: vec![Content::user_text(text)],
            turn_complete: true,
        })
    }

    #[must_use]
    pub fn audio_chunk(chunk: Blob) -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: vec![chunk],
            audio_stream_end: None,
        })
    }

    /// End of the caller's turn, sent without any media.
    #[must_use]
    pub const fn end_of_turn() -> Self {
        Self::RealtimeInput(RealtimeInput {
            media_chunks: Vec::new(),
            audio_stream_end: Some(true),
        })
    }

    #[must_use]
    pub fn tool_response(responses: Vec<FunctionResponse>) -> Self {
        Self::ToolResponse(ToolResponse {
            function_responses: responses,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::ClientContent(_) => "clientContent",
            Self::RealtimeInput(_) => "realtimeInput",
            Self::ToolResponse(_) => "toolResponse",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Fully qualified model resource, e.g. `models/gemini-...`.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(default)]
    pub media_chunks: Vec<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_stream_end: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::PcmFormat;
    use serde_json::json;

    #[test]
    fn user_turn_serializes_as_client_content() {
        let value = serde_json::to_value(ClientMessage::user_turn("hello")).unwrap();
        assert_eq!(
            value,
            json!({
                "clientContent": {
                    "turns": [{ "role": "user", "parts": [{ "text": "hello" }] }],
                    "turnComplete": true
                }
            })
        );
    }

    #[test]
    fn end_of_turn_keeps_empty_media_list() {
        let value = serde_json::to_value(ClientMessage::end_of_turn()).unwrap();
        assert_eq!(
            value,
            json!({ "realtimeInput": { "mediaChunks": [], "audioStreamEnd": true } })
        );
    }

    #[test]
    fn audio_chunk_carries_input_mime_type() {
        let msg = ClientMessage::audio_chunk(Blob::pcm(PcmFormat::INPUT, vec![1, 2]));
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value["realtimeInput"]["mediaChunks"][0]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert!(value["realtimeInput"].get("audioStreamEnd").is_none());
    }
}
