#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod live;
pub mod protocol;
pub mod scheduling;
pub mod server;
pub mod transport;

pub use bridge::{
    Bridge, CloseReason, ConnectionReport, ConnectionState, Frame, FrameSink, FrameSource,
    SessionRecord, SessionTable, ToolDispatcher,
};
pub use config::Config;
pub use error::{Error, Result};
pub use live::{
    GeminiConnector, LiveBuilder, LiveConnector, LiveEvent, LiveEvents, LiveSender, LiveSession,
    LiveSink, LiveSource, ToolOutcome, ToolRegistry, ToolStatus,
};
pub use protocol::client_messages::ClientMessage;
pub use protocol::models::{Blob, FunctionCall, FunctionDeclaration, FunctionResponse, PcmFormat};
pub use protocol::server_messages::ServerMessage;

use futures::{SinkExt, StreamExt};
use live::transport::BoxFuture;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use transport::ws::WsStream;

const TRACE_LOG_MAX_BYTES: usize = 1024;
/// Largest audio chunk accepted in one `realtimeInput` message.
pub const MAX_INPUT_AUDIO_CHUNK_BYTES: usize = 15 * 1024 * 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

/// A connected Gemini Live stream.
///
/// Thread safety: `LiveClient` is `Send` but not `Sync` because the underlying
/// WebSocket stream is not `Sync`. Split it to send and receive concurrently.
#[must_use]
pub struct LiveClient {
    stream: WsStream,
}

impl LiveClient {
    /// Connect to the Live API at `endpoint`.
    ///
    /// # Errors
    /// Returns an error if the connection fails or if the URL is invalid.
    pub async fn connect(endpoint: &str, api_key: &str) -> Result<Self> {
        let stream = transport::ws::connect(endpoint, api_key).await?;
        Ok(Self { stream })
    }

    /// Split the client into a sender and a receiver for concurrent usage.
    pub fn split(self) -> (LiveClientSender, LiveClientReceiver) {
        let (write, read) = self.stream.split();
        (LiveClientSender { write }, LiveClientReceiver { read })
    }
}

fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

#[allow(clippy::result_large_err)]
fn encode_client_message(message: &ClientMessage) -> Result<String> {
    validate_client_message(message)?;
    let json = serde_json::to_string(message)?;
    tracing::trace!(kind = message.kind(), "Sending message: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
    Ok(json)
}

/// Map one WebSocket frame to a server message.
///
/// Control frames other than close yield `None`; a normal close yields `Some(Ok(None))`.
#[allow(clippy::result_large_err)]
fn decode_server_frame(msg: Message) -> Option<Result<Option<ServerMessage>>> {
    match msg {
        Message::Text(text) => {
            tracing::trace!("Received message: {}", safe_truncate(&text, TRACE_LOG_MAX_BYTES));
            Some(serde_json::from_str::<ServerMessage>(&text).map(Some).map_err(Error::from))
        }
        // The Live API delivers JSON in binary frames as well.
        Message::Binary(data) => {
            tracing::trace!(bytes = data.len(), "Received binary message");
            Some(serde_json::from_slice::<ServerMessage>(&data).map(Some).map_err(Error::from))
        }
        Message::Close(frame) => match frame {
            Some(frame) if frame.code != CloseCode::Normal => {
                tracing::warn!(code = u16::from(frame.code), reason = frame.reason.as_str(), "Live stream closed by server");
                Some(Err(Error::ConnectionClosed(Some(frame.reason.as_str().to_string()))))
            }
            _ => {
                tracing::info!("Live stream closed by server");
                Some(Ok(None))
            }
        },
        _ => None,
    }
}

#[allow(clippy::result_large_err)]
pub(crate) fn validate_client_message(message: &ClientMessage) -> Result<()> {
    match message {
        ClientMessage::RealtimeInput(input) => {
            for chunk in &input.media_chunks {
                if chunk.data.len() > MAX_INPUT_AUDIO_CHUNK_BYTES {
                    return Err(Error::InvalidClientMessage(format!(
                        "realtimeInput chunk exceeds 15MB ({} bytes)",
                        chunk.data.len()
                    )));
                }
                if chunk.mime_type.is_empty() {
                    return Err(Error::InvalidClientMessage(
                        "realtimeInput chunk is missing a mime type".to_string(),
                    ));
                }
            }
        }
        ClientMessage::ToolResponse(response) => {
            if response.function_responses.is_empty() {
                return Err(Error::InvalidClientMessage(
                    "toolResponse requires at least one function response".to_string(),
                ));
            }
        }
        ClientMessage::Setup(setup) => {
            if setup.model.is_empty() {
                return Err(Error::InvalidClientMessage("setup requires a model".to_string()));
            }
        }
        ClientMessage::ClientContent(_) => {}
    }
    Ok(())
}

/// The sending half of a split `LiveClient`.
pub struct LiveClientSender {
    write: futures::stream::SplitSink<WsStream, Message>,
}

impl LiveClientSender {
    /// Send a client message.
    ///
    /// # Errors
    /// Returns an error if validation, serialization or sending fails.
    pub async fn send(&mut self, message: ClientMessage) -> Result<()> {
        let json = encode_client_message(&message)?;
        self.write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a close frame.
    ///
    /// # Errors
    /// Returns an error if the close handshake cannot be started.
    pub async fn close(&mut self) -> Result<()> {
        self.write.close().await?;
        Ok(())
    }
}

impl LiveSink for LiveClientSender {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Self::send(self, message).await })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Self::close(self).await })
    }
}

/// The receiving half of a split `LiveClient`.
///
/// Pings are not answered here; the split sink owns the write side and
/// tungstenite queues the pong on the next write or flush.
pub struct LiveClientReceiver {
    read: futures::stream::SplitStream<WsStream>,
}

impl LiveClientReceiver {
    /// Receive the next server message. `Ok(None)` means the server closed normally.
    ///
    /// # Errors
    /// Returns an error if deserialization fails, the WebSocket fails, or the
    /// server closes the stream with a non-normal close code.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(msg) = self.read.next().await {
            if let Some(decoded) = decode_server_frame(msg?) {
                return decoded;
            }
        }
        Ok(None)
    }
}

impl LiveSource for LiveClientReceiver {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerMessage>>> {
        Box::pin(async move { Self::next_message(self).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_truncate_respects_char_boundary() {
        let s = "ééé";
        let out = safe_truncate(s, 3);
        assert!(out.starts_with('é'));
        assert!(out.contains(TRACE_TRUNCATE_SUFFIX));
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let chunk = Blob::pcm(PcmFormat::INPUT, vec![0; MAX_INPUT_AUDIO_CHUNK_BYTES + 1]);
        let err = validate_client_message(&ClientMessage::audio_chunk(chunk)).unwrap_err();
        assert!(matches!(err, Error::InvalidClientMessage(msg) if msg.contains("exceeds 15MB")));
    }

    #[test]
    fn empty_tool_response_is_rejected() {
        let err = validate_client_message(&ClientMessage::tool_response(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidClientMessage(_)));
    }

    #[test]
    fn binary_frame_is_decoded_as_json() {
        let frame = Message::Binary(br#"{"setupComplete":{}}"#.to_vec().into());
        let decoded = decode_server_frame(frame).unwrap().unwrap().unwrap();
        assert!(decoded.setup_complete.is_some());
    }

    #[test]
    fn abnormal_close_surfaces_reason() {
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        let frame = Message::Close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "API key not valid".into(),
        }));
        let err = decode_server_frame(frame).unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed(Some(reason)) if reason == "API key not valid"));
    }

    #[test]
    fn normal_close_ends_the_stream() {
        let decoded = decode_server_frame(Message::Close(None)).unwrap().unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn pong_frames_are_skipped() {
        assert!(decode_server_frame(Message::Pong(Vec::new().into())).is_none());
    }
}
