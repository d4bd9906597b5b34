use crate::protocol::client_messages::ClientMessage;
use crate::protocol::models::{Blob, FunctionResponse, PcmFormat};
use crate::Result;

use super::events::LiveEvent;
use super::transport::{LiveSink, LiveSource};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An established remote session, ready to be split between two pumps.
pub struct LiveSession {
    sender: LiveSender,
    events: LiveEvents,
}

impl LiveSession {
    #[must_use]
    pub fn new(sink: Box<dyn LiveSink>, source: Box<dyn LiveSource>) -> Self {
        Self {
            sender: LiveSender {
                inner: Arc::new(Mutex::new(sink)),
            },
            events: LiveEvents { source },
        }
    }

    #[must_use]
    pub fn sender(&self) -> LiveSender {
        self.sender.clone()
    }

    #[must_use]
    pub fn into_parts(self) -> (LiveSender, LiveEvents) {
        (self.sender, self.events)
    }
}

/// Cloneable write handle. All clones share one lock so whole messages
/// never interleave on the wire.
#[derive(Clone)]
pub struct LiveSender {
    inner: Arc<Mutex<Box<dyn LiveSink>>>,
}

impl LiveSender {
    /// Send a raw protocol message. Messages the remote would reject are
    /// refused with `Error::InvalidClientMessage` before the sink sees them.
    ///
    /// # Errors
    /// Returns an error if validation or the underlying send fails.
    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        crate::validate_client_message(&message)?;
        let mut sink = self.inner.lock().await;
        sink.send(message).await
    }

    /// Send a complete user turn made of one text part.
    ///
    /// # Errors
    /// Returns an error if the send fails.
    pub async fn send_turn(&self, text: &str) -> Result<()> {
        self.send(ClientMessage::user_turn(text)).await
    }

    /// Forward one chunk of caller audio, tagged as 16 kHz PCM.
    ///
    /// # Errors
    /// Returns an error if the send fails.
    pub async fn send_audio(&self, pcm: Vec<u8>) -> Result<()> {
        self.send(ClientMessage::audio_chunk(Blob::pcm(PcmFormat::INPUT, pcm)))
            .await
    }

    /// # Errors
    /// Returns an error if the send fails.
    pub async fn send_end_of_turn(&self) -> Result<()> {
        self.send(ClientMessage::end_of_turn()).await
    }

    /// # Errors
    /// Returns an error if the send fails.
    pub async fn send_tool_response(&self, response: FunctionResponse) -> Result<()> {
        self.send(ClientMessage::tool_response(vec![response])).await
    }

    /// Close the remote stream.
    ///
    /// # Errors
    /// Returns an error if the close handshake cannot be started.
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.inner.lock().await;
        sink.close().await
    }
}

/// Read half of a remote session.
pub struct LiveEvents {
    source: Box<dyn LiveSource>,
}

impl LiveEvents {
    /// Await the next event. `Ok(None)` means the remote ended the session.
    ///
    /// # Errors
    /// Returns an error if the stream faults or a frame cannot be decoded.
    pub async fn next_event(&mut self) -> Result<Option<LiveEvent>> {
        Ok(self.source.next_message().await?.map(LiveEvent::from_server))
    }

    /// Consume into a stream of events. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<LiveEvent>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut events = state?;
            match events.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(events))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
