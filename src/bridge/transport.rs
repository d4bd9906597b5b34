use crate::live::transport::BoxFuture;
use crate::{Error, Result};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::messages::{Frame, OutgoingMessage};

/// Write half of the caller socket.
pub trait FrameSink: Send {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Read half of the caller socket. `Ok(None)` means the caller went away.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>>>;
}

/// Cloneable handle over the caller's write half.
#[derive(Clone)]
pub struct ClientSender {
    inner: Arc<Mutex<Box<dyn FrameSink>>>,
}

impl ClientSender {
    #[must_use]
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// # Errors
    /// Returns an error if the socket write fails.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.inner.lock().await.send(frame).await
    }

    /// # Errors
    /// Returns an error if serialization or the socket write fails.
    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        self.send(message.to_frame()?).await
    }

    /// # Errors
    /// Returns an error if the close frame cannot be written.
    pub async fn close(&self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}

impl FrameSink for SplitSink<WebSocket, Message> {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
        };
        Box::pin(async move { SinkExt::send(self, message).await.map_err(Error::from) })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { SinkExt::close(self).await.map_err(Error::from) })
    }
}

impl FrameSource for SplitStream<WebSocket> {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>>> {
        Box::pin(async move {
            while let Some(message) = self.next().await {
                match message? {
                    Message::Text(text) => return Ok(Some(Frame::Text(text.as_str().to_owned()))),
                    Message::Binary(data) => return Ok(Some(Frame::Binary(data))),
                    Message::Close(_) => return Ok(None),
                    // axum answers pings itself
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            Ok(None)
        })
    }
}
