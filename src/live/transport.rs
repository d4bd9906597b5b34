use crate::protocol::client_messages::ClientMessage;
use crate::protocol::server_messages::ServerMessage;
use crate::Result;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Write half of a remote stream.
pub trait LiveSink: Send {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>>;
    fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// Read half of a remote stream. `Ok(None)` ends the stream.
pub trait LiveSource: Send {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerMessage>>>;
}
