//! Caller-facing side of the gateway.
//!
//! `Bridge::serve` owns one caller connection: it opens a Live session, greets
//! the caller, then runs an inbound and an outbound pump until either ends.

mod connection;
mod dispatch;
pub mod messages;
mod sessions;
pub mod transport;

pub use connection::{Bridge, CloseReason, ConnectionReport, ConnectionState};
pub use dispatch::{ToolDispatcher, TOOL_EVENT_TIMEOUT};
pub use messages::{Frame, IncomingMessage, OutgoingMessage};
pub use sessions::{SessionRecord, SessionTable, Speaker, Turn};
pub use transport::{ClientSender, FrameSink, FrameSource};
