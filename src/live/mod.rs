//! Remote session adapter for the Gemini Live API.
//!
//! A `LiveConnector` opens one `LiveSession` per caller. The session splits
//! into a cloneable `LiveSender` and a `LiveEvents` reader so that two pumps
//! can share it.

mod builder;
mod connector;
pub mod events;
mod session;
mod tools;
pub mod transport;

pub use builder::LiveBuilder;
pub use connector::{GeminiConnector, LiveConnector};
pub use events::{LiveEvent, TextPart};
pub use session::{LiveEvents, LiveSender, LiveSession};
pub use tools::{gemini_schema, ToolError, ToolOutcome, ToolRegistry, ToolStatus};
pub use transport::{BoxFuture, LiveSink, LiveSource};
