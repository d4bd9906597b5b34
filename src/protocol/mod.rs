//! Wire types for the Gemini Live `BidiGenerateContent` stream.
//!
//! Client messages are externally tagged (`{"setup": {...}}`); server messages
//! are a single object whose populated fields say what the frame carries.

pub mod client_messages;
pub mod models;
pub mod server_messages;
