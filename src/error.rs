use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Client transport error: {0}")]
    Transport(String),

    /// The remote stream closed. Carries the close reason when the peer sent one.
    #[error("The connection was closed{}", .0.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    ConnectionClosed(Option<String>),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Invalid client message: {0}")]
    InvalidClientMessage(String),

    #[error("Tool failed: {0}")]
    Tool(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<axum::Error> for Error {
    fn from(err: axum::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
