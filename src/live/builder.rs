use crate::protocol::models::DEFAULT_MODEL;
use crate::transport::ws::LIVE_ENDPOINT;
use crate::{Error, Result};
use std::time::Duration;

use super::connector::GeminiConnector;

const DEFAULT_SETUP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct LiveBuilder {
    api_key: Option<String>,
    model: Option<String>,
    voice: Option<String>,
    endpoint: Option<String>,
    setup_timeout: Duration,
}

impl LiveBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            api_key: None,
            model: None,
            voice: None,
            endpoint: None,
            setup_timeout: DEFAULT_SETUP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Override the stream URL. Tests point this at a local server.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub const fn setup_timeout(mut self, timeout: Duration) -> Self {
        self.setup_timeout = timeout;
        self
    }

    /// # Errors
    /// Returns `Error::Config` if the API key is missing or blank.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<GeminiConnector> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is required".to_string()))?;

        Ok(GeminiConnector {
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: self.voice.filter(|v| !v.is_empty()),
            endpoint: self.endpoint.unwrap_or_else(|| LIVE_ENDPOINT.to_string()),
            setup_timeout: self.setup_timeout,
        })
    }
}

impl Default for LiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}
