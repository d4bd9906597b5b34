use crate::protocol::models::DEFAULT_MODEL;
use crate::transport::ws::LIVE_ENDPOINT;
use crate::{Error, GeminiConnector, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ORIGINS: &str =
    "http://localhost:3000,http://localhost:3001,https://voice-ai-doctor-appointment.vercel.app";

/// Voice gateway between browser callers and the Gemini Live API.
#[derive(Parser, Debug, Clone)]
#[command(name = "gemini-live-bridge", version, about, long_about = None)]
pub struct Config {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Live model name, with or without the `models/` prefix
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Prebuilt voice for model speech
    #[arg(long, env = "GEMINI_VOICE")]
    pub voice: Option<String>,

    /// Live WebSocket endpoint
    #[arg(long, env = "GEMINI_LIVE_ENDPOINT", default_value = LIVE_ENDPOINT)]
    pub live_endpoint: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Comma separated list of origins allowed by CORS
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = DEFAULT_ORIGINS)]
    pub allowed_origins: String,

    /// Seconds to wait for the Live session to confirm setup
    #[arg(long, env = "LIVE_SETUP_TIMEOUT_SECS", default_value_t = 10)]
    pub setup_timeout_secs: u64,

    /// Idle seconds after which a session record is swept
    #[arg(long, env = "SESSION_MAX_AGE_SECS", default_value_t = 3600)]
    pub session_max_age_secs: u64,

    /// Seconds between session sweeps
    #[arg(long, env = "SESSION_SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub session_sweep_interval_secs: u64,
}

impl Config {
    /// # Errors
    /// Returns an error if host and port do not form a socket address.
    #[allow(clippy::result_large_err)]
    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address {}:{}: {e}", self.host, self.port)))
    }

    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    #[must_use]
    pub const fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    /// Build the Live connector described by this configuration.
    ///
    /// # Errors
    /// Returns `Error::Config` if the API key is blank.
    #[allow(clippy::result_large_err)]
    pub fn connector(&self) -> Result<GeminiConnector> {
        let mut builder = GeminiConnector::builder()
            .api_key(&self.gemini_api_key)
            .model(&self.model)
            .endpoint(&self.live_endpoint)
            .setup_timeout(Duration::from_secs(self.setup_timeout_secs));
        if let Some(voice) = &self.voice {
            builder = builder.voice(voice);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["gemini-live-bridge"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--gemini-api-key",
            "k",
            "--port",
            "9100",
            "--allowed-origins",
            "https://a.example, ,https://b.example",
        ]);
        assert_eq!(config.port, 9100);
        assert_eq!(config.allowed_origins(), ["https://a.example", "https://b.example"]);
        assert_eq!(config.address().unwrap().port(), 9100);
    }

    #[test]
    fn blank_key_fails_connector_build() {
        let config = parse(&["--gemini-api-key", " "]);
        assert!(matches!(config.connector(), Err(Error::Config(_))));
    }

    #[test]
    fn connector_uses_configured_model() {
        let config = parse(&["--gemini-api-key", "k", "--model", "gemini-live-test"]);
        assert_eq!(config.connector().unwrap().model(), "gemini-live-test");
        assert_eq!(config.session_max_age(), Duration::from_secs(config.session_max_age_secs));
    }
}
