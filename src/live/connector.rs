use crate::protocol::client_messages::{ClientMessage, Setup};
use crate::protocol::models::{Content, FunctionDeclaration, GenerationConfig, Tool};
use crate::{Error, LiveClient, LiveClientReceiver, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::builder::LiveBuilder;
use super::session::LiveSession;

/// Opens one remote session per caller connection.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open a session configured with `persona` and `tools` and wait until the
    /// remote side confirms it is ready.
    async fn open(&self, persona: &str, tools: &[FunctionDeclaration]) -> Result<LiveSession>;
}

/// Connector for the Gemini Live `BidiGenerateContent` stream.
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) voice: Option<String>,
    pub(crate) endpoint: String,
    pub(crate) setup_timeout: Duration,
}

impl GeminiConnector {
    #[must_use]
    pub fn builder() -> LiveBuilder {
        LiveBuilder::new()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn setup(&self, persona: &str, tools: &[FunctionDeclaration]) -> Setup {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![Tool {
                function_declarations: tools.to_vec(),
            }]
        };
        Setup {
            model,
            generation_config: Some(GenerationConfig::audio(self.voice.as_deref())),
            system_instruction: Some(Content::instruction(persona)),
            tools,
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn open(&self, persona: &str, tools: &[FunctionDeclaration]) -> Result<LiveSession> {
        let client = LiveClient::connect(&self.endpoint, &self.api_key).await?;
        let (mut sender, mut receiver) = client.split();

        sender
            .send(ClientMessage::Setup(Box::new(self.setup(persona, tools))))
            .await?;

        tokio::time::timeout(self.setup_timeout, wait_for_setup(&mut receiver))
            .await
            .map_err(|_| Error::Timeout("setupComplete"))??;

        tracing::info!(model = %self.model, tools = tools.len(), "Live session ready");
        Ok(LiveSession::new(Box::new(sender), Box::new(receiver)))
    }
}

async fn wait_for_setup(receiver: &mut LiveClientReceiver) -> Result<()> {
    loop {
        match receiver.next_message().await? {
            Some(message) if message.setup_complete.is_some() => return Ok(()),
            Some(_) => tracing::debug!("Skipping message received before setupComplete"),
            None => return Err(Error::ConnectionClosed(None)),
        }
    }
}
