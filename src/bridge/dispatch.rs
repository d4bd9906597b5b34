use crate::live::{LiveSender, ToolError, ToolOutcome, ToolRegistry, ToolStatus};
use crate::protocol::models::{FunctionCall, FunctionDeclaration, FunctionResponse};
use crate::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::messages::OutgoingMessage;
use super::transport::ClientSender;

/// Longest wait for the caller to accept a `tool_event` frame.
pub const TOOL_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs remote tool calls against the registry and answers them.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    #[must_use]
    pub const fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.registry.declarations()
    }

    /// Execute one call. Every failure becomes an `error` outcome with a
    /// message that is safe to speak; the raw fault is only logged.
    pub async fn execute(&self, call: &FunctionCall) -> ToolOutcome {
        tracing::info!(tool = %call.name, args = ?call.args, "Tool call requested");
        match self.registry.call(call).await {
            Ok(outcome) => outcome,
            Err(ToolError::Unknown(name)) => {
                tracing::warn!(tool = %name, "Unknown tool requested");
                ToolOutcome::error(format!("Sorry, I don't know how to {name}."))
            }
            Err(err) => {
                tracing::error!(tool = %call.name, error = %err, "Tool call failed");
                ToolOutcome::error(format!(
                    "Sorry, I encountered an error while trying to {}. Please try again.",
                    call.name
                ))
            }
        }
    }

    /// Sentence the model should relay for `outcome`. Never empty unless a
    /// successful tool chose to say nothing.
    #[must_use]
    pub fn spoken_summary(tool: &str, outcome: &ToolOutcome) -> String {
        if outcome.status != ToolStatus::Success && outcome.message.trim().is_empty() {
            return format!("Sorry, there was an error with {tool}.");
        }
        outcome.message.clone()
    }

    /// Execute `call`, tell the caller about it, then answer the remote side.
    ///
    /// The caller notification is best effort and bounded by
    /// [`TOOL_EVENT_TIMEOUT`]. Only a failure to send the tool response on
    /// the remote stream is returned.
    ///
    /// # Errors
    /// Returns an error if the tool response cannot be sent.
    pub async fn dispatch(
        &self,
        call: &FunctionCall,
        remote: &LiveSender,
        client: &ClientSender,
    ) -> Result<ToolOutcome> {
        let outcome = self.execute(call).await;
        let summary = Self::spoken_summary(&call.name, &outcome);
        tracing::info!(tool = %call.name, status = %outcome.status, "Tool call finished");

        let event = OutgoingMessage::ToolEvent {
            tool: call.name.clone(),
            status: outcome.status.to_string(),
            message: summary.clone(),
        };
        match tokio::time::timeout(TOOL_EVENT_TIMEOUT, client.send_message(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(tool = %call.name, error = %err, "Failed to forward tool event");
            }
            Err(_) => {
                tracing::warn!(tool = %call.name, "Caller did not accept tool event in time");
            }
        }

        let response = FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response: json!({
                "output": outcome,
                "spoken_summary": summary,
            }),
        };
        remote.send_tool_response(response).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::messages::Frame;
    use crate::bridge::transport::FrameSink;
    use crate::live::transport::{BoxFuture, LiveSink, LiveSource};
    use crate::live::LiveSession;
    use crate::protocol::client_messages::ClientMessage;
    use crate::protocol::server_messages::ServerMessage;
    use crate::Error;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use tokio::sync::mpsc;

    #[derive(Deserialize, JsonSchema)]
    struct NoArgs {}

    struct RemoteSink(mpsc::UnboundedSender<ClientMessage>);

    impl LiveSink for RemoteSink {
        fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>> {
            let tx = self.0.clone();
            Box::pin(async move { tx.send(message).map_err(|_| Error::ConnectionClosed(None)) })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct IdleSource;

    impl LiveSource for IdleSource {
        fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerMessage>>> {
            Box::pin(futures::future::pending())
        }
    }

    #[derive(Clone, Copy)]
    enum Caller {
        Open,
        Broken,
        Stalled,
    }

    struct ClientSink {
        frames: mpsc::UnboundedSender<Frame>,
        caller: Caller,
    }

    impl FrameSink for ClientSink {
        fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>> {
            let result = match self.caller {
                Caller::Open => self.frames.send(frame).map_err(|_| Error::Transport("gone".into())),
                Caller::Broken => Err(Error::Transport("socket closed".into())),
                Caller::Stalled => return Box::pin(futures::future::pending()),
            };
            Box::pin(async move { result })
        }

        fn close(&mut self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let mut tools = ToolRegistry::new();
        tools.tool("end_call", "Hang up.", |_: NoArgs| async {
            Ok(ToolOutcome::success("Call ended"))
        });
        tools.tool("silent_failure", "Fails quietly.", |_: NoArgs| async {
            Ok(ToolOutcome::error(""))
        });
        ToolDispatcher::new(Arc::new(tools))
    }

    fn call(id: &str, name: &str) -> FunctionCall {
        FunctionCall {
            id: Some(id.into()),
            name: name.into(),
            args: serde_json::Map::new(),
        }
    }

    fn harness(
        caller: Caller,
    ) -> (
        LiveSender,
        mpsc::UnboundedReceiver<ClientMessage>,
        ClientSender,
        mpsc::UnboundedReceiver<Frame>,
    ) {
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let session = LiveSession::new(Box::new(RemoteSink(remote_tx)), Box::new(IdleSource));
        let client = ClientSender::new(Box::new(ClientSink {
            frames: frame_tx,
            caller,
        }));
        (session.sender(), remote_rx, client, frame_rx)
    }

    #[tokio::test]
    async fn unknown_tool_is_a_normal_error_outcome() {
        let outcome = dispatcher().execute(&call("c1", "delete_hospital")).await;
        assert_eq!(outcome.status, ToolStatus::Error);
        assert_eq!(outcome.message, "Sorry, I don't know how to delete_hospital.");
    }

    #[test]
    fn empty_error_message_gets_fallback_summary() {
        let summary = ToolDispatcher::spoken_summary("book_appointment", &ToolOutcome::error(" "));
        assert_eq!(summary, "Sorry, there was an error with book_appointment.");
    }

    #[tokio::test]
    async fn dispatch_notifies_client_then_answers_remote() {
        let (remote, mut remote_rx, client, mut frame_rx) = harness(Caller::Open);
        dispatcher()
            .dispatch(&call("c7", "end_call"), &remote, &client)
            .await
            .unwrap();

        let Frame::Text(text) = frame_rx.recv().await.unwrap() else {
            panic!("expected a text frame");
        };
        let event: OutgoingMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(
            event,
            OutgoingMessage::ToolEvent {
                tool: "end_call".into(),
                status: "success".into(),
                message: "Call ended".into(),
            }
        );

        let ClientMessage::ToolResponse(response) = remote_rx.recv().await.unwrap() else {
            panic!("expected a tool response");
        };
        let answer = &response.function_responses[0];
        assert_eq!(answer.id.as_deref(), Some("c7"));
        assert_eq!(answer.response["output"]["status"], "success");
        assert_eq!(answer.response["spoken_summary"], "Call ended");
    }

    #[tokio::test]
    async fn client_notification_failure_does_not_block_response() {
        let (remote, mut remote_rx, client, _frame_rx) = harness(Caller::Broken);
        let outcome = dispatcher()
            .dispatch(&call("c2", "silent_failure"), &remote, &client)
            .await
            .unwrap();

        assert_eq!(outcome.status, ToolStatus::Error);
        let ClientMessage::ToolResponse(response) = remote_rx.recv().await.unwrap() else {
            panic!("expected a tool response");
        };
        assert_eq!(
            response.function_responses[0].response["spoken_summary"],
            "Sorry, there was an error with silent_failure."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_caller_does_not_hold_back_response() {
        let (remote, mut remote_rx, client, _frame_rx) = harness(Caller::Stalled);
        let started = tokio::time::Instant::now();
        let outcome = dispatcher()
            .dispatch(&call("c3", "end_call"), &remote, &client)
            .await
            .unwrap();

        assert_eq!(outcome.status, ToolStatus::Success);
        assert!(started.elapsed() >= TOOL_EVENT_TIMEOUT);
        let ClientMessage::ToolResponse(response) = remote_rx.recv().await.unwrap() else {
            panic!("expected a tool response");
        };
        assert_eq!(response.function_responses[0].id.as_deref(), Some("c3"));
    }
}
