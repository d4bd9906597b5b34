use crate::live::{LiveConnector, LiveEvents, LiveSender};
use crate::protocol::models::PcmFormat;
use crate::Error;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

use super::dispatch::ToolDispatcher;
use super::messages::{Frame, IncomingMessage, OutgoingMessage};
use super::sessions::{SessionTable, Speaker, Turn};
use super::transport::{ClientSender, FrameSink, FrameSource};

/// Lifecycle of one caller connection. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Greeting,
    Steady,
    Closing,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Greeting)
                | (Self::Greeting, Self::Steady)
                | (Self::Connecting | Self::Greeting | Self::Steady, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnected,
    ClientFault(String),
    ClientWriteFailed(String),
    RemoteEnded,
    RemoteFault(String),
    OpenFailed(String),
    GreetingFailed(String),
    Internal(String),
}

impl CloseReason {
    /// Whether the caller socket can still take a frame.
    #[must_use]
    pub const fn client_writable(&self) -> bool {
        !matches!(
            self,
            Self::ClientDisconnected | Self::ClientFault(_) | Self::ClientWriteFailed(_)
        )
    }

    /// Terminal `error` frame text for the caller, if one should be sent.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::ClientDisconnected | Self::ClientFault(_) | Self::ClientWriteFailed(_) => None,
            Self::RemoteEnded => Some("The assistant session has ended.".to_string()),
            Self::RemoteFault(reason)
            | Self::OpenFailed(reason)
            | Self::GreetingFailed(reason)
            | Self::Internal(reason) => {
                Some(format!("Sorry, there was a connection error: {reason}"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionReport {
    pub session_id: String,
    pub reason: CloseReason,
    /// Every state the connection passed through, in order.
    pub states: Vec<ConnectionState>,
}

struct StateTracker<'a> {
    session_id: &'a str,
    states: Vec<ConnectionState>,
}

impl<'a> StateTracker<'a> {
    fn new(session_id: &'a str) -> Self {
        Self {
            session_id,
            states: vec![ConnectionState::Connecting],
        }
    }

    fn current(&self) -> ConnectionState {
        self.states
            .last()
            .copied()
            .unwrap_or(ConnectionState::Connecting)
    }

    fn advance(&mut self, next: ConnectionState) {
        let current = self.current();
        if current == next {
            return;
        }
        if current.can_advance_to(next) {
            tracing::debug!(session_id = self.session_id, from = ?current, to = ?next, "Connection state changed");
            self.states.push(next);
        } else {
            tracing::warn!(session_id = self.session_id, from = ?current, to = ?next, "Ignoring invalid state transition");
        }
    }
}

/// Bridges caller sockets to remote Live sessions.
pub struct Bridge {
    sessions: Arc<SessionTable>,
    dispatcher: ToolDispatcher,
    connector: Arc<dyn LiveConnector>,
    persona: String,
    greeting: String,
}

impl Bridge {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionTable>,
        dispatcher: ToolDispatcher,
        connector: Arc<dyn LiveConnector>,
        persona: impl Into<String>,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            dispatcher,
            connector,
            persona: persona.into(),
            greeting: greeting.into(),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Drive one caller connection from accept to teardown.
    ///
    /// Never fails; the outcome is described by the returned report.
    pub async fn serve(
        &self,
        session_id: String,
        sink: Box<dyn FrameSink>,
        source: Box<dyn FrameSource>,
    ) -> ConnectionReport {
        let mut state = StateTracker::new(&session_id);
        self.sessions.create(&session_id);
        let client = ClientSender::new(sink);
        tracing::info!(session_id = %session_id, "Caller connected");

        let (reason, remote) = self.run(&session_id, &mut state, &client, source).await;

        state.advance(ConnectionState::Closing);
        if reason.client_writable() {
            if let Some(message) = reason.error_message() {
                if let Err(err) = client.send_message(&OutgoingMessage::error(message)).await {
                    tracing::debug!(session_id = %session_id, error = %err, "Could not deliver terminal error frame");
                }
            }
        }
        if let Some(remote) = remote {
            if let Err(err) = remote.close().await {
                tracing::debug!(session_id = %session_id, error = %err, "Live stream close failed");
            }
        }
        if reason.client_writable() {
            if let Err(err) = client.close().await {
                tracing::debug!(session_id = %session_id, error = %err, "Caller socket close failed");
            }
        }
        state.advance(ConnectionState::Closed);

        tracing::info!(session_id = %session_id, reason = ?reason, "Cleaning up session");
        ConnectionReport {
            reason,
            states: state.states,
            session_id,
        }
    }

    async fn run(
        &self,
        session_id: &str,
        state: &mut StateTracker<'_>,
        client: &ClientSender,
        source: Box<dyn FrameSource>,
    ) -> (CloseReason, Option<LiveSender>) {
        let live = match self
            .connector
            .open(&self.persona, &self.dispatcher.declarations())
            .await
        {
            Ok(live) => live,
            Err(err) => {
                tracing::error!(session_id, error = %err, "Failed to open live session");
                return (CloseReason::OpenFailed(err.to_string()), None);
            }
        };
        tracing::info!(session_id, "Live session started");
        state.advance(ConnectionState::Greeting);

        let (remote, events) = live.into_parts();
        if let Err(err) = remote.send_turn(&self.greeting).await {
            tracing::error!(session_id, error = %err, "Failed to send greeting turn");
            return (CloseReason::GreetingFailed(err.to_string()), Some(remote));
        }
        state.advance(ConnectionState::Steady);

        let link = Link {
            session_id: session_id.to_string(),
            sessions: Arc::clone(&self.sessions),
            remote: remote.clone(),
            client: client.clone(),
        };
        let reason = link
            .supervise(source, events, self.dispatcher.clone(), state)
            .await;
        (reason, Some(remote))
    }
}

/// Handles shared by both pumps of one connection.
#[derive(Clone)]
struct Link {
    session_id: String,
    sessions: Arc<SessionTable>,
    remote: LiveSender,
    client: ClientSender,
}

impl Link {
    /// Run both pumps until the first one finishes, then cancel and join the other.
    ///
    /// The pumps live in a `JoinSet`, so dropping this future aborts them and
    /// releases the remote and caller handles they hold.
    async fn supervise(
        self,
        source: Box<dyn FrameSource>,
        events: LiveEvents,
        dispatcher: ToolDispatcher,
        state: &mut StateTracker<'_>,
    ) -> CloseReason {
        let mut pumps = JoinSet::new();
        let inbound = self.clone();
        pumps.spawn(async move { ("inbound", inbound.inbound(source).await) });
        let outbound = self.clone();
        pumps.spawn(async move { ("outbound", outbound.outbound(events, dispatcher).await) });

        let reason = match pumps.join_next().await {
            Some(Ok((pump, reason))) => {
                tracing::debug!(session_id = %self.session_id, pump, reason = ?reason, "Pump finished first");
                reason
            }
            Some(Err(err)) => pump_failure(&err),
            None => CloseReason::Internal("no pump was running".to_string()),
        };
        state.advance(ConnectionState::Closing);

        pumps.abort_all();
        while let Some(late) = pumps.join_next().await {
            match late {
                Ok((pump, reason)) => tracing::debug!(session_id = %self.session_id, pump, reason = ?reason, "Second pump finished before cancellation"),
                Err(err) if err.is_cancelled() => {}
                Err(err) => tracing::error!(session_id = %self.session_id, error = %err, "Second pump panicked"),
            }
        }
        reason
    }

    async fn inbound(self, mut source: Box<dyn FrameSource>) -> CloseReason {
        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::info!(session_id = %self.session_id, "WebSocket disconnected");
                    return CloseReason::ClientDisconnected;
                }
                Err(err) => {
                    tracing::error!(session_id = %self.session_id, error = %err, "Error reading from caller");
                    return CloseReason::ClientFault(err.to_string());
                }
            };
            if !self.sessions.touch(&self.session_id) {
                self.sessions.create(&self.session_id);
            }

            let sent = match frame {
                Frame::Binary(data) if data.is_empty() => continue,
                Frame::Binary(data) => {
                    tracing::trace!(session_id = %self.session_id, bytes = data.len(), "Forwarding caller audio");
                    self.remote.send_audio(data.to_vec()).await
                }
                Frame::Text(raw) => match IncomingMessage::parse(&raw) {
                    Ok(IncomingMessage::Text { message }) => {
                        if message.trim().is_empty() {
                            continue;
                        }
                        self.sessions
                            .append_turn(&self.session_id, Turn::new(Speaker::Caller, message.as_str()));
                        self.remote.send_turn(&message).await
                    }
                    Ok(IncomingMessage::AudioEnd) => self.remote.send_end_of_turn().await,
                    Ok(IncomingMessage::Unknown) => {
                        tracing::debug!(session_id = %self.session_id, "Unsupported payload type from caller");
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(session_id = %self.session_id, error = %err, "Dropping malformed text payload");
                        continue;
                    }
                },
            };

            match sent {
                Ok(()) => {}
                Err(Error::InvalidClientMessage(reason)) => {
                    tracing::warn!(session_id = %self.session_id, reason = %reason, "Dropping caller input the remote would reject");
                }
                Err(err) => {
                    tracing::error!(session_id = %self.session_id, error = %err, "Failed to forward caller input");
                    return CloseReason::RemoteFault(err.to_string());
                }
            }
        }
    }

    async fn outbound(self, mut events: LiveEvents, dispatcher: ToolDispatcher) -> CloseReason {
        let mut format_announced = false;
        loop {
            let mut event = match events.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    tracing::info!(session_id = %self.session_id, "Live session ended");
                    return CloseReason::RemoteEnded;
                }
                Err(err) => {
                    tracing::error!(session_id = %self.session_id, error = %err, "Error handling live response");
                    return CloseReason::RemoteFault(err.to_string());
                }
            };

            if event.setup_complete {
                tracing::debug!(session_id = %self.session_id, "Live setup complete");
            }

            for call in &event.tool_calls {
                if let Err(err) = dispatcher.dispatch(call, &self.remote, &self.client).await {
                    tracing::error!(session_id = %self.session_id, tool = %call.name, error = %err, "Failed to send tool response");
                    return CloseReason::RemoteFault(err.to_string());
                }
            }

            if let Some(audio) = event.audio.take() {
                if !format_announced {
                    let announce = OutgoingMessage::audio_format(PcmFormat::OUTPUT);
                    if let Err(err) = self.client.send_message(&announce).await {
                        return self.write_failed(&err);
                    }
                    format_announced = true;
                }
                if let Err(err) = self.client.send(Frame::Binary(audio.into())).await {
                    return self.write_failed(&err);
                }
            }

            if let Some(text) = event.transcript() {
                tracing::info!(session_id = %self.session_id, text = %text, "Assistant transcript");
                self.sessions
                    .append_turn(&self.session_id, Turn::new(Speaker::Assistant, text.as_str()));
                let transcript = OutgoingMessage::Transcript { message: text };
                if let Err(err) = self.client.send_message(&transcript).await {
                    return self.write_failed(&err);
                }
            }

            if event.interrupted {
                tracing::debug!(session_id = %self.session_id, "Model turn interrupted");
            }
            if !event.cancelled_calls.is_empty() {
                tracing::debug!(session_id = %self.session_id, ids = ?event.cancelled_calls, "Tool calls cancelled by remote");
            }
            if let Some(time_left) = &event.go_away {
                tracing::warn!(session_id = %self.session_id, time_left = %time_left, "Live service is going away");
            }
        }
    }

    fn write_failed(&self, err: &crate::Error) -> CloseReason {
        tracing::error!(session_id = %self.session_id, error = %err, "Failed to write to caller");
        CloseReason::ClientWriteFailed(err.to_string())
    }
}

fn pump_failure(err: &JoinError) -> CloseReason {
    tracing::error!(error = %err, "Pump task failed");
    CloseReason::Internal("internal bridge failure".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_only_move_forward() {
        use ConnectionState::{Closed, Closing, Connecting, Greeting, Steady};
        assert!(Connecting.can_advance_to(Greeting));
        assert!(Greeting.can_advance_to(Steady));
        assert!(Steady.can_advance_to(Closing));
        assert!(Connecting.can_advance_to(Closing));
        assert!(Closing.can_advance_to(Closed));

        assert!(!Closing.can_advance_to(Steady));
        assert!(!Closed.can_advance_to(Steady));
        assert!(!Steady.can_advance_to(Greeting));
        assert!(!Connecting.can_advance_to(Steady));
    }

    #[test]
    fn tracker_ignores_invalid_transitions() {
        let mut tracker = StateTracker::new("s");
        tracker.advance(ConnectionState::Greeting);
        tracker.advance(ConnectionState::Steady);
        tracker.advance(ConnectionState::Closing);
        tracker.advance(ConnectionState::Closing);
        tracker.advance(ConnectionState::Steady);
        tracker.advance(ConnectionState::Closed);

        assert_eq!(
            tracker.states,
            [
                ConnectionState::Connecting,
                ConnectionState::Greeting,
                ConnectionState::Steady,
                ConnectionState::Closing,
                ConnectionState::Closed,
            ]
        );
    }

    #[test]
    fn caller_side_failures_get_no_error_frame() {
        assert_eq!(CloseReason::ClientDisconnected.error_message(), None);
        assert!(!CloseReason::ClientWriteFailed("x".into()).client_writable());
        assert_eq!(
            CloseReason::OpenFailed("refused".into()).error_message().as_deref(),
            Some("Sorry, there was a connection error: refused")
        );
        assert_eq!(
            CloseReason::RemoteEnded.error_message().as_deref(),
            Some("The assistant session has ended.")
        );
    }
}
