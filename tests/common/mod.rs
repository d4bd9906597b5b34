#![allow(dead_code)]

use async_trait::async_trait;
use gemini_live_bridge::bridge::{Frame, FrameSink, FrameSource, SessionTable, ToolDispatcher};
use gemini_live_bridge::live::{BoxFuture, LiveConnector, LiveSession, LiveSink, LiveSource, ToolRegistry};
use gemini_live_bridge::scheduling::{persona, register_tools, Directory};
use gemini_live_bridge::{Bridge, ClientMessage, Error, FunctionDeclaration, Result, ServerMessage};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const WAIT: Duration = Duration::from_secs(2);

pub async fn recv<T>(rx: &mut UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("channel closed")
}

// Remote side

struct RemoteSink {
    tx: UnboundedSender<ClientMessage>,
    closed: Arc<AtomicBool>,
}

impl LiveSink for RemoteSink {
    fn send(&mut self, message: ClientMessage) -> BoxFuture<'_, Result<()>> {
        let result = if self.closed.load(Ordering::SeqCst) {
            Err(Error::ConnectionClosed(None))
        } else {
            self.tx.send(message).map_err(|_| Error::ConnectionClosed(None))
        };
        Box::pin(async move { result })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.closed.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct RemoteSource {
    rx: UnboundedReceiver<Result<ServerMessage>>,
}

impl LiveSource for RemoteSource {
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<ServerMessage>>> {
        Box::pin(async move { self.rx.recv().await.transpose() })
    }
}

/// Test-side handles of a mocked Live session.
pub struct RemoteEnd {
    pub events: UnboundedSender<Result<ServerMessage>>,
    pub sent: UnboundedReceiver<ClientMessage>,
    pub closed: Arc<AtomicBool>,
}

pub fn remote_pair() -> (LiveSession, RemoteEnd) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let session = LiveSession::new(
        Box::new(RemoteSink {
            tx: sent_tx,
            closed: Arc::clone(&closed),
        }),
        Box::new(RemoteSource { rx: events_rx }),
    );
    (
        session,
        RemoteEnd {
            events: events_tx,
            sent: sent_rx,
            closed,
        },
    )
}

pub struct MockConnector {
    session: Mutex<Option<LiveSession>>,
    failure: Option<String>,
    pub opened_with: Mutex<Option<(String, Vec<String>)>>,
}

impl MockConnector {
    pub fn ready(session: LiveSession) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(Some(session)),
            failure: None,
            opened_with: Mutex::new(None),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(None),
            failure: Some(reason.to_string()),
            opened_with: Mutex::new(None),
        })
    }
}

#[async_trait]
impl LiveConnector for MockConnector {
    async fn open(&self, persona: &str, tools: &[FunctionDeclaration]) -> Result<LiveSession> {
        if let Some(reason) = &self.failure {
            return Err(Error::ConnectionClosed(Some(reason.clone())));
        }
        *self.opened_with.lock() = Some((
            persona.to_string(),
            tools.iter().map(|t| t.name.clone()).collect(),
        ));
        self.session
            .lock()
            .take()
            .ok_or_else(|| Error::Transport("session already opened".into()))
    }
}

// Caller side

#[derive(Default)]
pub struct ClientState {
    pub closed: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writes_after_close: AtomicUsize,
}

struct ClientSink {
    tx: UnboundedSender<Frame>,
    state: Arc<ClientState>,
}

impl FrameSink for ClientSink {
    fn send(&mut self, frame: Frame) -> BoxFuture<'_, Result<()>> {
        let result = if self.state.closed.load(Ordering::SeqCst) {
            self.state.writes_after_close.fetch_add(1, Ordering::SeqCst);
            Err(Error::Transport("socket closed".into()))
        } else if self.state.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Transport("broken pipe".into()))
        } else {
            self.tx.send(frame).map_err(|_| Error::Transport("receiver dropped".into()))
        };
        Box::pin(async move { result })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        self.state.closed.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

struct ClientSource {
    rx: UnboundedReceiver<Result<Frame>>,
}

impl FrameSource for ClientSource {
    fn next_frame(&mut self) -> BoxFuture<'_, Result<Option<Frame>>> {
        Box::pin(async move { self.rx.recv().await.transpose() })
    }
}

/// Test-side handles of a mocked caller socket.
pub struct ClientEnd {
    pub input: UnboundedSender<Result<Frame>>,
    pub output: UnboundedReceiver<Frame>,
    pub state: Arc<ClientState>,
}

impl ClientEnd {
    pub fn send_text(&self, raw: &str) {
        self.input.send(Ok(Frame::Text(raw.to_string()))).unwrap();
    }

    pub fn send_binary(&self, data: Vec<u8>) {
        self.input.send(Ok(Frame::Binary(data.into()))).unwrap();
    }

    /// Next text frame, parsed as JSON.
    pub async fn next_json(&mut self) -> Value {
        match recv(&mut self.output).await {
            Frame::Text(text) => serde_json::from_str(&text).unwrap(),
            Frame::Binary(data) => panic!("expected text frame, got {} bytes", data.len()),
        }
    }
}

pub fn client_pair() -> (Box<dyn FrameSink>, Box<dyn FrameSource>, ClientEnd) {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let state = Arc::new(ClientState::default());
    (
        Box::new(ClientSink {
            tx: output_tx,
            state: Arc::clone(&state),
        }),
        Box::new(ClientSource { rx: input_rx }),
        ClientEnd {
            input: input_tx,
            output: output_rx,
            state,
        },
    )
}

/// A bridge wired to the receptionist tools and `connector`.
pub fn bridge(connector: Arc<dyn LiveConnector>) -> Arc<Bridge> {
    let directory = Arc::new(Directory::seeded());
    let mut registry = ToolRegistry::new();
    register_tools(&mut registry, &directory);
    Arc::new(Bridge::new(
        Arc::new(SessionTable::new()),
        ToolDispatcher::new(Arc::new(registry)),
        connector,
        persona::instruction(&directory),
        persona::GREETING,
    ))
}
