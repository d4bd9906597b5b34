//! HTTP surface: health and roster endpoints plus the `/voice` WebSocket.

use crate::bridge::{Bridge, SessionTable, ToolDispatcher};
use crate::live::{LiveConnector, ToolRegistry};
use crate::scheduling::{persona, register_tools, Directory};
use crate::{Config, Result};
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub struct AppState {
    pub bridge: Bridge,
    pub directory: Arc<Directory>,
    pub model: String,
    pub gemini_configured: bool,
}

impl AppState {
    /// Wire the receptionist domain to `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn LiveConnector>, model: impl Into<String>, gemini_configured: bool) -> Self {
        let directory = Arc::new(Directory::seeded());
        let mut registry = ToolRegistry::new();
        register_tools(&mut registry, &directory);

        let bridge = Bridge::new(
            Arc::new(SessionTable::new()),
            ToolDispatcher::new(Arc::new(registry)),
            connector,
            persona::instruction(&directory),
            persona::GREETING,
        );

        Self {
            bridge,
            directory,
            model: model.into(),
            gemini_configured,
        }
    }

    /// # Errors
    /// Returns an error if the configuration does not describe a usable connector.
    #[allow(clippy::result_large_err)]
    pub fn from_config(config: &Config) -> Result<Self> {
        let connector = config.connector()?;
        let model = connector.model().to_string();
        Ok(Self::new(Arc::new(connector), model, true))
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionTable> {
        self.bridge.sessions()
    }
}

pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/doctors", get(doctors))
        .route("/health", get(health))
        .route("/voice", get(voice_handler))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Voice AI Hospital Assistant API", "status": "healthy" }))
}

async fn doctors(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "doctors": state.directory.doctor_names() }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "gemini_configured": state.gemini_configured,
        "active_sessions": state.sessions().len(),
        "model": state.model,
    }))
}

async fn voice_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_voice_socket(socket, state))
}

async fn handle_voice_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = format!("session_{}", Uuid::new_v4().simple());
    let (sender, receiver) = socket.split();
    let report = state
        .bridge
        .serve(session_id, Box::new(sender), Box::new(receiver))
        .await;
    tracing::debug!(session_id = %report.session_id, states = ?report.states, "Connection closed");
}

/// Periodically drop idle session records.
pub fn spawn_session_sweeper(
    sessions: Arc<SessionTable>,
    every: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.sweep(max_age);
            tracing::debug!(removed, remaining = sessions.len(), "Session sweep finished");
        }
    })
}

/// Run the gateway until ctrl-c.
///
/// # Errors
/// Returns an error if the configuration is invalid or the listener fails.
pub async fn serve(config: Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let sweeper = spawn_session_sweeper(
        Arc::clone(state.sessions()),
        config.sweep_interval(),
        config.session_max_age(),
    );

    let app = router(state, &config.allowed_origins());
    let address = config.address()?;
    let listener = TcpListener::bind(address).await?;
    tracing::info!(%address, model = %config.model, "Voice gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Voice gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
