//! Development server implementation.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::services::ServeDir;

use kiln_pipeline::config::ServerSection;
use kiln_pipeline::{AssetClass, Pipeline};

use crate::livereload::{
    inject_client, livereload_client_script, ReloadHub, ReloadMessage, LIVERELOAD_PATH,
    LIVERELOAD_SCRIPT_PATH,
};
use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Path opened in the browser
    pub start_path: String,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self::from(&ServerSection::default())
    }
}

impl From<&ServerSection> for DevServerConfig {
    fn from(section: &ServerSection) -> Self {
        Self {
            port: section.port,
            host: section.host.clone(),
            open: section.open,
            start_path: section.start_path.clone(),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Development server: serves the output directory, rebuilds on change and
/// tells connected browsers to reload.
pub struct DevServer {
    config: DevServerConfig,
    pipeline: Arc<Pipeline>,
}

impl DevServer {
    /// Create a new development server around an already-built pipeline.
    pub fn new(config: DevServerConfig, pipeline: Arc<Pipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr_str = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|_| ServerError::InvalidAddress(addr_str.clone()))?;

        let hub = ReloadHub::new();

        let (watcher, mut rx) = FileWatcher::new(self.pipeline.layout())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        // Spawn file watch handler
        let pipeline = Arc::clone(&self.pipeline);
        let watch_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&pipeline, &watch_hub, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(&self.pipeline.layout().dest, hub);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!(
            "http://{}/{}",
            addr,
            self.config.start_path.trim_start_matches('/')
        );
        tracing::info!("Serving {} at {}", self.pipeline.layout().dest.display(), url);

        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Build the dev server router for an output directory.
pub fn router(root: &Path, hub: ReloadHub) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(ws_handler))
        .route(LIVERELOAD_SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_livereload))
        .with_state(hub)
}

/// Message sent to browsers once a class has been rebuilt.
fn reload_message(class: AssetClass) -> ReloadMessage {
    match class {
        AssetClass::Styles => ReloadMessage::Css,
        _ => ReloadMessage::Reload,
    }
}

/// Rebuild the changed class off the async runtime, then notify browsers.
async fn handle_watch_event(pipeline: &Arc<Pipeline>, hub: &ReloadHub, event: WatchEvent) {
    // The lint pass rewrites stylesheets in place; those writes come back here
    if event.class == AssetClass::Styles && event.paths.iter().all(|p| pipeline.is_linted(p)) {
        tracing::debug!("Skipping lint rewrite of {} stylesheet(s)", event.paths.len());
        return;
    }

    let names: Vec<String> = event
        .paths
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    tracing::info!("{} changed ({:?}): {}", event.class, event.kind, names.join(", "));

    let class = event.class;
    let worker = Arc::clone(pipeline);
    match tokio::task::spawn_blocking(move || worker.run_class(class)).await {
        Ok(reports) => {
            let failed: usize = reports.iter().map(|r| r.failed).sum();
            if failed > 0 {
                tracing::warn!("Rebuilt {} with {} failures", class, failed);
            }
            hub.send(reload_message(class));
        }
        Err(e) => tracing::error!("Rebuild of {} did not finish: {}", class, e),
    }
}

/// Inject the live reload client into every HTML response.
async fn inject_livereload(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read page body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    // Forward reload messages to the client
    while let Some(msg) = next_message(&mut rx).await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

/// Next message for one client. A client that fell behind skips ahead.
async fn next_message(rx: &mut broadcast::Receiver<ReloadMessage>) -> Option<ReloadMessage> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client missed {} messages", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Handler for the live reload client script.
async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        livereload_client_script(),
    )
}
