//! Artifact server.
//!
//! Serves the artifact directory over plain HTTP for the display to download.
//! It knows nothing about synthesis; whatever is in the directory at request
//! time is what gets served.
//!
//! # Example
//!
//! ```ignore
//! use announce_bridge::server::ArtifactServer;
//! use announce_common::shutdown_channel;
//!
//! let (shutdown, listener) = shutdown_channel();
//! let server = ArtifactServer::new("announcements", 8000).bind().await?;
//! tokio::spawn(server.serve(listener));
//! ```

use announce_common::error::ServerError;
use announce_common::shutdown::ShutdownListener;
use announce_speech::retention::{ArtifactPattern, count_artifacts};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Static file server over the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactServer {
    dir: PathBuf,
    port: u16,
    pattern: ArtifactPattern,
}

struct ServerState {
    dir: PathBuf,
    pattern: ArtifactPattern,
}

/// Body of `GET /healthz`.
#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    artifacts: usize,
}

impl ArtifactServer {
    /// Serve `dir` on `port` (all interfaces).
    pub fn new(dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            dir: dir.into(),
            port,
            pattern: ArtifactPattern::default(),
        }
    }

    /// Files counted as artifacts by `/healthz`.
    pub fn with_pattern(mut self, pattern: ArtifactPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Build the router: `/healthz` plus static files by name.
    ///
    /// Directory requests are not listed and do not fall back to
    /// `index.html`; missing files are plain 404s. Hidden names, such as
    /// in-progress partial files, are never served.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            dir: self.dir.clone(),
            pattern: self.pattern.clone(),
        });
        let files = ServeDir::new(&self.dir).append_index_html_on_directories(false);

        Router::new()
            .route("/healthz", get(health))
            .fallback_service(files)
            .layer(middleware::from_fn(reject_hidden))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind `0.0.0.0:<port>`.
    ///
    /// # Errors
    /// Returns `ServerError::BindFailed` if the port is unavailable; this is
    /// fatal at startup.
    pub async fn bind(self) -> Result<BoundArtifactServer, ServerError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        self.bind_to(addr).await
    }

    /// Bind an explicit address. Port 0 picks a free port.
    pub async fn bind_to(self, addr: SocketAddr) -> Result<BoundArtifactServer, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                port: addr.port(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;

        tracing::info!(addr = %local_addr, dir = %self.dir.display(), "HTTP server listening");

        Ok(BoundArtifactServer {
            router: self.router(),
            listener,
            local_addr,
        })
    }
}

/// A bound server, ready to accept connections.
pub struct BoundArtifactServer {
    router: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundArtifactServer {
    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` fires. Every connection runs on its own task.
    pub async fn serve(self, mut shutdown: ShutdownListener) -> Result<(), ServerError> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        artifacts: count_artifacts(&state.dir, &state.pattern).await,
    })
}

async fn reject_hidden(request: Request, next: Next) -> Response {
    if is_hidden_path(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}

/// Any segment starting with a dot, literal or percent-encoded.
fn is_hidden_path(path: &str) -> bool {
    path.split('/').any(|segment| {
        segment.starts_with('.')
            || segment
                .get(..3)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("%2e"))
    })
}
