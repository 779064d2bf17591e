// src/transport/http.rs
// Centralized HTTP binding: routes, auth layering and graceful shutdown

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::legacy::{self, LegacyHub};
use super::registry::{SessionRegistry, TransportKind};
use super::streamable::{TrackedSessionManager, create_streamable_service, guard_streamable_session};
use super::{ServerFactory, shutdown_signal};
use crate::auth::{AuthVerifier, require_auth};
use crate::error::Result;
use crate::output::{FileAccessError, resolve_download};

/// Everything the HTTP binding needs, wired once at startup
pub struct HttpApp {
    registry: Arc<SessionRegistry>,
    sessions: Arc<TrackedSessionManager>,
    legacy: Arc<LegacyHub>,
    verifier: Arc<AuthVerifier>,
    factory: ServerFactory,
    output_dir: Arc<PathBuf>,
    shutdown: CancellationToken,
}

impl HttpApp {
    /// `idle_timeout` bounds how long a streamable session may sit without
    /// traffic before it is closed
    pub fn new(factory: ServerFactory, verifier: AuthVerifier, output_dir: PathBuf, idle_timeout: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let registry = Arc::new(SessionRegistry::new());
        let sessions = Arc::new(TrackedSessionManager::new(registry.clone(), idle_timeout));
        let legacy = Arc::new(LegacyHub::new(registry.clone(), factory.clone(), shutdown.child_token()));

        Self {
            registry,
            sessions,
            legacy,
            verifier: Arc::new(verifier),
            factory,
            output_dir: Arc::new(output_dir),
            shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn legacy(&self) -> &Arc<LegacyHub> {
        &self.legacy
    }

    /// Full router: `/health` is open, everything else requires auth
    pub fn router(&self) -> Router {
        let mcp_service = create_streamable_service(
            self.factory.clone(),
            self.sessions.clone(),
            self.shutdown.child_token(),
        );
        let mcp = Router::new()
            .nest_service("/mcp", mcp_service)
            .layer(middleware::from_fn_with_state(
                self.registry.clone(),
                guard_streamable_session,
            ));

        let files = Router::new()
            .route("/files/{name}", get(serve_file))
            .with_state(self.output_dir.clone());

        let protected = mcp
            .merge(legacy::router(self.legacy.clone()))
            .merge(files)
            .layer(middleware::from_fn_with_state(self.verifier.clone(), require_auth));

        Router::new()
            .route("/health", get(health))
            .merge(protected)
            .layer(TraceLayer::new_for_http())
    }

    /// Stop accepting sessions, then close every registered one
    pub async fn shutdown(&self) {
        let live = self.registry.close();
        info!(sessions = live.len(), "Closing transport sessions");
        for (id, kind) in live {
            match kind {
                TransportKind::Streamable => self.sessions.close(&id).await,
                TransportKind::LegacySse => self.legacy.close(&id),
            }
        }
        self.shutdown.cancel();
    }

    /// Serve until a shutdown signal arrives
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, auth = %self.verifier.mode(), "HTTP server listening");

        let app = Arc::new(self);
        let router = app.router();
        let shutdown_app = app.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                info!("Shutdown signal received");
                shutdown_app.shutdown().await;
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// GET /files/{name}: flat names inside the output directory only
async fn serve_file(State(dir): State<Arc<PathBuf>>, Path(name): Path<String>) -> Response {
    let path = match resolve_download(&dir, &name) {
        Ok(path) => path,
        Err(FileAccessError::InvalidName) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid file name" }))).into_response();
        }
        Err(FileAccessError::NotFound) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "file not found" }))).into_response();
        }
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], Body::from(bytes)).into_response()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read artifact");
            (StatusCode::NOT_FOUND, Json(json!({ "error": "file not found" }))).into_response()
        }
    }
}
