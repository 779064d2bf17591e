// src/transport/mod.rs
// Wire bindings: stdio, streamable HTTP and the legacy event-stream binding

pub mod http;
pub mod legacy;
pub mod registry;
pub mod stdio;
pub mod streamable;

use std::sync::Arc;

use tracing::warn;

use crate::generator::ImageGenerator;
use crate::mcp::DiagramServer;
use crate::tools::{Dispatcher, DispatcherSettings};

pub use http::HttpApp;
pub use registry::{SessionRegistry, TransportKind, TransportRejection};

/// Builds a fresh server for one connection, keyed by its session id
pub type ServerFactory = Arc<dyn Fn(&str) -> DiagramServer + Send + Sync>;

/// Factory where every connection gets its own dispatcher and session state
pub fn dispatcher_factory(
    generator: Arc<dyn ImageGenerator>,
    settings: Arc<DispatcherSettings>,
) -> ServerFactory {
    Arc::new(move |key: &str| {
        let dispatcher = Dispatcher::new(generator.clone(), settings.clone(), key);
        DiagramServer::new(Arc::new(dispatcher))
    })
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
