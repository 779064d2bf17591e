// src/transport/streamable.rs
// Streamable HTTP binding with session tracking

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService,
    session::{
        ServerSseMessage, SessionId, SessionManager,
        local::{LocalSessionManager, SessionConfig},
    },
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ServerFactory;
use super::registry::{SessionRegistry, TransportKind, TransportRejection};
use crate::mcp::DiagramServer;

/// Header carrying the streamable session id
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Streamable sessions with no traffic for this long are closed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

thread_local! {
    /// Id of the session created last on this thread, not yet bound to a server.
    /// The HTTP service builds the server in the same poll that created the
    /// session, so the handoff never crosses tasks.
    static PENDING_SESSION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Take the id left by the most recent `create_session` on this thread
pub fn take_pending_session() -> Option<String> {
    PENDING_SESSION.with(|pending| pending.borrow_mut().take())
}

type LocalError = rmcp::transport::streamable_http_server::session::local::LocalSessionManagerError;

#[derive(Error, Debug)]
pub enum TrackedSessionError {
    #[error(transparent)]
    Local(#[from] LocalError),

    #[error(transparent)]
    Rejected(#[from] TransportRejection),
}

/// In-memory session manager that mirrors every session into the shared
/// [`SessionRegistry`].
///
/// Sessions idle past the configured timeout are stopped by their worker and
/// leave the registry with it.
pub struct TrackedSessionManager {
    inner: LocalSessionManager,
    registry: Arc<SessionRegistry>,
}

impl TrackedSessionManager {
    pub fn new(registry: Arc<SessionRegistry>, idle_timeout: Duration) -> Self {
        let inner = LocalSessionManager {
            sessions: Default::default(),
            session_config: SessionConfig {
                keep_alive: Some(idle_timeout),
                ..Default::default()
            },
        };
        Self { inner, registry }
    }

    /// Close one session by id
    pub async fn close(&self, id: &str) {
        let sid: SessionId = Arc::from(id);
        let _ = self.close_session(&sid).await;
    }
}

impl SessionManager for TrackedSessionManager {
    type Error = TrackedSessionError;
    type Transport = <LocalSessionManager as SessionManager>::Transport;

    fn create_session(
        &self,
    ) -> impl Future<Output = Result<(SessionId, Self::Transport), Self::Error>> + Send {
        async move {
            if !self.registry.is_accepting() {
                return Err(TransportRejection::ShuttingDown.into());
            }
            let (id, transport) = self.inner.create_session().await?;
            if let Err(rejection) = self.registry.register(&id, TransportKind::Streamable) {
                let _ = self.inner.close_session(&id).await;
                return Err(rejection.into());
            }
            info!(session = %id, "Streamable session opened");
            PENDING_SESSION.with(|pending| *pending.borrow_mut() = Some(id.to_string()));
            Ok((id, transport))
        }
    }

    fn initialize_session(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<ServerJsonRpcMessage, Self::Error>> + Send {
        async move { Ok(self.inner.initialize_session(id, message).await?) }
    }

    fn has_session(&self, id: &SessionId) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        async move {
            let live = self.inner.has_session(id).await?;
            if !live {
                // Worker already gone (dropped connection or idle timeout)
                self.registry.remove(id);
            }
            Ok(live)
        }
    }

    fn close_session(&self, id: &SessionId) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            self.registry.remove(id);
            if let Err(e) = self.inner.close_session(id).await {
                // Idle timeout or shutdown stopped the worker first
                debug!(session = %id, error = %e, "Streamable session worker already stopped");
            }
            info!(session = %id, "Streamable session closed");
            Ok(())
        }
    }

    fn create_stream(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        async move { Ok(self.inner.create_stream(id, message).await?) }
    }

    fn accept_message(
        &self,
        id: &SessionId,
        message: ClientJsonRpcMessage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { Ok(self.inner.accept_message(id, message).await?) }
    }

    fn create_standalone_stream(
        &self,
        id: &SessionId,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        async move { Ok(self.inner.create_standalone_stream(id).await?) }
    }

    fn resume(
        &self,
        id: &SessionId,
        last_event_id: String,
    ) -> impl Future<
        Output = Result<impl Stream<Item = ServerSseMessage> + Send + Sync + 'static, Self::Error>,
    > + Send {
        async move { Ok(self.inner.resume(id, last_event_id).await?) }
    }
}

/// Build the streamable HTTP service; one fresh server per session, keyed by
/// the `mcp-session-id` the client sees
pub fn create_streamable_service(
    factory: ServerFactory,
    sessions: Arc<TrackedSessionManager>,
    cancellation_token: CancellationToken,
) -> StreamableHttpService<DiagramServer, TrackedSessionManager> {
    let service_factory = move || {
        let key = take_pending_session().unwrap_or_else(|| {
            warn!("Streamable server built without a pending session id");
            uuid::Uuid::new_v4().to_string()
        });
        Ok(factory(&key))
    };

    let config = StreamableHttpServerConfig {
        sse_keep_alive: Some(Duration::from_secs(15)),
        stateful_mode: true,
        cancellation_token,
        ..Default::default()
    };

    StreamableHttpService::new(service_factory, sessions, config)
}

/// Refuse ids that are unknown or belong to the legacy event-stream binding
pub async fn guard_streamable_session(
    State(registry): State<Arc<SessionRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let session = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(id) = session
        && let Err(rejection) = registry.check(&id, TransportKind::Streamable)
    {
        return rejection.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_session_registers() {
        let registry = Arc::new(SessionRegistry::new());
        let manager = TrackedSessionManager::new(registry.clone(), DEFAULT_IDLE_TIMEOUT);
        let (id, _transport) = manager.create_session().await.unwrap();
        assert_eq!(registry.kind_of(&id), Some(TransportKind::Streamable));

        manager.close_session(&id).await.unwrap();
        assert_eq!(registry.kind_of(&id), None);
    }

    #[tokio::test]
    async fn test_no_sessions_after_shutdown() {
        let registry = Arc::new(SessionRegistry::new());
        let manager = TrackedSessionManager::new(registry.clone(), DEFAULT_IDLE_TIMEOUT);
        take_pending_session();
        registry.close();
        let err = manager.create_session().await.err().unwrap();
        assert!(matches!(
            err,
            TrackedSessionError::Rejected(TransportRejection::ShuttingDown)
        ));
        assert!(take_pending_session().is_none());
    }

    #[tokio::test]
    async fn test_created_session_id_is_handed_to_factory() {
        let registry = Arc::new(SessionRegistry::new());
        let manager = TrackedSessionManager::new(registry, DEFAULT_IDLE_TIMEOUT);
        let (id, _transport) = manager.create_session().await.unwrap();
        assert_eq!(take_pending_session().as_deref(), Some(&*id));
        assert!(take_pending_session().is_none());
    }

    #[tokio::test]
    async fn test_close_after_worker_stopped_still_unregisters() {
        let registry = Arc::new(SessionRegistry::new());
        let manager = TrackedSessionManager::new(registry.clone(), DEFAULT_IDLE_TIMEOUT);
        let (id, transport) = manager.create_session().await.unwrap();
        drop(transport);

        manager.close(&id).await;
        assert_eq!(registry.kind_of(&id), None);
        assert!(!manager.has_session(&id).await.unwrap());
    }
}
