// src/transport/legacy.rs
// Legacy HTTP+SSE binding: GET /sse opens a stream, POST /messages feeds it

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use futures::Stream;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, PollSender};
use tracing::{debug, info, warn};

use super::ServerFactory;
use super::registry::{SessionRegistry, TransportKind, TransportRejection};

/// Buffered messages per direction
const CHANNEL_CAPACITY: usize = 64;
/// Path clients post follow-up messages to
pub const MESSAGES_PATH: &str = "/messages";

struct LegacyChannel {
    inbound: mpsc::Sender<ClientJsonRpcMessage>,
    cancel: CancellationToken,
}

/// Owns every open legacy event-stream session
pub struct LegacyHub {
    registry: Arc<SessionRegistry>,
    factory: ServerFactory,
    channels: Mutex<HashMap<String, LegacyChannel>>,
    shutdown: CancellationToken,
}

/// Server side of one open event stream; dropping it closes the session
pub struct LegacyStream {
    pub session_id: String,
    /// Relative URL announced in the `endpoint` event
    pub endpoint: String,
    receiver: mpsc::Receiver<ServerJsonRpcMessage>,
    _guard: SessionGuard,
}

impl LegacyStream {
    pub async fn next_message(&mut self) -> Option<ServerJsonRpcMessage> {
        self.receiver.recv().await
    }
}

struct SessionGuard {
    hub: Arc<LegacyHub>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.hub.close(&self.id);
    }
}

impl LegacyHub {
    pub fn new(registry: Arc<SessionRegistry>, factory: ServerFactory, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            factory,
            channels: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, LegacyChannel>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a session and start serving it
    pub fn open(self: &Arc<Self>) -> Result<LegacyStream, TransportRejection> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.registry.register(&id, TransportKind::LegacySse)?;

        let (inbound_tx, inbound_rx) = mpsc::channel::<ClientJsonRpcMessage>(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel::<ServerJsonRpcMessage>(CHANNEL_CAPACITY);
        let cancel = self.shutdown.child_token();
        self.channels().insert(
            id.clone(),
            LegacyChannel {
                inbound: inbound_tx,
                cancel: cancel.clone(),
            },
        );

        let server = (self.factory)(&id);
        let hub = Arc::clone(self);
        let session_id = id.clone();
        tokio::spawn(async move {
            let transport = (PollSender::new(outbound_tx), ReceiverStream::new(inbound_rx));
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(session = %session_id, "Legacy session cancelled");
                }
                result = async {
                    let service = rmcp::serve_server(server, transport)
                        .await
                        .map_err(|e| e.to_string())?;
                    service.waiting().await.map_err(|e| e.to_string())
                } => {
                    if let Err(e) = result {
                        debug!(session = %session_id, error = %e, "Legacy session ended with error");
                    }
                }
            }
            hub.close(&session_id);
        });

        info!(session = %id, "Legacy event-stream session opened");
        Ok(LegacyStream {
            endpoint: format!("{}?sessionId={}", MESSAGES_PATH, id),
            session_id: id.clone(),
            receiver: outbound_rx,
            _guard: SessionGuard {
                hub: Arc::clone(self),
                id,
            },
        })
    }

    /// Route a client message into an open session
    pub async fn deliver(&self, id: &str, message: ClientJsonRpcMessage) -> Result<(), TransportRejection> {
        self.registry.check(id, TransportKind::LegacySse)?;
        let sender = self
            .channels()
            .get(id)
            .map(|c| c.inbound.clone())
            .ok_or(TransportRejection::UnknownSession)?;
        sender
            .send(message)
            .await
            .map_err(|_| TransportRejection::UnknownSession)
    }

    /// Release a session; safe to call more than once
    pub fn close(&self, id: &str) {
        let channel = self.channels().remove(id);
        if let Some(channel) = channel {
            channel.cancel.cancel();
            info!(session = %id, "Legacy event-stream session closed");
        }
        self.registry.remove(id);
    }

    pub fn len(&self) -> usize {
        self.channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// GET /sse
pub async fn sse_handler(
    State(hub): State<Arc<LegacyHub>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, TransportRejection> {
    let mut session = hub.open()?;
    let endpoint = session.endpoint.clone();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("endpoint").data(endpoint));
        while let Some(message) = session.next_message().await {
            match Event::default().event("message").json_data(&message) {
                Ok(event) => yield Ok(event),
                Err(e) => warn!(session = %session.session_id, error = %e, "Failed to encode message"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /messages?sessionId=...
pub async fn messages_handler(
    State(hub): State<Arc<LegacyHub>>,
    Query(query): Query<MessagesQuery>,
    Json(message): Json<ClientJsonRpcMessage>,
) -> Result<StatusCode, TransportRejection> {
    let id = query.session_id.ok_or(TransportRejection::MissingSession)?;
    hub.deliver(&id, message).await?;
    Ok(StatusCode::ACCEPTED)
}

pub fn router(hub: Arc<LegacyHub>) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route(MESSAGES_PATH, post(messages_handler))
        .with_state(hub)
}
