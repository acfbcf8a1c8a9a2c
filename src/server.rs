use axum::{Router, routing::get, extract::{ws::WebSocketUpgrade, State, Query}, response::{IntoResponse, Response}, http::{HeaderMap, StatusCode}};
use kameo::actor::{Actor, ActorRef};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use tracing::debug;

use crate::actor::hub::Hub;
use crate::actor::messages::{CreateClient, Publish, SubscriberCount};
use crate::actor::{Root, SessionCount};
use crate::auth::{AllowAll, AuthGate, RequestInfo};
use crate::coordinator::{Coordinator, WorkerContext};
use crate::protocol::{Channel, ServerEvent};
use crate::store::{MemoryStore, RecordStore};

/// Everything a worker instance is built from. The `channels` set is the
/// explicit mapping of which broadcast scopes this instance serves.
pub struct ServerConfig {
    pub products: Arc<dyn RecordStore>,
    pub chat: Arc<dyn RecordStore>,
    pub auth: Arc<dyn AuthGate>,
    pub channels: Vec<Channel>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            products: Arc::new(MemoryStore::new()),
            chat: Arc::new(MemoryStore::new()),
            auth: Arc::new(AllowAll),
            channels: Channel::ALL.to_vec(),
        }
    }
}

/// One worker's serving stack: hub, coordinators, session registry, and the
/// WebSocket endpoint.
///
/// # Flexible mounting
/// ```no_run
/// use feria::Server;
/// use axum::Router;
///
/// // Option 1: Default router with /ws
/// let app = Server::new().into_router();
///
/// // Option 2: Custom path
/// let app = Server::new().into_router_at("/sync/ws");
///
/// // Option 3: Compose with other routes
/// let server = Server::new();
/// let handle = server.handle();
/// let app = Router::new()
///     .merge(server.into_router_at("/live"))
///     .route("/health", axum::routing::get(|| async { "ok" }));
/// ```
#[derive(Clone)]
pub struct Server {
    root: ActorRef<Root>,
    hub: ActorRef<Hub>,
    auth: Arc<dyn AuthGate>,
}

/// Handle for interacting with a running worker from HTTP handlers.
#[derive(Clone)]
pub struct Handle {
    root: ActorRef<Root>,
    hub: ActorRef<Hub>,
}

impl Handle {
    /// Publish an event to every session subscribed to `channel`.
    pub async fn publish(&self, channel: Channel, event: ServerEvent) -> bool {
        self.hub.tell(Publish { channel, event }).send().await.is_ok()
    }

    /// Number of sessions subscribed to `channel`.
    pub async fn subscriber_count(&self, channel: Channel) -> usize {
        self.hub.ask(SubscriberCount(channel)).send().await.unwrap_or(0)
    }

    /// Number of live sessions on this worker.
    pub async fn session_count(&self) -> usize {
        self.root.ask(SessionCount).send().await.unwrap_or(0)
    }
}

impl Server {
    /// In-memory stores, every connection authorized. Development default.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let hub = Hub::spawn(Hub::new());
        let ctx = Arc::new(WorkerContext {
            hub: hub.clone(),
            products: Coordinator::new(config.products, hub.clone(), Channel::Products),
            chat: Coordinator::with_announcement(
                config.chat,
                hub.clone(),
                Channel::Chat,
                Channel::ChatSenders,
            ),
            channels: config.channels,
        });
        let root = Root::spawn(Root::new(ctx));
        Self { root, hub, auth: config.auth }
    }

    /// Get a handle for use in other HTTP handlers.
    pub fn handle(&self) -> Handle {
        Handle { root: self.root.clone(), hub: self.hub.clone() }
    }

    /// Get router with WebSocket endpoint at `/ws`.
    pub fn into_router(self) -> Router {
        self.into_router_at("/ws")
    }

    /// Get router with WebSocket endpoint at a custom path.
    pub fn into_router_at(self, path: &str) -> Router {
        let state = AppState { root: self.root, auth: self.auth };
        Router::new().route(path, get(ws_handler)).with_state(state)
    }

    /// Start the server on the given address with the default `/ws` path.
    pub async fn serve(self, addr: &str) -> io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve on an already-bound listener. Workers sharing a port bind it
    /// themselves (see [`crate::supervisor::bind_shared`]) and hand it in
    /// here.
    pub async fn serve_listener(self, listener: tokio::net::TcpListener) -> io::Result<()> {
        let app = self.into_router();
        axum::serve(listener, app).await
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    root: ActorRef<Root>,
    auth: Arc<dyn AuthGate>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query_params): Query<HashMap<String, String>>,
) -> Response {
    let headers_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_lowercase(), v.to_string())))
        .collect();
    let request_info = RequestInfo::new(headers_map, query_params);

    // Authorization happens before the upgrade: a denied connection never
    // becomes a session, so no mutation path is reachable from it.
    let identity = match state.auth.authorize(&request_info).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!("connection rejected: {e}");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        let _ = state.root.ask(CreateClient { socket, identity }).send().await;
    })
}
