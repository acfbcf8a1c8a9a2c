//! # Feria
//!
//! Multi-worker real-time broadcast server: connected clients mutate two
//! shared collections (catalog, chat) over a WebSocket and every session
//! converges on the same state after each write.
//!
//! ## Quick Start
//!
//! ```no_run
//! use feria::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::new()
//!         .serve("0.0.0.0:8080")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Custom Path
//!
//! ```no_run
//! use feria::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Server::new().into_router_at("/live/ws");
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## With Your Own Store and Auth
//!
//! ```no_run
//! use feria::{AuthGate, FileStore, Identity, RequestInfo, Server, ServerConfig};
//! use feria::async_trait;
//! use std::sync::Arc;
//!
//! struct CookieGate;
//!
//! #[async_trait]
//! impl AuthGate for CookieGate {
//!     async fn authorize(&self, request: &RequestInfo) -> feria::Result<Identity> {
//!         match request.credential.as_deref() {
//!             Some(_) => Ok(Identity::default()), // Look it up in your session store
//!             None => Err(feria::Error::Unauthorized("no session".into())),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         products: Arc::new(FileStore::new("data/products.json")),
//!         chat: Arc::new(FileStore::new("data/messages.json")),
//!         auth: Arc::new(CookieGate),
//!         ..ServerConfig::default()
//!     };
//!     Server::with_config(config).serve("0.0.0.0:8080").await.unwrap();
//! }
//! ```
//!
//! ## Composing with Axum
//!
//! ```no_run
//! use feria::Server;
//! use axum::{Router, routing::get};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new();
//!     let handle = server.handle();
//!
//!     let app = Router::new()
//!         .merge(server.into_router_at("/live"))
//!         .route("/health", get(|| async { "ok" }))
//!         .route("/stats", get(move || {
//!             let h = handle.clone();
//!             async move { format!("{} sessions", h.session_count().await) }
//!         }));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

mod actor;
mod auth;
mod coordinator;
mod error;
mod protocol;
mod server;
mod store;
pub mod supervisor;

// Public API
pub use auth::{AllowAll, AuthGate, Identity, RequestInfo, SessionTable};
pub use error::{Error, Result};
pub use protocol::{Channel, ClientEvent, ErrorAck, Record, RecordId, ServerEvent};
pub use server::{Handle, Server, ServerConfig};
pub use store::{FileStore, MemoryStore, RecordStore};

pub use async_trait::async_trait;
pub use axum;
