//! OMA DM HTTP server.
//!
//! One fixed POST endpoint speaks the protocol; a handful of GET endpoints
//! expose health, status, and the direct update-check API. Each inbound
//! call is handled independently; the session store serializes access per
//! session id while distinct sessions proceed in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use omadm::server::{create_router, AppState, ServerConfig};
//!
//! let state = Arc::new(AppState::new(ServerConfig::default(), registry));
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

mod config;
mod dispatch;
mod handlers;
mod state;

pub use config::ServerConfig;
pub use dispatch::{handle_request, DmResponse, CONTENT_TYPE_WBXML, CONTENT_TYPE_XML};
pub use handlers::{create_router, health_check, DM_ENDPOINT, HMAC_HEADER};
pub use state::{AppState, SessionStore, SessionSummary};
