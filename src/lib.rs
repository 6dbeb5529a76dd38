//! # omadm-core - OMA DM Update Server Core
//!
//! Protocol engine standing in for a decommissioned vendor update server,
//! speaking the exact SyncML/OMA DM dialect a fleet of legacy handheld
//! devices expects: a WBXML binary codec, a stateful multi-message session
//! protocol, per-message authentication, and a rule engine that decides
//! from device-reported state which updates to offer.
//!
//! ## Protocol Overview
//!
//! ```text
//! Device                                  Server
//!    |                                       |
//!    |-- POST Alert 1201 (MsgID 1) -------->|  session starts
//!    |<- Status 212 + Get DevInfo/Build ----|  identity queried
//!    |                                       |
//!    |-- POST Results (MsgID 2) ----------->|  device facts reported
//!    |<- Status + Replace pkg + Exec -------|  update offered
//!    |                                       |
//!    |-- POST Status acks (MsgID 3) ------->|  offer acknowledged
//!    |<- Status, Final ---------------------|  session complete
//! ```
//!
//! ### Session State Machine
//!
//! ```text
//!              Alert 1201            Get sent            Results in
//!   [Init] ──────────────> [AwaitingDeviceInfo] ──> [AwaitingResults]
//!                                                          │
//!                                   build known            v
//!   [Completed] <────────── offer acked ────────── [ReadyToOffer]
//!
//!   [Aborted] reachable from every state (bad MsgID, decode failure,
//!   rejected credential, message after completion)
//! ```
//!
//! ### Wire Formats
//!
//! | Content type                      | Body                         |
//! |-----------------------------------|------------------------------|
//! | `application/vnd.syncml.dm+wbxml` | WBXML binary token stream    |
//! | `application/vnd.syncml.dm+xml`   | Equivalent textual tree form |
//!
//! The `x-syncml-hmac` transport header carries
//! `algorithm=MD5, username=<user>, mac=<b64 digest>` over the raw body.
//!
//! ## Quick Start
//!
//! ### Codec only
//!
//! ```rust,ignore
//! use omadm::wbxml::{self, Element, TokenTable};
//!
//! let table = TokenTable::syncml_dm();
//! let tree = wbxml::decode(&body, &table)?;
//! let bytes = wbxml::encode(&tree, &table);
//! ```
//!
//! ### Update rules
//!
//! ```rust,ignore
//! use omadm::dm;
//!
//! let offered = dm::evaluate("Nova-3.0.5-64", registry.packages());
//! for pkg in offered {
//!     println!("{} -> {}", pkg.name, pkg.target_build);
//! }
//! ```
//!
//! ### Full server
//!
//! ```rust,ignore
//! use omadm::server::{create_router, AppState, ServerConfig};
//!
//! let state = Arc::new(AppState::new(ServerConfig::default(), registry));
//! axum::serve(listener, create_router(state)).await?;
//! ```
//!
//! ## Modules
//!
//! - [`wbxml`]: binary codec, token tables, and the document tree
//! - [`syncml`]: typed messages, parser/builder, authentication, sessions
//! - [`dm`]: management tree, package registry, update eligibility rules
//! - [`server`]: HTTP endpoint (Axum-based) and the session store
//! - [`config`]: configuration management
//! - [`error`]: error types and result alias

pub mod config;
pub mod dm;
pub mod error;
pub mod server;
pub mod syncml;
pub mod wbxml;

// Re-exports for convenience
pub use config::Config;
pub use dm::{evaluate, BuildVersion, DmTree, PackageDescriptor, PackageRegistry};
pub use error::{DmError, Result};
pub use server::{create_router, AppState, ServerConfig, SessionStore};
pub use syncml::{
    AuthResult, Authenticator, Command, Message, Session, SessionState,
};
pub use wbxml::{Element, TokenTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol dialect the fleet speaks
pub const PROTOCOL_VERSION: &str = "DM/1.2";
