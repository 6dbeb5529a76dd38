//! SyncML / OMA DM message layer: typed messages, parsing, building,
//! authentication, and per-device session state.
//!
//! # Message Flow
//!
//! One session is a multi-message exchange, client-initiated:
//!
//! ```text
//! Device                                  Server
//!    |                                       |
//!    |-- Alert 1201 (MsgID 1) ------------->|  session starts
//!    |<- Status + Get DevInfo/Build --------|  identity queried
//!    |                                       |
//!    |-- Results (MsgID 2) ---------------->|  device facts reported
//!    |<- Status + Replace pkg + Exec -------|  update offered
//!    |      (or terminal Status only)       |  (or nothing applicable)
//!    |                                       |
//!    |-- Status acks (MsgID 3, Final) ----->|  offer acknowledged
//!    |<- Status, Final ---------------------|  session complete
//! ```
//!
//! MsgID increases by exactly 1 per direction; a gap or repeat aborts the
//! session. Authentication is per-session: the first accepted MAC exchange
//! sets the authenticated flag, after which credentials are optional.

mod auth;
mod builder;
mod message;
mod parser;
mod session;

pub use auth::{AuthResult, Authenticator, HmacHeader, NONCE_LEN};
pub use builder::{build_response, ResponseHeader};
pub use message::{Chal, Command, Credential, Item, Message, UnknownCommand};
pub use parser::parse;
pub use session::{DeviceInfo, Session, SessionState, SESSION_TIMEOUT_SECS};

/// DTD version the dialect pins.
pub const DTD_VERSION: &str = "1.2";
/// Protocol version the dialect pins.
pub const DM_VERSION: &str = "DM/1.2";

// Status codes the dialect uses.

/// Command succeeded.
pub const STATUS_OK: u32 = 200;
/// Command accepted for later processing.
pub const STATUS_ACCEPTED: u32 = 202;
/// Credential verified; authentication accepted for the session.
pub const STATUS_AUTH_ACCEPTED: u32 = 212;
/// Credential failed against an issued challenge.
pub const STATUS_UNAUTHORIZED: u32 = 401;
/// Addressed node does not exist.
pub const STATUS_NOT_FOUND: u32 = 404;
/// Credentials required; a challenge accompanies this status.
pub const STATUS_CREDENTIALS_MISSING: u32 = 407;
/// Command failed on the recipient.
pub const STATUS_COMMAND_FAILED: u32 = 500;
/// Command not implemented by the recipient.
pub const STATUS_NOT_IMPLEMENTED: u32 = 501;

// Alert codes.

/// Server-initiated session request.
pub const ALERT_SERVER_INITIATED: u32 = 1200;
/// Client-initiated session start.
pub const ALERT_CLIENT_INITIATED: u32 = 1201;
/// Display notification to the user.
pub const ALERT_DISPLAY: u32 = 1100;
/// Confirmation request.
pub const ALERT_CONFIRM: u32 = 1101;
