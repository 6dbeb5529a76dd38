//! OMA DM protocol error types.
//!
//! The taxonomy mirrors how errors surface on the wire: decode and protocol
//! violations terminate the affected session, authentication failures are
//! answered with a challenge or a rejection, and unknown commands are
//! recovered locally with a "not implemented" Status. Only `Decode` and
//! `Protocol` ever abort a session.

use thiserror::Error;

/// OMA DM engine errors.
#[derive(Error, Debug)]
pub enum DmError {
    /// Malformed WBXML or textual input; the message cannot be parsed at all.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Well-formed input that violates ordering or identity invariants
    /// (bad MsgID, message after session completion, duplicate CmdID).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Missing or invalid credential.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A command type the server does not recognize. Recovered per-command
    /// with a "not implemented" Status; never aborts the session.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Session referenced mid-exchange does not exist or has expired.
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// A second message arrived while one is in flight for the same session.
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Package registry manifest could not be loaded or is malformed.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OMA DM operations.
pub type Result<T> = std::result::Result<T, DmError>;

impl From<toml::de::Error> for DmError {
    fn from(err: toml::de::Error) -> Self {
        DmError::Config(err.to_string())
    }
}

impl From<base64::DecodeError> for DmError {
    fn from(err: base64::DecodeError) -> Self {
        DmError::Auth(format!("Base64 decode error: {err}"))
    }
}
