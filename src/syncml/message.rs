//! Typed protocol messages.
//!
//! A message is a header plus an ordered command list. Commands are a closed
//! variant set so dispatch is exhaustive; a new command kind is a
//! compile-time-checked addition.

use super::{DM_VERSION, DTD_VERSION};

/// An item carried by a command: an addressed value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// Target URI (where the value goes).
    pub target: Option<String>,
    /// Source URI (where the value came from).
    pub source: Option<String>,
    /// Payload.
    pub data: Option<String>,
    /// Meta children (Format, Type, Size, ...), in document order.
    pub meta: Vec<(String, String)>,
}

impl Item {
    /// Item addressing a target URI.
    pub fn target(uri: impl Into<String>) -> Self {
        Self {
            target: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Item addressing a target URI with a payload.
    pub fn target_data(uri: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            target: Some(uri.into()),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Item reporting a value for a source URI.
    pub fn source_data(uri: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            source: Some(uri.into()),
            data: Some(data.into()),
            ..Self::default()
        }
    }
}

/// Authentication challenge attached to a Status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chal {
    /// Base64 nonce the client must use for its next MAC.
    pub next_nonce: String,
}

/// Protocol commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Session signalling (client-initiated start, display, confirm).
    Alert {
        /// Command id, unique within the message.
        cmd_id: u32,
        /// Alert code (1201 = client-initiated session).
        code: u32,
        /// Optional alert items.
        items: Vec<Item>,
    },
    /// Query management-tree values.
    Get {
        /// Command id.
        cmd_id: u32,
        /// URIs to read.
        items: Vec<Item>,
    },
    /// Write management-tree values.
    Replace {
        /// Command id.
        cmd_id: u32,
        /// URIs and values to write.
        items: Vec<Item>,
    },
    /// Invoke an executable node.
    Exec {
        /// Command id.
        cmd_id: u32,
        /// Node to invoke, with optional argument data.
        items: Vec<Item>,
    },
    /// Acknowledge a prior command.
    Status {
        /// Command id.
        cmd_id: u32,
        /// MsgID of the message containing the acknowledged command.
        msg_ref: u32,
        /// CmdID of the acknowledged command (0 refers to the header).
        cmd_ref: u32,
        /// Name of the acknowledged command.
        cmd: String,
        /// Status code.
        code: u32,
        /// TargetRef of the acknowledged command.
        target_ref: Option<String>,
        /// SourceRef of the acknowledged command.
        source_ref: Option<String>,
        /// Authentication challenge, when the code demands one.
        chal: Option<Chal>,
        /// Optional result items.
        items: Vec<Item>,
    },
    /// Return values for a prior Get.
    Results {
        /// Command id.
        cmd_id: u32,
        /// MsgID of the Get being answered.
        msg_ref: u32,
        /// CmdID of the Get being answered.
        cmd_ref: u32,
        /// Reported values.
        items: Vec<Item>,
    },
}

impl Command {
    /// Command id, unique within its message.
    pub fn cmd_id(&self) -> u32 {
        match self {
            Command::Alert { cmd_id, .. }
            | Command::Get { cmd_id, .. }
            | Command::Replace { cmd_id, .. }
            | Command::Exec { cmd_id, .. }
            | Command::Status { cmd_id, .. }
            | Command::Results { cmd_id, .. } => *cmd_id,
        }
    }

    /// Wire name of the command element.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Alert { .. } => "Alert",
            Command::Get { .. } => "Get",
            Command::Replace { .. } => "Replace",
            Command::Exec { .. } => "Exec",
            Command::Status { .. } => "Status",
            Command::Results { .. } => "Results",
        }
    }

    pub(crate) fn set_cmd_id(&mut self, id: u32) {
        match self {
            Command::Alert { cmd_id, .. }
            | Command::Get { cmd_id, .. }
            | Command::Replace { cmd_id, .. }
            | Command::Exec { cmd_id, .. }
            | Command::Status { cmd_id, .. }
            | Command::Results { cmd_id, .. } => *cmd_id = id,
        }
    }
}

/// Credential carried in the message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Authentication scheme (e.g. `syncml:auth-MAC`).
    pub auth_type: String,
    /// Encoding of the data field.
    pub format: Option<String>,
    /// Credential data.
    pub data: String,
}

/// A body element the server does not recognize as any known command.
///
/// Recorded so dispatch can answer it with a "not implemented" Status
/// without aborting the rest of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand {
    /// Element tag name.
    pub name: String,
    /// Command id, when the element carried one.
    pub cmd_id: Option<u32>,
}

/// A complete protocol message: header fields plus ordered commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// DTD version from the header.
    pub ver_dtd: String,
    /// Protocol version from the header.
    pub ver_proto: String,
    /// Session identifier.
    pub session_id: String,
    /// Message id; increases by exactly 1 per message per direction.
    pub msg_id: u32,
    /// Sender identifier (device URI on inbound messages).
    pub source: String,
    /// Recipient identifier.
    pub target: String,
    /// Optional credential.
    pub credential: Option<Credential>,
    /// Header meta values (MaxMsgSize, NextNonce, ...).
    pub meta: Vec<(String, String)>,
    /// Commands in document order.
    pub commands: Vec<Command>,
    /// Unrecognized body elements, answered with Status 501.
    pub unrecognized: Vec<UnknownCommand>,
    /// Whether the body carried the Final marker.
    pub is_final: bool,
}

impl Message {
    /// Empty message with the dialect's fixed version fields.
    pub fn new(session_id: impl Into<String>, msg_id: u32) -> Self {
        Self {
            ver_dtd: DTD_VERSION.to_string(),
            ver_proto: DM_VERSION.to_string(),
            session_id: session_id.into(),
            msg_id,
            source: String::new(),
            target: String::new(),
            credential: None,
            meta: Vec::new(),
            commands: Vec::new(),
            unrecognized: Vec::new(),
            is_final: false,
        }
    }

    /// Header meta value by tag name.
    pub fn meta_value(&self, name: &str) -> Option<&str> {
        self.meta
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// All Alert commands.
    pub fn alerts(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Alert { .. }))
    }

    /// All Results commands.
    pub fn results(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Results { .. }))
    }

    /// All Status commands.
    pub fn statuses(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Status { .. }))
    }
}
