//! Per-device session state.
//!
//! A session tracks one complete multi-message negotiation, keyed by
//! `(device, session id)`. Message ids must increase by exactly one per
//! direction; any gap, repeat, or message after completion aborts the
//! session. Expired sessions are treated identically to unknown ones.

use std::time::{Duration, Instant};

use crate::dm::{DmTree, PackageDescriptor};
use crate::error::{DmError, Result};

/// Default inactivity window before a session is evicted.
pub const SESSION_TIMEOUT_SECS: u64 = 3600;

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created on the first Alert of a new session id.
    Init,
    /// Server's first response will query device identity and build fields.
    AwaitingDeviceInfo,
    /// Get commands sent; Results expected back.
    AwaitingResults,
    /// Device identity and build known; offer can be evaluated.
    ReadyToOffer,
    /// Exchange finished normally.
    Completed,
    /// Protocol, decode, or auth failure ended the session.
    Aborted,
}

impl SessionState {
    /// Whether the session accepts further messages.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// Device facts collected from Results payloads during the session.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Device identifier (`./DevInfo/DevId`).
    pub device_id: String,
    /// Manufacturer (`./DevInfo/Man`).
    pub manufacturer: String,
    /// Model (`./DevInfo/Mod`).
    pub model: String,
    /// Firmware version (`./DevInfo/FwV`).
    pub firmware_version: String,
    /// Software version (`./DevInfo/SwV`).
    pub software_version: String,
    /// Hardware version (`./DevInfo/HwV`).
    pub hardware_version: String,
    /// Build identifier (`./Software/Build`).
    pub current_build: String,
    /// DM protocol version (`./DevInfo/DmV`).
    pub dm_version: String,
    /// Device language (`./DevInfo/Lang`).
    pub language: String,
}

impl DeviceInfo {
    /// Record a reported value by its source URI.
    pub fn record(&mut self, uri: &str, value: &str) {
        let leaf = uri.rsplit('/').next().unwrap_or(uri);
        match leaf {
            "DevId" => self.device_id = value.to_string(),
            "Man" => self.manufacturer = value.to_string(),
            "Mod" => self.model = value.to_string(),
            "FwV" => self.firmware_version = value.to_string(),
            "SwV" => self.software_version = value.to_string(),
            "HwV" => self.hardware_version = value.to_string(),
            "Build" => self.current_build = value.to_string(),
            "DmV" => self.dm_version = value.to_string(),
            "Lang" => self.language = value.to_string(),
            _ => {}
        }
    }

    /// Build identifier for update evaluation, falling back to the
    /// software version when the device never reported a build.
    pub fn build(&self) -> Option<&str> {
        if !self.current_build.is_empty() {
            Some(&self.current_build)
        } else if !self.software_version.is_empty() {
            Some(&self.software_version)
        } else {
            None
        }
    }
}

/// One device-management session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session identifier as claimed by the device.
    pub session_id: String,
    /// Device identifier (the inbound message's source URI).
    pub device_id: String,
    /// Current state.
    pub state: SessionState,
    /// Collected device facts.
    pub device_info: DeviceInfo,
    /// Whether an accepted credential exchange happened this session.
    pub authenticated: bool,
    /// Username the device authenticated as.
    pub username: String,
    /// Nonce issued to the device in the last challenge; empty when no
    /// challenge has been issued.
    pub server_nonce: Vec<u8>,
    /// Nonce the device asked the server to sign with.
    pub client_nonce: Vec<u8>,
    /// Packages offered and not yet acknowledged.
    pub pending_offer: Vec<PackageDescriptor>,
    /// This session's view of the management tree: server constants plus
    /// values the device reported.
    pub tree: DmTree,
    last_msg_in: u32,
    msg_out: u32,
    created_at: Instant,
    last_activity: Instant,
    timeout: Duration,
}

impl Session {
    /// Create a session in `Init` state.
    pub fn new(session_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            session_id: session_id.into(),
            device_id: device_id.into(),
            state: SessionState::Init,
            device_info: DeviceInfo::default(),
            authenticated: false,
            username: String::new(),
            server_nonce: Vec::new(),
            client_nonce: Vec::new(),
            pending_offer: Vec::new(),
            tree: DmTree::new(),
            last_msg_in: 0,
            msg_out: 0,
            created_at: now,
            last_activity: now,
            timeout: Duration::from_secs(SESSION_TIMEOUT_SECS),
        }
    }

    /// Override the inactivity window.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate an inbound message id against the per-direction counter.
    ///
    /// The id must be exactly one past the last id seen. Violations, and any
    /// message after `Completed`/`Aborted`, abort the session.
    pub fn accept_message(&mut self, msg_id: u32) -> Result<()> {
        if self.state.is_terminal() {
            let prior = self.state;
            self.abort();
            return Err(DmError::Protocol(format!(
                "message {msg_id} received after session {} ended ({prior:?})",
                self.session_id
            )));
        }

        let expected = self.last_msg_in + 1;
        if msg_id != expected {
            self.abort();
            return Err(DmError::Protocol(format!(
                "non-sequential MsgID {msg_id} in session {} (expected {expected})",
                self.session_id
            )));
        }

        self.last_msg_in = msg_id;
        self.touch();
        Ok(())
    }

    /// Last inbound message id accepted.
    pub fn last_msg_in(&self) -> u32 {
        self.last_msg_in
    }

    /// Allocate the next outbound message id.
    pub fn next_msg_id(&mut self) -> u32 {
        self.msg_out += 1;
        self.msg_out
    }

    /// Outbound messages sent so far.
    pub fn messages_sent(&self) -> u32 {
        self.msg_out
    }

    /// Whether the inactivity window has elapsed.
    pub fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > self.timeout
    }

    /// Session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Client-initiated Alert accepted; device info will be queried.
    pub fn mark_session_started(&mut self) {
        if self.state == SessionState::Init {
            self.state = SessionState::AwaitingDeviceInfo;
        }
    }

    /// Get commands for identity/build fields went out.
    pub fn mark_info_requested(&mut self) {
        if self.state == SessionState::AwaitingDeviceInfo {
            self.state = SessionState::AwaitingResults;
        }
    }

    /// Results arrived; once the build is known the offer can be evaluated.
    pub fn mark_results_received(&mut self) {
        if self.state == SessionState::AwaitingResults && self.device_info.build().is_some() {
            self.state = SessionState::ReadyToOffer;
        }
    }

    /// Offer (or "no update" final) went out and was acknowledged.
    pub fn mark_completed(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Completed;
        }
    }

    /// Terminate the session; every state can reach `Aborted`.
    pub fn abort(&mut self) {
        self.state = SessionState::Aborted;
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
