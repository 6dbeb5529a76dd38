//! Server state and the session store.
//!
//! The session store is the only shared mutable resource in the request
//! path. Each session is wrapped in its own lock so access to a given
//! session is serialized (one in-flight message per session id) while
//! different sessions proceed fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use super::config::ServerConfig;
use crate::dm::PackageRegistry;
use crate::syncml::{Authenticator, Session};
use crate::wbxml::TokenTable;

/// Application state shared across handlers.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Session store.
    pub sessions: SessionStore,
    /// Message authenticator.
    pub auth: Authenticator,
    /// Read-only package registry.
    pub registry: PackageRegistry,
    /// WBXML token table; read-only after load.
    pub table: TokenTable,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ServerConfig, registry: PackageRegistry) -> Self {
        let auth = Authenticator::new(
            &config.device_username,
            &config.device_password,
            &config.server_username,
            &config.server_password,
        );
        let sessions = SessionStore::new().with_timeout(config.session_timeout);

        Self {
            config,
            sessions,
            auth,
            registry,
            table: TokenTable::syncml_dm(),
            start_time: Instant::now(),
        }
    }

    /// Server uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Summary of a live session for the debug listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: String,
    /// Device identifier.
    pub device_id: String,
    /// Current state.
    pub state: String,
    /// Whether the session authenticated.
    pub authenticated: bool,
    /// Reported model, when known.
    pub model: String,
    /// Reported build, when known.
    pub build: String,
    /// Last inbound message id.
    pub last_msg_in: u32,
}

/// Keyed store of active sessions with per-key serialization.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout: Duration::from_secs(crate::syncml::SESSION_TIMEOUT_SECS),
        }
    }

    /// Set the inactivity window applied to new sessions.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn key(device_id: &str, session_id: &str) -> String {
        format!("{device_id}\u{1f}{session_id}")
    }

    /// Get the session for `(device, session id)`, creating it in `Init`
    /// state when absent. An expired session is evicted first, so the next
    /// Alert under its id starts fresh.
    pub async fn get_or_create(&self, device_id: &str, session_id: &str) -> Arc<Mutex<Session>> {
        let key = Self::key(device_id, session_id);
        let mut sessions = self.sessions.write().await;

        if let Some(entry) = sessions.get(&key) {
            let expired = entry
                .try_lock()
                .map(|session| session.is_expired())
                .unwrap_or(false);
            if !expired {
                return Arc::clone(entry);
            }
            sessions.remove(&key);
        }

        let session =
            Session::new(session_id, device_id).with_timeout(self.timeout);
        let entry = Arc::new(Mutex::new(session));
        sessions.insert(key, Arc::clone(&entry));
        entry
    }

    /// Existing session, if present and not expired.
    pub async fn get(&self, device_id: &str, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let key = Self::key(device_id, session_id);
        let sessions = self.sessions.read().await;
        sessions.get(&key).map(Arc::clone)
    }

    /// Remove a session.
    pub async fn remove(&self, device_id: &str, session_id: &str) {
        let key = Self::key(device_id, session_id);
        self.sessions.write().await.remove(&key);
    }

    /// Number of stored sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Evict expired and terminated sessions; returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry
                .try_lock()
                .map(|s| !s.is_expired() && !s.state.is_terminal())
                // A locked session is in use; keep it.
                .unwrap_or(true)
        });
        before - sessions.len()
    }

    /// Snapshot of live sessions for the debug endpoint.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut out = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            if let Ok(session) = entry.try_lock() {
                out.push(SessionSummary {
                    session_id: session.session_id.clone(),
                    device_id: session.device_id.clone(),
                    state: format!("{:?}", session.state),
                    authenticated: session.authenticated,
                    model: session.device_info.model.clone(),
                    build: session.device_info.current_build.clone(),
                    last_msg_in: session.last_msg_in(),
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let store = SessionStore::new();
        let a = store.get_or_create("IMEI:1", "7").await;
        let b = store.get_or_create("IMEI:1", "7").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_distinct_sessions() {
        let store = SessionStore::new();
        let a = store.get_or_create("IMEI:1", "7").await;
        let b = store.get_or_create("IMEI:2", "7").await;
        let c = store.get_or_create("IMEI:1", "8").await;
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(store.count().await, 3);
    }

    #[tokio::test]
    async fn test_expired_session_recreated() {
        let store = SessionStore::new().with_timeout(Duration::from_millis(0));
        let a = store.get_or_create("IMEI:1", "7").await;
        a.lock().await.accept_message(1).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let b = store.get_or_create("IMEI:1", "7").await;
        assert!(!Arc::ptr_eq(&a, &b));
        // Fresh session accepts MsgID 1 again.
        assert!(b.lock().await.accept_message(1).is_ok());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::new();
        store.get_or_create("IMEI:1", "7").await;
        store.remove("IMEI:1", "7").await;
        assert_eq!(store.count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_drops_terminal_sessions() {
        let store = SessionStore::new();
        let a = store.get_or_create("IMEI:1", "7").await;
        store.get_or_create("IMEI:2", "9").await;
        a.lock().await.abort();

        let removed = store.cleanup().await;
        assert_eq!(removed, 1);
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lock_detectable() {
        let store = SessionStore::new();
        let entry = store.get_or_create("IMEI:1", "7").await;
        let guard = entry.lock().await;

        let again = store.get_or_create("IMEI:1", "7").await;
        assert!(again.try_lock().is_err());
        drop(guard);
        assert!(entry.try_lock().is_ok());
    }
}
