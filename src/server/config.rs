//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use crate::syncml::SESSION_TIMEOUT_SECS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub addr: SocketAddr,
    /// Server identifier placed in response headers (`Source/LocURI`).
    pub server_id: String,
    /// Base URL embedded in package download offers.
    pub base_url: String,
    /// Username the device fleet authenticates as.
    pub device_username: String,
    /// Shared secret for the device username.
    pub device_password: String,
    /// Identity the server signs responses as.
    pub server_username: String,
    /// Shared secret for the server identity.
    pub server_password: String,
    /// Session inactivity window.
    pub session_timeout: Duration,
    /// Maximum request body size (bytes).
    pub max_body_size: usize,
    /// Enable request logging.
    pub logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().unwrap(),
            server_id: "https://update.example.net/palmcsext/swupdateserver".to_string(),
            base_url: "https://update.example.net".to_string(),
            device_username: "dmuser".to_string(),
            device_password: "dmpass".to_string(),
            server_username: "dmserver".to_string(),
            server_password: "dmserverpass".to_string(),
            session_timeout: Duration::from_secs(SESSION_TIMEOUT_SECS),
            max_body_size: 1024 * 1024,
            logging: true,
        }
    }
}

impl ServerConfig {
    /// Create with custom port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr = format!("127.0.0.1:{port}").parse().unwrap();
        self
    }

    /// Bind to all interfaces.
    pub fn bind_all(mut self) -> Self {
        let port = self.addr.port();
        self.addr = format!("0.0.0.0:{port}").parse().unwrap();
        self
    }

    /// Set address directly.
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    /// Set the advertised server identifier.
    pub fn with_server_id(mut self, id: &str) -> Self {
        self.server_id = id.to_string();
        self
    }

    /// Set the download base URL.
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the device credential pair.
    pub fn with_device_credentials(mut self, username: &str, password: &str) -> Self {
        self.device_username = username.to_string();
        self.device_password = password.to_string();
        self
    }

    /// Set the server credential pair.
    pub fn with_server_credentials(mut self, username: &str, password: &str) -> Self {
        self.server_username = username.to_string();
        self.server_password = password.to_string();
        self
    }

    /// Set session timeout.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Disable logging.
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }
}
