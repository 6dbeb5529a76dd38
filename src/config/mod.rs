//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`OMADM_*`)
//! - CLI arguments (applied by the binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DmError, Result};
use crate::server::ServerConfig;
use crate::syncml::SESSION_TIMEOUT_SECS;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Package registry settings.
    #[serde(default)]
    pub packages: PackagesSection,

    /// Credential settings.
    #[serde(default)]
    pub auth: AuthSection,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| DmError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| DmError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("OMADM_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("OMADM_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(id) = std::env::var("OMADM_SERVER_ID") {
            config.server.server_id = id;
        }
        if let Ok(url) = std::env::var("OMADM_BASE_URL") {
            config.server.base_url = url;
        }
        if let Ok(path) = std::env::var("OMADM_MANIFEST") {
            config.packages.manifest = PathBuf::from(path);
        }
        if let Ok(user) = std::env::var("OMADM_DEVICE_USERNAME") {
            config.auth.device_username = user;
        }
        if let Ok(pass) = std::env::var("OMADM_DEVICE_PASSWORD") {
            config.auth.device_password = pass;
        }

        config
    }

    /// Resolve into the server's runtime configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_addr(
                format!("{}:{}", self.server.host, self.server.port)
                    .parse()
                    .unwrap_or_else(|_| "127.0.0.1:8080".parse().unwrap()),
            )
            .with_server_id(&self.server.server_id)
            .with_base_url(&self.server.base_url)
            .with_device_credentials(&self.auth.device_username, &self.auth.device_password)
            .with_server_credentials(&self.auth.server_username, &self.auth.server_password)
            .with_session_timeout(Duration::from_secs(self.server.session_timeout_secs))
    }
}

/// Server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Server identifier placed in response headers.
    pub server_id: String,

    /// Base URL embedded in package download offers.
    pub base_url: String,

    /// Session inactivity window in seconds.
    pub session_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            server_id: "https://update.example.net/palmcsext/swupdateserver".to_string(),
            base_url: "https://update.example.net".to_string(),
            session_timeout_secs: SESSION_TIMEOUT_SECS,
        }
    }
}

/// Package registry section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesSection {
    /// Path to the manifest the packaging component maintains.
    pub manifest: PathBuf,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("packages/manifest.json"),
        }
    }
}

/// Credential section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// Username the device fleet authenticates as.
    pub device_username: String,
    /// Shared secret for the device username.
    pub device_password: String,
    /// Identity the server signs responses as.
    pub server_username: String,
    /// Shared secret for the server identity.
    pub server_password: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            device_username: "dmuser".to_string(),
            device_password: "dmpass".to_string(),
            server_username: "dmserver".to_string(),
            server_password: "dmserverpass".to_string(),
        }
    }
}
