//! Keyed message authentication for the `syncml:auth-MAC` scheme.
//!
//! The transport header carries `algorithm=MD5, username=<user>, mac=<b64>`.
//! The digest is computed as
//!
//! ```text
//! key  = B64(MD5(username ":" password))
//! mac  = B64(HMAC-MD5(key, nonce ":" B64(MD5(body))))
//! ```
//!
//! over the raw request body bytes, with the session nonce mixed into the
//! hashed material. Digest comparison is constant-time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::RngCore;

use super::session::Session;

type HmacMd5 = Hmac<Md5>;

/// Nonce length issued in challenges.
pub const NONCE_LEN: usize = 16;

/// Outcome of verifying an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// Credential verified; the session is authenticated from here on.
    Accepted,
    /// No usable credential yet; issue a fresh nonce and ask again.
    Challenge,
    /// Credential failed against an issued nonce; abort the session.
    Rejected,
}

/// Parsed transport authentication header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HmacHeader {
    /// MAC algorithm identifier.
    pub algorithm: String,
    /// Claimed username.
    pub username: String,
    /// Base64 digest.
    pub mac: String,
}

impl HmacHeader {
    /// Parse an `algorithm=..., username=..., mac=...` header value.
    ///
    /// Returns `None` when no mac field is present; unknown fields are
    /// ignored. Values may contain `=` (base64 padding), so only the first
    /// `=` per part splits key from value.
    pub fn parse(value: &str) -> Option<Self> {
        let mut algorithm = String::from("MD5");
        let mut username = String::new();
        let mut mac = None;

        for part in value.split(',') {
            let Some((key, val)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "algorithm" => algorithm = val.trim().to_string(),
                "username" => username = val.trim().to_string(),
                "mac" => mac = Some(val.trim().to_string()),
                _ => {}
            }
        }

        mac.map(|mac| Self {
            algorithm,
            username,
            mac,
        })
    }

    /// Format as a header value.
    pub fn format(&self) -> String {
        format!(
            "algorithm={}, username={}, mac={}",
            self.algorithm, self.username, self.mac
        )
    }
}

/// Credential store and MAC engine for one server instance.
#[derive(Debug, Clone)]
pub struct Authenticator {
    /// Username the fleet authenticates as.
    username: String,
    /// Shared secret for that username.
    password: String,
    /// Identity the server signs responses as.
    server_username: String,
    server_password: String,
}

impl Authenticator {
    /// Create an authenticator with the given credential pairs.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        server_username: impl Into<String>,
        server_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server_username: server_username.into(),
            server_password: server_password.into(),
        }
    }

    /// Compute the scheme's digest for the given credentials, nonce, and body.
    pub fn compute_mac(username: &str, password: &str, nonce: &[u8], body: &[u8]) -> String {
        let cred_hash = Md5::digest(format!("{username}:{password}").as_bytes());
        let cred_b64 = BASE64.encode(cred_hash);

        let body_hash = Md5::digest(body);
        let body_b64 = BASE64.encode(body_hash);

        let mut material = Vec::with_capacity(nonce.len() + 1 + body_b64.len());
        material.extend_from_slice(nonce);
        material.push(b':');
        material.extend_from_slice(body_b64.as_bytes());

        let mut mac =
            HmacMd5::new_from_slice(cred_b64.as_bytes()).expect("HMAC accepts any key size");
        mac.update(&material);
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Verify an inbound message against the session's auth state.
    ///
    /// The caller applies the outcome: set the authenticated flag on
    /// `Accepted`, store a fresh nonce on `Challenge`, abort on `Rejected`.
    pub fn verify(
        &self,
        header: Option<&HmacHeader>,
        body: &[u8],
        session: &Session,
    ) -> AuthResult {
        let Some(header) = header else {
            // Already-authenticated sessions stay authenticated unless the
            // device re-sends credentials.
            if session.authenticated {
                return AuthResult::Accepted;
            }
            return AuthResult::Challenge;
        };

        let username = if header.username.is_empty() {
            self.username.as_str()
        } else {
            header.username.as_str()
        };
        let expected = Self::compute_mac(username, &self.password, &session.server_nonce, body);

        if constant_time_eq(expected.as_bytes(), header.mac.as_bytes()) {
            return AuthResult::Accepted;
        }

        // A failure before any challenge was issued gets one; a failure
        // against an issued nonce is final.
        if session.server_nonce.is_empty() {
            AuthResult::Challenge
        } else {
            AuthResult::Rejected
        }
    }

    /// Sign a response body with the server identity and the device's nonce.
    pub fn sign(&self, body: &[u8], session: &Session) -> HmacHeader {
        let mac = Self::compute_mac(
            &self.server_username,
            &self.server_password,
            &session.client_nonce,
            body,
        );
        HmacHeader {
            algorithm: "MD5".to_string(),
            username: self.server_username.clone(),
            mac,
        }
    }

    /// Generate a fresh challenge nonce.
    pub fn generate_nonce() -> Vec<u8> {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        nonce
    }
}

/// Constant-time comparison to avoid timing side channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
