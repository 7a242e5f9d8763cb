//! Rendezvous tokens for relayed matches.
//!
//! Format: `user_id:session_id:expires_unix.<hex sha256 signature>`. The
//! format is opaque to clients; only the signing node verifies it during
//! the join handshake.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Signs and verifies short-lived relayed-match tokens.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    secret: String,
    ttl: Duration,
}

impl TokenMinter {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Mint a token for one recipient.
    pub fn mint(&self, user_id: &str, session_id: &str) -> String {
        let expires = Utc::now().timestamp() + self.ttl.as_secs() as i64;
        let payload = format!("{}:{}:{}", user_id, session_id, expires);
        let signature = self.sign(&payload);
        format!("{}.{}", payload, signature)
    }

    /// Check the signature and the expiry.
    pub fn verify(&self, token: &str) -> bool {
        let Some((payload, signature)) = token.rsplit_once('.') else {
            return false;
        };
        if self.sign(payload) != signature {
            return false;
        }
        let Some(expires) = payload.rsplit(':').next().and_then(|e| e.parse::<i64>().ok()) else {
            return false;
        };
        expires >= Utc::now().timestamp()
    }

    fn sign(&self, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hasher.update(b".");
        hasher.update(self.secret.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }
}
