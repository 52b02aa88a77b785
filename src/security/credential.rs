use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// How far in the future an issuance timestamp may sit and still count as "just issued".
pub const MAX_FUTURE_SKEW_SECS: i64 = 5;

/// Wire shape of the identity endpoint's response, and of the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub expires_in: i64,
}

/// A bearer credential together with the window in which it may be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub lifetime_seconds: i64,
}

impl CredentialRecord {
    pub fn new(token: String, lifetime_seconds: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            token,
            issued_at,
            lifetime_seconds,
        }
    }

    /// Fresh iff `now - issued_at < lifetime_seconds`, with one deliberate
    /// departure from that formula for clock skew.
    ///
    /// Non-positive lifetimes are never fresh. An `issued_at` slightly ahead of
    /// `now` (up to [`MAX_FUTURE_SKEW_SECS`]) is treated as age zero. Anything
    /// further in the future is stale, even though the plain formula would
    /// call it fresh. Lifetimes beyond chrono's range saturate instead of
    /// overflowing.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() || self.lifetime_seconds <= 0 {
            return false;
        }
        let mut age_ms = (now - self.issued_at).num_milliseconds();
        if age_ms < 0 {
            if age_ms < -MAX_FUTURE_SKEW_SECS * 1000 {
                return false;
            }
            age_ms = 0;
        }
        age_ms < self.lifetime_seconds.saturating_mul(1000)
    }

    /// Seconds of validity left at `now`; negative once stale.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let age = (now - self.issued_at).num_seconds();
        self.lifetime_seconds.saturating_sub(age)
    }

    pub fn to_response(&self) -> TokenResponse {
        TokenResponse {
            token: self.token.clone(),
            expires_in: self.lifetime_seconds,
        }
    }
}

/// Opaque authentication payload posted to the identity endpoint.
#[derive(Clone)]
pub struct CredentialsBlob {
    bytes: Bytes,
    source: Option<PathBuf>,
}

impl CredentialsBlob {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            source: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let bytes = std::fs::read(path).map_err(|source| CredentialError::CredentialsBlob {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            bytes: Bytes::from(bytes),
            source: Some(path.to_path_buf()),
        })
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

// Never print the payload; it carries client secrets.
impl std::fmt::Debug for CredentialsBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsBlob")
            .field("len", &self.bytes.len())
            .field("source", &self.source)
            .finish()
    }
}
