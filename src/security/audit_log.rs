use tracing::{info, warn};

/// Operator-facing audit trail for the credential lifecycle.
///
/// Tokens are never logged; only their length and lifetime.
#[derive(Debug, Clone, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn credential_reused(&self, source: &str, expires_in_secs: i64) {
        info!(target: "audit", event = "credential_reused", source, expires_in_secs);
    }

    pub fn credential_acquired(&self, token_len: usize, lifetime_seconds: i64) {
        info!(target: "audit", event = "credential_acquired", token_len, lifetime_seconds);
    }

    pub fn credential_persist_failed(&self, error_msg: &str) {
        warn!(target: "audit", event = "credential_persist_failed", error = error_msg);
    }

    pub fn credential_acquire_failed(&self, error_msg: &str) {
        warn!(target: "audit", event = "credential_acquire_failed", error = error_msg);
    }

    pub fn lookup_forwarded(&self, search_code: &str, status: u16) {
        info!(target: "audit", event = "lookup_forwarded", search_code, status);
    }
}
