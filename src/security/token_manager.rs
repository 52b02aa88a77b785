//! Single entry point for obtaining a usable bearer credential.
//!
//! The manager composes a [`CredentialStore`] with a [`TokenClient`]. Callers
//! that find the credential absent or stale serialise on one refresh guard, so
//! concurrent misses collapse into a single upstream call. The guard is
//! released only after the new record has been handed to the store, and
//! waiting callers re-check the store before acquiring.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::CredentialError;
use crate::security::audit_log::AuditLogger;
use crate::security::credential::{CredentialRecord, CredentialsBlob};
use crate::security::token_client::TokenClient;
use crate::security::token_store::CredentialStore;

pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    client: TokenClient,
    credentials: CredentialsBlob,
    audit: AuditLogger,
    // Last record acquired by this manager. Only consulted when the store has
    // nothing fresh, e.g. after a failed save.
    refresh: Mutex<Option<CredentialRecord>>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, client: TokenClient, credentials: CredentialsBlob) -> Self {
        Self {
            store,
            client,
            credentials,
            audit: AuditLogger::new(),
            refresh: Mutex::new(None),
        }
    }

    /// Return a fresh bearer token, acquiring a new one when needed.
    ///
    /// Acquisition errors propagate unchanged. A failure to persist a newly
    /// acquired record is logged and the token is still returned.
    pub async fn get_credential(&self) -> Result<String, CredentialError> {
        // fast path without the guard
        if let Some(token) = self.fresh_from_store().await {
            return Ok(token);
        }

        let mut last_acquired = self.refresh.lock().await;
        // another caller may have refreshed while we waited
        if let Some(token) = self.fresh_from_store().await {
            return Ok(token);
        }

        let now = Utc::now();
        if let Some(record) = last_acquired.as_ref().filter(|r| r.is_fresh(now)) {
            self.audit
                .credential_reused("memory", record.remaining_seconds(now));
            return Ok(record.token.clone());
        }

        let record = match self.client.acquire(&self.credentials).await {
            Ok(r) => r,
            Err(e) => {
                self.audit.credential_acquire_failed(&e.to_string());
                return Err(e);
            }
        };
        self.audit
            .credential_acquired(record.token.len(), record.lifetime_seconds);

        if let Err(e) = self.store.save(&record).await {
            warn!(error = %e, "failed to persist credential, continuing with fresh token");
            self.audit.credential_persist_failed(&e.to_string());
        }

        let token = record.token.clone();
        *last_acquired = Some(record);
        Ok(token)
    }

    async fn fresh_from_store(&self) -> Option<String> {
        let record = self.store.load().await?;
        let now = Utc::now();
        if self.store.is_fresh(&record, now) {
            self.audit
                .credential_reused("store", record.remaining_seconds(now));
            return Some(record.token);
        }
        debug!(issued_at = %record.issued_at, "persisted credential is stale");
        None
    }
}
