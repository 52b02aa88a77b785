use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::CredentialError;
use crate::security::credential::CredentialRecord;
use crate::security::token_store::CredentialStore;

/// In-memory credential cache with atomic swap.
///
/// Mirrors [`FileTokenStore`](crate::security::token_store::FileTokenStore):
/// the issuance time is the moment the record was stored, not the value the
/// caller put in the record.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    record: Arc<RwLock<Option<CredentialRecord>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for TokenCache {
    async fn load(&self) -> Option<CredentialRecord> {
        self.record.read().await.clone()
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), CredentialError> {
        let stored = CredentialRecord::new(record.token.clone(), record.lifetime_seconds, Utc::now());
        let mut guard = self.record.write().await;
        *guard = Some(stored);
        debug!("credential swapped in memory cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_token_cache_empty() {
        let cache = TokenCache::new();
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_token_cache_save_stamps_issuance() {
        let cache = TokenCache::new();
        let old = Utc::now() - Duration::hours(2);
        cache
            .save(&CredentialRecord::new("token".to_string(), 600, old))
            .await
            .unwrap();

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.token, "token");
        assert!(loaded.issued_at > old);
        assert!(cache.is_fresh(&loaded, Utc::now()));
    }

    #[tokio::test]
    async fn test_token_cache_swap() {
        let cache = TokenCache::new();
        cache
            .save(&CredentialRecord::new("first".to_string(), 600, Utc::now()))
            .await
            .unwrap();
        cache
            .save(&CredentialRecord::new("second".to_string(), 600, Utc::now()))
            .await
            .unwrap();
        assert_eq!(cache.load().await.unwrap().token, "second");
    }

    #[tokio::test]
    async fn test_token_cache_clone_shares_state() {
        let cache = TokenCache::new();
        let cloned = cache.clone();

        cloned
            .save(&CredentialRecord::new("new_token".to_string(), 600, Utc::now()))
            .await
            .unwrap();
        assert_eq!(cache.load().await.unwrap().token, "new_token");
    }

    #[tokio::test]
    async fn test_token_cache_stale_after_lifetime() {
        let cache = TokenCache::new();
        cache
            .save(&CredentialRecord::new("token".to_string(), 60, Utc::now()))
            .await
            .unwrap();
        let loaded = cache.load().await.unwrap();
        assert!(!cache.is_fresh(&loaded, Utc::now() + Duration::seconds(60)));
    }
}
