use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CredentialError;
use crate::security::credential::{CredentialRecord, TokenResponse};

/// Persistence seam for the current credential record.
///
/// `load` never fails: a missing, unreadable or corrupt record is reported as
/// `None` so the caller re-authenticates. `save` replaces the record as a
/// whole; concurrent `load`s see either the old or the new record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Option<CredentialRecord>;

    async fn save(&self, record: &CredentialRecord) -> Result<(), CredentialError>;

    fn is_fresh(&self, record: &CredentialRecord, now: DateTime<Utc>) -> bool {
        record.is_fresh(now)
    }
}

/// File-backed store. The file holds the raw `{token, expires_in}` payload and
/// its modification time is the issuance timestamp.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_record(path: &Path) -> Option<CredentialRecord> {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted credential record");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable credential record, treating as absent");
                return None;
            }
        };

        let parsed: TokenResponse = match serde_json::from_slice(&data) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt credential record, treating as absent");
                return None;
            }
        };

        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "credential record has no modification time");
                return None;
            }
        };

        Some(CredentialRecord::new(
            parsed.token,
            parsed.expires_in,
            DateTime::<Utc>::from(modified),
        ))
    }

    fn write_record(path: &Path, record: &CredentialRecord) -> Result<(), CredentialError> {
        let persistence = |source: std::io::Error| CredentialError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let body = serde_json::to_vec(&record.to_response())
            .map_err(|e| persistence(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        // NamedTempFile is created 0600 on unix; rename keeps those permissions.
        let mut tmp = NamedTempFile::new_in(dir).map_err(persistence)?;
        tmp.write_all(&body).map_err(persistence)?;
        tmp.as_file().sync_all().map_err(persistence)?;
        tmp.persist(path).map_err(|e| persistence(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileTokenStore {
    async fn load(&self) -> Option<CredentialRecord> {
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || Self::read_record(&path)).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "credential load task failed");
                None
            }
        }
    }

    async fn save(&self, record: &CredentialRecord) -> Result<(), CredentialError> {
        let path = self.path.clone();
        let record = record.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || Self::write_record(&path, &record))
            .await
            .map_err(|e| CredentialError::Persistence {
                path: target,
                source: std::io::Error::other(e),
            })??;
        debug!(path = %self.path.display(), "credential record persisted");
        Ok(())
    }
}
