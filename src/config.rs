use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOKEN_URL: &str = "https://api.da.pf.japanpost.jp/api/v1/j/token";
pub const DEFAULT_LOOKUP_URL: &str = "https://api.da.pf.japanpost.jp/api/v1/searchcode";

/// Where the current credential record is kept between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenCacheKind {
    /// JSON file whose modification time marks issuance.
    #[default]
    File,
    /// Process-local cache; every restart re-authenticates.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token_url: String,
    pub lookup_url: String,
    pub token_file: PathBuf,
    pub credentials_file: PathBuf,
    pub token_cache: TokenCacheKind,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            token_file: PathBuf::from("access_token.json"),
            credentials_file: PathBuf::from("credentials.json"),
            token_cache: TokenCacheKind::File,
            timeout_secs: 10,
            user_agent: format!("searchcode-relay/{}", crate::VERSION),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let cfg: Config = serde_json::from_str(&raw).context("parsing JSON")?;
        Ok(cfg)
    }

    /// Load from `path` when given, otherwise start from defaults; then apply env overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("SEARCHCODE_TOKEN_URL") {
            self.token_url = url;
        }
        if let Ok(url) = std::env::var("SEARCHCODE_LOOKUP_URL") {
            self.lookup_url = url;
        }
        if let Ok(p) = std::env::var("SEARCHCODE_TOKEN_FILE") {
            self.token_file = PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("SEARCHCODE_CREDENTIALS_FILE") {
            self.credentials_file = PathBuf::from(p);
        }
        self.token_url = self.token_url.trim_end_matches('/').to_string();
        self.lookup_url = self.lookup_url.trim_end_matches('/').to_string();
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "token_url": "http://127.0.0.1:9000/token",
                "lookup_url": "http://127.0.0.1:9000/searchcode",
                "token_file": "/var/lib/relay/token.json",
                "token_cache": "memory",
                "timeout_secs": 3
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.token_url, "http://127.0.0.1:9000/token");
        assert_eq!(config.lookup_url, "http://127.0.0.1:9000/searchcode");
        assert_eq!(config.token_file, PathBuf::from("/var/lib/relay/token.json"));
        assert_eq!(config.token_cache, TokenCacheKind::Memory);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        // untouched fields keep their defaults
        assert_eq!(config.credentials_file, PathBuf::from("credentials.json"));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.lookup_url, DEFAULT_LOOKUP_URL);
        assert_eq!(config.token_cache, TokenCacheKind::File);
        assert_eq!(config.timeout_secs, 10);
        assert!(config.user_agent.starts_with("searchcode-relay/"));
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_unknown_cache_kind() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"token_cache": "redis"}}"#).unwrap();

        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
