//! Error types for the credential lifecycle and the lookup relay.

use std::path::PathBuf;

use thiserror::Error;

/// Upper bound on how much of an upstream error body is kept for diagnostics.
pub const MAX_UPSTREAM_BODY: usize = 512;

/// Errors raised while obtaining or persisting a bearer credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The credential record could not be written to its backing store.
    #[error("failed to persist credential record to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The authentication request could not be built or sent.
    #[error("token request failed: {0}")]
    AuthRequest(#[source] reqwest::Error),

    /// The identity endpoint answered with a non-success status.
    #[error("token endpoint returned status {status}: {body}")]
    AuthUpstream { status: u16, body: String },

    /// The identity endpoint answered 200 but the payload was unusable.
    #[error("invalid token response: {0}")]
    AuthParse(String),

    /// The local credentials payload could not be read.
    #[error("failed to read credentials file {path}: {source}")]
    CredentialsBlob {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while relaying a lookup to the downstream endpoint.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The lookup request could not be sent.
    #[error("lookup request failed: {0}")]
    DownstreamRequest(#[source] reqwest::Error),

    /// The bearer token cannot be encoded as a header value.
    #[error("bearer token is not a valid header value")]
    InvalidToken,
}

/// A search key that does not match `^[A-Za-z0-9_]{3,7}$`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid search code: {0:?}")]
pub struct InvalidSearchKey(pub String);

/// Truncate an upstream body to [`MAX_UPSTREAM_BODY`] bytes on a char boundary.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_UPSTREAM_BODY {
        return body.to_string();
    }
    let mut end = MAX_UPSTREAM_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short_is_untouched() {
        assert_eq!(truncate_body("bad credentials"), "bad credentials");
    }

    #[test]
    fn test_truncate_body_long_is_bounded() {
        let long = "x".repeat(2000);
        let out = truncate_body(&long);
        assert_eq!(out.len(), MAX_UPSTREAM_BODY + 3);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        // 3-byte chars; 512 is not a multiple of 3
        let long = "あ".repeat(300);
        let out = truncate_body(&long);
        assert!(out.trim_end_matches("...").chars().all(|c| c == 'あ'));
        assert!(out.len() <= MAX_UPSTREAM_BODY + 3);
    }
}
