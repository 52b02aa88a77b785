use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{truncate_body, CredentialError};
use crate::security::credential::{CredentialRecord, CredentialsBlob, TokenResponse};

/// Client for the upstream identity endpoint.
#[derive(Debug, Clone)]
pub struct TokenClient {
    token_url: String,
    user_agent: String,
    http_client: Client,
}

impl TokenClient {
    pub fn new(token_url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Result<Self, CredentialError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CredentialError::AuthRequest)?;

        Ok(Self {
            token_url: token_url.into(),
            user_agent: user_agent.into(),
            http_client,
        })
    }

    /// Exchange the credentials payload for a fresh bearer credential.
    ///
    /// POST {token_url} with the blob as a JSON body.
    /// Expects response: {"token": "...", "expires_in": N}
    pub async fn acquire(&self, credentials: &CredentialsBlob) -> Result<CredentialRecord, CredentialError> {
        debug!(url = %self.token_url, "requesting credential from identity endpoint");

        let response = self
            .http_client
            .post(&self.token_url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .body(credentials.bytes())
            .send()
            .await
            .map_err(CredentialError::AuthRequest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::AuthUpstream {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body = response.bytes().await.map_err(CredentialError::AuthRequest)?;
        let issued_at = Utc::now();

        let parsed: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| CredentialError::AuthParse(e.to_string()))?;

        if parsed.token.is_empty() {
            return Err(CredentialError::AuthParse("token missing or empty".to_string()));
        }

        debug!(
            token_len = parsed.token.len(),
            expires_in = parsed.expires_in,
            "credential received"
        );

        Ok(CredentialRecord::new(parsed.token, parsed.expires_in, issued_at))
    }
}
