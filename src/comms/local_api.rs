use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, error, info};

use crate::config::{Config, TokenCacheKind};
use crate::security::audit_log::AuditLogger;
use crate::security::credential::CredentialsBlob;
use crate::security::token_cache::TokenCache;
use crate::security::token_client::TokenClient;
use crate::security::token_manager::TokenManager;
use crate::security::token_store::{CredentialStore, FileTokenStore};
use crate::transport::lookup::LookupClient;
use crate::transport::SearchKey;

type SharedState = Arc<AppState>;

pub struct AppState {
    pub tokens: TokenManager,
    pub lookup: LookupClient,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(tokens: TokenManager, lookup: LookupClient) -> Self {
        Self {
            tokens,
            lookup,
            audit: AuditLogger::new(),
        }
    }

    /// Wire the credential manager and lookup client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn CredentialStore> = match config.token_cache {
            TokenCacheKind::File => Arc::new(FileTokenStore::new(&config.token_file)),
            TokenCacheKind::Memory => Arc::new(TokenCache::new()),
        };
        let credentials = CredentialsBlob::from_file(&config.credentials_file)
            .context("loading upstream credentials")?;
        let client = TokenClient::new(&config.token_url, &config.user_agent, config.timeout())
            .context("building token client")?;
        let lookup = LookupClient::new(&config.lookup_url, &config.user_agent, config.timeout())
            .context("building lookup client")?;

        debug!(
            token_url = %config.token_url,
            lookup_url = %config.lookup_url,
            token_cache = ?config.token_cache,
            "relay state initialized"
        );

        Ok(Self::new(TokenManager::new(store, client, credentials), lookup))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search_code: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// Health check
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Query parameter wins; otherwise the path segment is the search code.
fn extract_search_code(uri: &Uri, params: &SearchParams) -> String {
    match params.search_code.as_deref() {
        Some(code) => code.to_string(),
        None => uri.path().trim_start_matches('/').to_string(),
    }
}

async fn search_code_handler(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Query(params): Query<SearchParams>,
) -> Response {
    // Preflight and anything else that is not a lookup
    if method != Method::GET {
        return StatusCode::NO_CONTENT.into_response();
    }

    let raw = extract_search_code(&uri, &params);
    let key = match SearchKey::parse(&raw) {
        Ok(k) => k,
        Err(e) => {
            debug!(error = %e, "rejecting lookup");
            return error_response(StatusCode::BAD_REQUEST, "invalid search code");
        }
    };

    let token = match state.tokens.get_credential().await {
        Ok(t) => t,
        Err(e) => {
            error!(search_code = %key, error = %e, "failed to obtain credential");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable");
        }
    };

    let upstream = match state.lookup.forward(&key, &token).await {
        Ok(r) => r,
        Err(e) => {
            error!(search_code = %key, error = %e, "lookup request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "upstream unavailable");
        }
    };

    state.audit.lookup_forwarded(key.as_str(), upstream.status.as_u16());

    let mut response = Response::new(Body::from_stream(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
        .headers_mut()
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));
    response
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", any(search_code_handler))
        .route("/{search_code}", any(search_code_handler))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("access-control-allow-origin"),
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("access-control-allow-methods"),
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("access-control-allow-headers"),
            HeaderValue::from_static("*"),
        ))
        .with_state(state)
}

pub async fn serve(config: Config, port: u16) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).into_future().await?;
    Ok(())
}
