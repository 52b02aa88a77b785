use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ForwardError;
use crate::transport::SearchKey;

// Hop-by-hop headers plus those the relay owns itself.
const DROPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Downstream response handed back to the dispatcher untouched.
pub struct LookupResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
}

impl std::fmt::Debug for LookupResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Client for the downstream searchcode endpoint.
#[derive(Debug, Clone)]
pub struct LookupClient {
    base_url: String,
    user_agent: String,
    http_client: Client,
}

impl LookupClient {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ForwardError::DownstreamRequest)?;

        Ok(Self {
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            http_client,
        })
    }

    /// GET {base_url}/{key} with the bearer token; any received status is relayed.
    pub async fn forward(&self, key: &SearchKey, token: &str) -> Result<LookupResponse, ForwardError> {
        let url = format!("{}/{}", self.base_url, key);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ForwardError::InvalidToken)?;

        trace!(url = %url, "forwarding lookup");

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, bearer)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(ForwardError::DownstreamRequest)?;

        let status = response.status();
        let headers = relay_headers(response.headers());
        debug!(url = %url, status_code = %status.as_u16(), "lookup response received");

        Ok(LookupResponse {
            status,
            headers,
            body: response.bytes_stream().boxed(),
        })
    }
}

fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if is_relayed(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

fn is_relayed(name: &HeaderName) -> bool {
    let n = name.as_str();
    !DROPPED_HEADERS.contains(&n) && !n.starts_with("access-control-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    async fn collect(resp: LookupResponse) -> Vec<u8> {
        resp.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    fn client_for(server: &mockito::ServerGuard) -> LookupClient {
        LookupClient::new(format!("{}/api/v1/searchcode", server.url()), "relay-test/1.0", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_forward_sends_bearer_and_relays_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/searchcode/1000001")
            .match_header("authorization", "Bearer tok123")
            .match_header("user-agent", "relay-test/1.0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"zipcode":"1000001"}"#)
            .create_async()
            .await;

        let key = SearchKey::parse("1000001").unwrap();
        let resp = client_for(&server).forward(&key, "tok123").await.unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(collect(resp).await, br#"{"zipcode":"1000001"}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_relays_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api/v1/searchcode/ABC")
            .with_status(500)
            .with_body("internal failure")
            .create_async()
            .await;

        let key = SearchKey::parse("ABC").unwrap();
        let resp = client_for(&server).forward(&key, "tok").await.unwrap();

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(collect(resp).await, b"internal failure");
    }

    #[tokio::test]
    async fn test_forward_rejects_token_with_newline() {
        let server = mockito::Server::new_async().await;
        let key = SearchKey::parse("abc").unwrap();
        let err = client_for(&server).forward(&key, "bad\ntoken").await.unwrap_err();
        assert!(matches!(err, ForwardError::InvalidToken));
    }

    #[tokio::test]
    async fn test_forward_unreachable_upstream() {
        let client = LookupClient::new("http://127.0.0.1:1/searchcode", "relay-test/1.0", Duration::from_secs(2)).unwrap();
        let key = SearchKey::parse("abc").unwrap();
        let err = client.forward(&key, "tok").await.unwrap_err();
        assert!(matches!(err, ForwardError::DownstreamRequest(_)));
    }

    #[test]
    fn test_relay_headers_drops_hop_by_hop_and_cors() {
        let mut upstream = HeaderMap::new();
        upstream.insert("content-type", HeaderValue::from_static("application/json"));
        upstream.insert("x-request-id", HeaderValue::from_static("r-1"));
        upstream.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        upstream.insert("connection", HeaderValue::from_static("keep-alive"));
        upstream.insert("content-length", HeaderValue::from_static("12"));
        upstream.insert("access-control-allow-origin", HeaderValue::from_static("https://x"));

        let relayed = relay_headers(&upstream);
        assert_eq!(relayed.len(), 2);
        assert!(relayed.contains_key("content-type"));
        assert!(relayed.contains_key("x-request-id"));
    }
}
