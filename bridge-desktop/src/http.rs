//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// User agent sent with every request so the server can tell sync traffic
/// apart from browsers.
pub const USER_AGENT: &str = concat!("music-offline-sync/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - A fixed per-request timeout (30 seconds unless configured otherwise)
/// - An identifying user agent
/// - TLS via rustls
///
/// No retries are performed here.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with the default 30 second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Map a reqwest error to the bridge taxonomy
    fn classify_error(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Network("Request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::Network(format!("Connection failed: {}", error))
        } else if error.is_request() || error.is_body() || error.is_decode() {
            BridgeError::Network(error.to_string())
        } else if error.is_builder() {
            BridgeError::OperationFailed(format!("Invalid request: {}", error))
        } else {
            BridgeError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            "Executing HTTP request"
        );

        let url = request.url.clone();
        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url = %url, "HTTP request failed");
                Self::classify_error(e)
            })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, url = %url, status, "Failed to read response body");
            Self::classify_error(e)
        })?;

        debug!(status, bytes = body.len(), url = %url, "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = ReqwestHttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_user_agent_identifies_agent() {
        assert!(USER_AGENT.starts_with("music-offline-sync/"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 on localhost is the discard service, normally closed.
        let result = client
            .execute(HttpRequest::get("http://127.0.0.1:9/get_csrf"))
            .await;

        assert!(matches!(result, Err(BridgeError::Network(_))));
    }
}
