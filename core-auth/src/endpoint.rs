//! Server base URL and request construction.

use crate::error::{AuthError, Result};
use crate::types::AuthToken;
use bridge_traits::http::HttpRequest;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Base URL of the authoritative server.
///
/// Routes are appended to the base path, so a server mounted under a prefix
/// (`https://host/music`) works the same as one at the root.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    base: Url,
}

impl ServerEndpoint {
    /// Parse and validate a base URL
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] for anything that is not an absolute http(s) URL.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        let base = Url::parse(trimmed)
            .map_err(|e| AuthError::Config(format!("Invalid server URL '{}': {}", raw, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(AuthError::Config(format!(
                "Server URL must use http or https, got '{}'",
                base.scheme()
            )));
        }
        if base.query().is_some() || base.fragment().is_some() {
            return Err(AuthError::Config(format!(
                "Server URL must not carry a query or fragment: '{}'",
                raw
            )));
        }

        Ok(Self { base })
    }

    /// Canonical form, as persisted in `sync_url`
    pub fn as_str(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Full URL of `route` with percent-encoded query parameters
    pub fn url(&self, route: &str, query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        {
            let path = format!(
                "{}/{}",
                url.path().trim_end_matches('/'),
                route.trim_start_matches('/')
            );
            url.set_path(&path);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        url.into()
    }

    /// GET request for `route`
    pub fn get(&self, route: &str, query: &[(&str, &str)], timeout: Duration) -> HttpRequest {
        HttpRequest::get(self.url(route, query)).timeout(timeout)
    }

    /// POST request for `route`; the caller attaches the JSON body
    pub fn post(&self, route: &str, timeout: Duration) -> HttpRequest {
        HttpRequest::post(self.url(route, &[])).timeout(timeout)
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServerEndpoint").field(&self.as_str()).finish()
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attach the session cookie the server authenticates with
pub fn authenticate(request: HttpRequest, token: &AuthToken) -> HttpRequest {
    request.cookie("token", token.as_str())
}
