//! # Remote Client
//!
//! Authenticated access to the library server.
//!
//! Every request carries the session cookie and the configured timeout. A
//! transport failure becomes [`SyncError::Network`], a non-2xx status becomes
//! [`SyncError::Server`]. When the server answers 401 or 403 the session is
//! invalidated, a fresh token obtained and the request sent once more; a
//! second refusal is returned to the caller.

use crate::catalog::CatalogPage;
use crate::error::{Result, SyncError};
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::{authenticate, is_session_status, AuthToken, ServerEndpoint, SessionManager};
use core_runtime::config::CoreConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const CSRF_ROUTE: &str = "/get_csrf";
pub const TRACK_LIST_ROUTE: &str = "/track_list";
pub const TRACK_ROUTE: &str = "/get_track";
pub const COVER_ROUTE: &str = "/get_album_cover";
pub const LYRICS_ROUTE: &str = "/get_lyrics";
pub const HISTORY_ROUTE: &str = "/history_played";

#[derive(Debug, Deserialize)]
struct CsrfResponse {
    token: String,
}

/// Body of `POST /history_played`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPlayed<'a> {
    pub csrf: &'a str,
    pub track: &'a str,
    pub playlist: &'a str,
    pub timestamp: i64,
    pub start_timestamp: i64,
    pub lastfm_eligible: bool,
}

/// HTTP access to the library server on behalf of the current session
pub struct RemoteClient {
    session: Arc<SessionManager>,
    http_client: Arc<dyn HttpClient>,
    request_timeout: Duration,
}

impl RemoteClient {
    pub fn new(
        session: Arc<SessionManager>,
        http_client: Arc<dyn HttpClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session,
            http_client,
            request_timeout,
        }
    }

    pub fn from_config(config: &CoreConfig, session: Arc<SessionManager>) -> Self {
        Self::new(session, config.http_client.clone(), config.request_timeout)
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Authenticated GET
    pub async fn get(&self, route: &str, query: &[(&str, &str)]) -> Result<HttpResponse> {
        let timeout = self.request_timeout;
        self.send(route, |endpoint| Ok(endpoint.get(route, query, timeout)))
            .await
    }

    /// Authenticated POST with a JSON body
    pub async fn post_json<T>(&self, route: &str, body: &T) -> Result<HttpResponse>
    where
        T: Serialize + Sync,
    {
        let timeout = self.request_timeout;
        self.send(route, |endpoint| {
            endpoint
                .post(route, timeout)
                .json(body)
                .map_err(|e| SyncError::Data(format!("cannot encode body for {}: {}", route, e)))
        })
        .await
    }

    /// Fresh anti-forgery token for mutating calls
    pub async fn csrf_token(&self) -> Result<String> {
        let response = self.get(CSRF_ROUTE, &[]).await?;
        let parsed: CsrfResponse = response
            .json()
            .map_err(|e| SyncError::Data(format!("{}: {}", CSRF_ROUTE, e)))?;
        if parsed.token.is_empty() {
            return Err(SyncError::Data(format!("{}: empty token", CSRF_ROUTE)));
        }
        Ok(parsed.token)
    }

    /// One page of the catalog; `cursor` continues a partial listing
    pub async fn track_list(&self, cursor: Option<&str>) -> Result<CatalogPage> {
        let query: Vec<(&str, &str)> = cursor.map(|c| ("cursor", c)).into_iter().collect();
        let response = self.get(TRACK_LIST_ROUTE, &query).await?;
        response
            .json()
            .map_err(|e| SyncError::Data(format!("{}: {}", TRACK_LIST_ROUTE, e)))
    }

    /// Audio bytes at the given quality tier
    pub async fn download_audio(&self, path: &str, quality: &str) -> Result<Bytes> {
        let response = self
            .get(TRACK_ROUTE, &[("type", quality), ("path", path)])
            .await?;
        Ok(response.body)
    }

    /// Cover image bytes at the given quality tier
    pub async fn download_cover(&self, path: &str, quality: &str) -> Result<Bytes> {
        let response = self
            .get(COVER_ROUTE, &[("quality", quality), ("path", path)])
            .await?;
        Ok(response.body)
    }

    /// Serialized lyrics payload
    pub async fn download_lyrics(&self, path: &str) -> Result<String> {
        let response = self.get(LYRICS_ROUTE, &[("path", path)]).await?;
        response
            .text()
            .map_err(|e| SyncError::Data(format!("{} for '{}': {}", LYRICS_ROUTE, path, e)))
    }

    /// Report one play
    pub async fn post_history(&self, played: &HistoryPlayed<'_>) -> Result<()> {
        self.post_json(HISTORY_ROUTE, played).await?;
        Ok(())
    }

    #[instrument(skip(self, build), fields(route = route))]
    async fn send<F>(&self, route: &str, build: F) -> Result<HttpResponse>
    where
        F: Fn(&ServerEndpoint) -> Result<HttpRequest> + Send + Sync,
    {
        let endpoint = self.session.endpoint().await?;
        let mut token = self.session.get_valid_token().await?;
        let mut retried = false;

        loop {
            let response = self.execute(route, build(&endpoint)?, &token).await?;

            if response.is_success() {
                return Ok(response);
            }

            if is_session_status(response.status) && !retried {
                warn!(
                    status = response.status,
                    endpoint = route,
                    "Session refused, logging in again"
                );
                self.session.invalidate(&token, response.status).await?;
                token = self.session.get_valid_token().await?;
                retried = true;
                continue;
            }

            warn!(status = response.status, endpoint = route, "Request failed");
            return Err(SyncError::Server {
                status: response.status,
                endpoint: route.to_string(),
            });
        }
    }

    async fn execute(
        &self,
        route: &str,
        request: HttpRequest,
        token: &AuthToken,
    ) -> Result<HttpResponse> {
        let request = authenticate(request, token);
        debug!(method = request.method.as_str(), endpoint = route, "Sending request");

        self.http_client.execute(request).await.map_err(|e| {
            warn!(endpoint = route, error = %e, "Request did not complete");
            SyncError::from_transport(route, e)
        })
    }
}
