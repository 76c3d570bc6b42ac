//! # Session Manager
//!
//! Owns the session token and drives it to a verified state.
//!
//! ## Overview
//!
//! [`SessionManager::get_valid_token`] runs the session state machine until a
//! token has passed the `/get_csrf` check:
//!
//! 1. A stored token is checked first.
//! 2. Without one, or after the server refuses it, credentials are requested
//!    from the [`CredentialProvider`] and submitted to `/login`.
//! 3. Login attempts are bounded and spaced by exponential backoff; a fresh
//!    token that the check refuses twice ends the run.
//!
//! The first call also settles the server URL: the stored `sync_url`, or the
//! provider's answer, persisted for later runs.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::SessionManager;
//! use core_runtime::config::AuthSettings;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! use std::time::Duration;
//! # use bridge_traits::{CredentialProvider, HttpClient, SettingsStore};
//! # async fn example(
//! #     http: Arc<dyn HttpClient>,
//! #     prompt: Arc<dyn CredentialProvider>,
//! #     settings: Arc<dyn SettingsStore>,
//! # ) -> core_auth::Result<()> {
//! let session = SessionManager::new(
//!     http,
//!     prompt,
//!     settings,
//!     EventBus::default(),
//!     AuthSettings::default(),
//!     Duration::from_secs(30),
//! );
//!
//! let token = session.get_valid_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::endpoint::{authenticate, ServerEndpoint};
use crate::error::{is_session_status, AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{AuthToken, LoginRequest, SessionState, TokenResponse};
use bridge_traits::{
    BridgeError, CredentialProvider, HttpClient, HttpResponse, SettingsStore,
};
use core_runtime::config::{AuthSettings, CoreConfig};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

const LOGIN_ROUTE: &str = "/login";
const CHECK_ROUTE: &str = "/get_csrf";

/// Consecutive check refusals of a freshly issued token before giving up.
const MAX_FRESH_TOKEN_REJECTIONS: u32 = 2;

struct SessionInner {
    state: SessionState,
    endpoint: Option<ServerEndpoint>,
    token: Option<AuthToken>,
}

/// Session orchestrator shared by every authenticated caller.
///
/// Calls are serialized internally; concurrent callers wait for the one
/// running the state machine and then reuse its token.
pub struct SessionManager {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    token_store: TokenStore,
    event_bus: EventBus,
    policy: AuthSettings,
    request_timeout: Duration,
    inner: Mutex<SessionInner>,
}

impl SessionManager {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialProvider>,
        settings: Arc<dyn SettingsStore>,
        event_bus: EventBus,
        policy: AuthSettings,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http_client,
            credentials,
            token_store: TokenStore::new(settings),
            event_bus,
            policy,
            request_timeout,
            inner: Mutex::new(SessionInner {
                state: SessionState::NoToken,
                endpoint: None,
                token: None,
            }),
        }
    }

    /// Build from the core configuration
    pub fn from_config(
        config: &CoreConfig,
        settings: Arc<dyn SettingsStore>,
        event_bus: EventBus,
    ) -> Self {
        Self::new(
            config.http_client.clone(),
            config.credential_provider.clone(),
            settings,
            event_bus,
            config.auth,
            config.request_timeout,
        )
    }

    /// Current state of the session
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    /// Server endpoint, loading or asking for it on first use
    ///
    /// # Errors
    ///
    /// [`AuthError::Config`] when no URL is stored and the provider cannot
    /// supply a valid one.
    pub async fn endpoint(&self) -> Result<ServerEndpoint> {
        let mut inner = self.inner.lock().await;
        self.resolve_endpoint(&mut inner).await
    }

    /// Return a token the server currently accepts
    ///
    /// Blocks until the session is `Valid` or fails.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Config`] when no endpoint or credentials are available
    /// - [`AuthError::LoginFailed`] when logins keep being refused
    /// - [`AuthError::Network`] when the server stays unreachable
    #[instrument(skip(self))]
    pub async fn get_valid_token(&self) -> Result<AuthToken> {
        let mut inner = self.inner.lock().await;

        if inner.state == SessionState::Valid {
            if let Some(token) = inner.token.clone() {
                return Ok(token);
            }
        }

        let endpoint = self.resolve_endpoint(&mut inner).await?;

        if inner.token.is_none() {
            inner.token = self.token_store.load_token().await?;
        }
        inner.state = if inner.token.is_some() {
            SessionState::Verifying
        } else {
            SessionState::NoToken
        };

        let mut fresh_token = false;
        let mut fresh_rejections = 0u32;

        loop {
            debug!(state = %inner.state, "Session state");
            match inner.state {
                SessionState::NoToken | SessionState::Invalid => {
                    let reason = if inner.state == SessionState::NoToken {
                        "no token stored"
                    } else {
                        "token refused"
                    };
                    info!(reason, "Login required");
                    self.emit(AuthEvent::LoginRequired {
                        reason: reason.to_string(),
                    });
                    inner.state = SessionState::LoggingIn;
                }
                SessionState::LoggingIn => {
                    let token = match self.login(&endpoint).await {
                        Ok(token) => token,
                        Err(e) => {
                            inner.state = SessionState::NoToken;
                            self.emit(AuthEvent::AuthError {
                                message: e.to_string(),
                                recoverable: !e.is_fatal(),
                            });
                            return Err(e);
                        }
                    };
                    self.token_store.store_token(&token).await?;
                    inner.token = Some(token);
                    fresh_token = true;
                    inner.state = SessionState::Verifying;
                }
                SessionState::Verifying => {
                    let Some(token) = inner.token.clone() else {
                        inner.state = SessionState::NoToken;
                        continue;
                    };

                    match self.check_token(&endpoint, &token).await {
                        Ok(()) => {
                            info!("Authentication token is valid");
                            inner.state = SessionState::Valid;
                            self.emit(AuthEvent::TokenValidated);
                            return Ok(token);
                        }
                        Err(AuthError::Server { status, .. }) => {
                            warn!(status, "Token check refused the session token");
                            self.emit(AuthEvent::TokenRejected { status });
                            self.token_store.clear_token().await?;
                            inner.token = None;
                            inner.state = SessionState::Invalid;

                            if fresh_token {
                                fresh_rejections += 1;
                                if fresh_rejections >= MAX_FRESH_TOKEN_REJECTIONS {
                                    let e = AuthError::LoginFailed {
                                        attempts: fresh_rejections,
                                        last: format!(
                                            "freshly issued token refused by the token check with status {}",
                                            status
                                        ),
                                    };
                                    error!(error = %e, "Giving up on login");
                                    self.emit(AuthEvent::AuthError {
                                        message: e.to_string(),
                                        recoverable: true,
                                    });
                                    return Err(e);
                                }
                            }
                        }
                        Err(e) => {
                            // Unverifiable; the stored token stays in place
                            // for the next run.
                            warn!(error = %e, "Error testing authentication token, logging in again");
                            inner.token = None;
                            inner.state = SessionState::Invalid;
                        }
                    }
                }
                SessionState::Valid => {
                    if let Some(token) = inner.token.clone() {
                        return Ok(token);
                    }
                    inner.state = SessionState::NoToken;
                }
            }
        }
    }

    /// Mark `rejected` as refused by the server
    ///
    /// Called by request layers on 401/403. A token that has already been
    /// replaced is left alone, so two callers reporting the same refusal cause
    /// a single re-login.
    #[instrument(skip(self, rejected))]
    pub async fn invalidate(&self, rejected: &AuthToken, status: u16) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.token.as_ref() != Some(rejected) {
            debug!("Refused token was already replaced");
            return Ok(());
        }

        warn!(status, "Server refused the session token");
        self.emit(AuthEvent::TokenRejected { status });
        self.token_store.clear_token().await?;
        inner.token = None;
        inner.state = SessionState::Invalid;
        Ok(())
    }

    async fn resolve_endpoint(&self, inner: &mut SessionInner) -> Result<ServerEndpoint> {
        if let Some(endpoint) = &inner.endpoint {
            return Ok(endpoint.clone());
        }

        let endpoint = match self.token_store.load_url().await? {
            Some(url) => ServerEndpoint::parse(&url)?,
            None => {
                info!("No sync server is configured");
                let answer = self
                    .credentials
                    .server_url()
                    .await
                    .map_err(provider_error)?;
                let endpoint = ServerEndpoint::parse(&answer)?;
                self.token_store.store_url(endpoint.as_str()).await?;
                endpoint
            }
        };

        inner.endpoint = Some(endpoint.clone());
        Ok(endpoint)
    }

    /// Bounded login loop
    async fn login(&self, endpoint: &ServerEndpoint) -> Result<AuthToken> {
        let mut last_failure = String::new();
        let mut last_was_transport = false;

        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Waiting before login");
                tokio::time::sleep(delay).await;
            }

            let credentials = self
                .credentials
                .credentials()
                .await
                .map_err(provider_error)?;

            let request = endpoint
                .post(LOGIN_ROUTE, self.request_timeout)
                .json(&LoginRequest {
                    username: &credentials.username,
                    password: &credentials.password,
                })
                .map_err(|e| AuthError::Config(e.to_string()))?;

            match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => match parse_token(&response) {
                    Ok(token) => {
                        info!(attempt, "Logged in successfully");
                        self.emit(AuthEvent::LoggedIn { attempts: attempt });
                        return Ok(token);
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "Malformed login response");
                        last_failure = e.to_string();
                        last_was_transport = false;
                    }
                },
                Ok(response) => {
                    warn!(
                        attempt,
                        status = response.status,
                        endpoint = LOGIN_ROUTE,
                        "Login refused, please try again"
                    );
                    last_failure = format!("server returned {}", response.status);
                    last_was_transport = false;
                }
                Err(e) => {
                    warn!(attempt, error = %e, endpoint = LOGIN_ROUTE, "Error during log in");
                    last_failure = e.to_string();
                    last_was_transport = true;
                }
            }
        }

        error!(
            attempts = self.policy.max_attempts,
            last = %last_failure,
            "Login attempts exhausted"
        );

        if last_was_transport {
            Err(AuthError::Network(last_failure))
        } else {
            Err(AuthError::LoginFailed {
                attempts: self.policy.max_attempts,
                last: last_failure,
            })
        }
    }

    async fn check_token(&self, endpoint: &ServerEndpoint, token: &AuthToken) -> Result<()> {
        let request = authenticate(
            endpoint.get(CHECK_ROUTE, &[], self.request_timeout),
            token,
        );
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(AuthError::from_transport)?;

        if response.is_success() {
            Ok(())
        } else {
            if !is_session_status(response.status) {
                debug!(status = response.status, "Token check failed with non-session status");
            }
            Err(AuthError::Server {
                status: response.status,
                endpoint: CHECK_ROUTE.to_string(),
            })
        }
    }

    fn emit(&self, event: AuthEvent) {
        self.event_bus.emit(CoreEvent::Auth(event)).ok();
    }
}

fn parse_token(response: &HttpResponse) -> Result<AuthToken> {
    let parsed: TokenResponse = response.json().map_err(|e| AuthError::InvalidResponse {
        endpoint: LOGIN_ROUTE.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.token.is_empty() {
        return Err(AuthError::InvalidResponse {
            endpoint: LOGIN_ROUTE.to_string(),
            reason: "empty token".to_string(),
        });
    }
    Ok(AuthToken::new(parsed.token))
}

/// Any failure to obtain input is a configuration problem the operator must fix
fn provider_error(error: BridgeError) -> AuthError {
    match error {
        BridgeError::NotAvailable(msg) => {
            AuthError::Config(format!("No interactive input available: {}", msg))
        }
        other => AuthError::Config(format!("Credential provider failed: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::SqliteSettingsStore;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{Credentials, HttpMethod, HttpRequest};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    mock! {
        Prompt {}

        #[async_trait]
        impl CredentialProvider for Prompt {
            async fn server_url(&self) -> BridgeResult<String>;
            async fn credentials(&self) -> BridgeResult<Credentials>;
        }
    }

    fn quick_policy() -> AuthSettings {
        AuthSettings::default().with_backoff(Duration::ZERO, Duration::ZERO)
    }

    fn prompt_with_credentials() -> MockPrompt {
        let mut prompt = MockPrompt::new();
        prompt
            .expect_server_url()
            .returning(|| Ok("https://music.example.com".to_string()));
        prompt
            .expect_credentials()
            .returning(|| Ok(Credentials::new("alice", "secret")));
        prompt
    }

    async fn settings() -> Arc<dyn SettingsStore> {
        Arc::new(SqliteSettingsStore::in_memory().await.unwrap())
    }

    fn manager(
        http: MockHttpClient,
        prompt: MockPrompt,
        settings: Arc<dyn SettingsStore>,
        bus: EventBus,
    ) -> SessionManager {
        SessionManager::new(
            Arc::new(http),
            Arc::new(prompt),
            settings,
            bus,
            quick_policy(),
            Duration::from_secs(30),
        )
    }

    fn token_json(token: &str) -> HttpResponse {
        HttpResponse::new(200, format!(r#"{{"token": "{}"}}"#, token))
    }

    #[tokio::test]
    async fn test_stored_token_checked_and_accepted() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();
        settings.set_string("sync_token", "stored").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Get
                    && req.url == "https://music.example.com/get_csrf"
                    && req.cookie_header() == Some("token=stored")
                    && req.timeout == Some(Duration::from_secs(30))
            })
            .times(1)
            .returning(|_| Ok(token_json("csrf-1")));

        let mut prompt = MockPrompt::new();
        prompt.expect_credentials().never();
        prompt.expect_server_url().never();

        let session = manager(http, prompt, settings, EventBus::default());

        let token = session.get_valid_token().await.unwrap();
        assert_eq!(token.as_str(), "stored");
        assert_eq!(session.state().await, SessionState::Valid);

        // Cached; no second check.
        session.get_valid_token().await.unwrap();
    }

    #[tokio::test]
    async fn test_first_run_prompts_for_url_and_logs_in() {
        let settings = settings().await;

        let mut http = MockHttpClient::new();
        http.expect_execute().times(2).returning(|req| {
            if req.url.ends_with("/login") {
                let body: serde_json::Value =
                    serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
                assert_eq!(body["username"], "alice");
                assert_eq!(body["password"], "secret");
                assert!(req.cookie_header().is_none());
                Ok(token_json("fresh"))
            } else {
                assert_eq!(req.cookie_header(), Some("token=fresh"));
                Ok(token_json("csrf"))
            }
        });

        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let session = manager(http, prompt_with_credentials(), settings.clone(), bus);

        let token = session.get_valid_token().await.unwrap();
        assert_eq!(token.as_str(), "fresh");
        assert_eq!(
            settings.get_string("sync_url").await.unwrap(),
            Some("https://music.example.com".to_string())
        );
        assert_eq!(
            settings.get_string("sync_token").await.unwrap(),
            Some("fresh".to_string())
        );

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::LoginRequired { .. })
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::LoggedIn { attempts: 1 })
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenValidated)
        );
    }

    #[tokio::test]
    async fn test_rejected_token_replaced_by_new_login() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();
        settings.set_string("sync_token", "old").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute().times(3).returning(|req| {
            match (req.url.ends_with("/login"), req.cookie_header()) {
                (true, _) => Ok(token_json("new")),
                (false, Some("token=old")) => Ok(HttpResponse::new(401, "")),
                (false, Some("token=new")) => Ok(token_json("csrf")),
                other => panic!("unexpected request {:?}", other),
            }
        });

        let session = manager(http, prompt_with_credentials(), settings.clone(), EventBus::default());

        let token = session.get_valid_token().await.unwrap();
        assert_eq!(token.as_str(), "new");
        assert_eq!(
            settings.get_string("sync_token").await.unwrap(),
            Some("new".to_string())
        );
    }

    #[tokio::test]
    async fn test_login_retries_after_network_failure() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();

        let logins = Arc::new(AtomicUsize::new(0));
        let counter = logins.clone();

        let mut http = MockHttpClient::new();
        http.expect_execute().returning(move |req| {
            if req.url.ends_with("/login") {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(BridgeError::Network("connection reset".to_string()))
                } else {
                    Ok(token_json("t"))
                }
            } else {
                Ok(token_json("csrf"))
            }
        });

        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let session = manager(http, prompt_with_credentials(), settings, bus);

        session.get_valid_token().await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 2);

        let _login_required = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::LoggedIn { attempts: 2 })
        );
    }

    #[tokio::test]
    async fn test_login_attempts_are_bounded() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(HttpResponse::new(403, "")));

        let session = manager(http, prompt_with_credentials(), settings, EventBus::default());

        match session.get_valid_token().await {
            Err(AuthError::LoginFailed { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("403"));
            }
            other => panic!("expected LoginFailed, got {:?}", other),
        }
        assert_eq!(session.state().await, SessionState::NoToken);
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_network_error() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Err(BridgeError::Network("dns failure".to_string())));

        let session = manager(http, prompt_with_credentials(), settings, EventBus::default());

        assert!(matches!(
            session.get_valid_token().await,
            Err(AuthError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_fresh_token_refused_twice_fails() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute().times(4).returning(|req| {
            if req.url.ends_with("/login") {
                Ok(token_json("useless"))
            } else {
                Ok(HttpResponse::new(401, ""))
            }
        });

        let session = manager(http, prompt_with_credentials(), settings.clone(), EventBus::default());

        assert!(matches!(
            session.get_valid_token().await,
            Err(AuthError::LoginFailed { attempts: 2, .. })
        ));
        assert!(settings.get_string("sync_token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_terminal_is_fatal_config_error() {
        let settings = settings().await;

        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let mut prompt = MockPrompt::new();
        prompt
            .expect_server_url()
            .times(1)
            .returning(|| Err(BridgeError::NotAvailable("stdin is not a terminal".to_string())));

        let session = manager(http, prompt, settings, EventBus::default());

        let err = session.get_valid_token().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_fatal_without_retry() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let mut prompt = MockPrompt::new();
        prompt
            .expect_credentials()
            .times(1)
            .returning(|| Err(BridgeError::NotAvailable("MUSIC_SYNC_USERNAME is not set".to_string())));

        let session = manager(http, prompt, settings, EventBus::default());

        assert!(matches!(
            session.get_valid_token().await,
            Err(AuthError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_login() {
        let settings = settings().await;
        settings.set_string("sync_url", "https://music.example.com").await.unwrap();
        settings.set_string("sync_token", "old").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|req| {
            if req.url.ends_with("/login") {
                Ok(token_json("new"))
            } else {
                Ok(token_json("csrf"))
            }
        });

        let session = manager(http, prompt_with_credentials(), settings, EventBus::default());

        let old = session.get_valid_token().await.unwrap();
        assert_eq!(old.as_str(), "old");

        session.invalidate(&old, 401).await.unwrap();
        assert_eq!(session.state().await, SessionState::Invalid);

        // A second report for the same token is ignored once replaced.
        let new = session.get_valid_token().await.unwrap();
        assert_eq!(new.as_str(), "new");
        session.invalidate(&old, 401).await.unwrap();
        assert_eq!(session.state().await, SessionState::Valid);
    }

    #[tokio::test]
    async fn test_invalid_stored_url_is_config_error() {
        let settings = settings().await;
        settings.set_string("sync_url", "not a url").await.unwrap();

        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let session = manager(http, MockPrompt::new(), settings, EventBus::default());

        assert!(matches!(session.endpoint().await, Err(AuthError::Config(_))));
    }
}
