use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings key holding the server base URL
pub const SYNC_URL_KEY: &str = "sync_url";

/// Settings key holding the session token
pub const SYNC_TOKEN_KEY: &str = "sync_token";

/// Session lifecycle.
///
/// ```text
/// NoToken ──> LoggingIn ──> Verifying ──> Valid
///                 ^            │
///                 └─ Invalid <─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing stored, a login is required
    NoToken,
    /// Collecting credentials and calling `/login`
    LoggingIn,
    /// Checking a token with a `/get_csrf` request
    Verifying,
    /// Token accepted by the check
    Valid,
    /// Token refused or unverifiable, a new login is required
    Invalid,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NoToken => "no_token",
            SessionState::LoggingIn => "logging_in",
            SessionState::Verifying => "verifying",
            SessionState::Valid => "valid",
            SessionState::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque session token issued by `/login`.
///
/// The server attaches no expiry; validity is only known from a request.
/// `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Body of `POST /login`
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body returned by `/login` and `/get_csrf`
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
