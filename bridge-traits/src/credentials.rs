//! Credential Provider Abstraction
//!
//! Supplies the server base URL and login credentials on demand. The desktop
//! bridge prompts on the terminal; tests and schedulers use scripted or
//! environment-backed providers.

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

/// Username and password pair submitted to the server's login endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Credential provider trait
///
/// Both methods may be called more than once per run: the server URL when it
/// has never been stored, the credentials once per login attempt.
///
/// # Errors
///
/// Implementations return [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
/// when they cannot obtain input at all (for example a terminal provider
/// running without a TTY). Callers treat that as a fatal configuration error.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Base URL of the authoritative server, e.g. `https://music.example.com`
    async fn server_url(&self) -> Result<String>;

    /// Credentials for a (re-)login
    async fn credentials(&self) -> Result<Credentials>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let credentials = Credentials::new("alice", "hunter2");
        let rendered = format!("{:?}", credentials);

        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
