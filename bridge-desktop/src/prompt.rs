//! Credential providers for desktop hosts
//!
//! [`TerminalCredentialProvider`] asks the operator interactively;
//! [`EnvCredentialProvider`] reads fixed values for unattended runs.

use async_trait::async_trait;
use bridge_traits::{
    credentials::{CredentialProvider, Credentials},
    error::{BridgeError, Result},
};
use std::io::IsTerminal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

pub const ENV_SERVER_URL: &str = "MUSIC_SYNC_URL";
pub const ENV_USERNAME: &str = "MUSIC_SYNC_USERNAME";
pub const ENV_PASSWORD: &str = "MUSIC_SYNC_PASSWORD";

/// Prompts on stdin/stdout.
///
/// Refuses with `NotAvailable` when stdin is not a terminal so a scheduled
/// run never blocks waiting for input. The password is read without echo.
pub struct TerminalCredentialProvider {
    // Serializes prompts; two questions must not interleave on the terminal.
    lock: Mutex<()>,
    interactive: bool,
}

impl TerminalCredentialProvider {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            interactive: std::io::stdin().is_terminal(),
        }
    }

    fn ensure_terminal(&self) -> Result<()> {
        if self.interactive {
            Ok(())
        } else {
            Err(BridgeError::NotAvailable(
                "stdin is not a terminal; cannot prompt for sync settings".to_string(),
            ))
        }
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.ensure_terminal()?;
        let _guard = self.lock.lock().await;

        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        if read == 0 {
            return Err(BridgeError::NotAvailable(
                "stdin closed while prompting".to_string(),
            ));
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn ask_hidden(&self, question: &'static str) -> Result<String> {
        self.ensure_terminal()?;
        let _guard = self.lock.lock().await;

        tokio::task::spawn_blocking(move || rpassword::prompt_password(question))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("password prompt aborted: {}", e)))?
            .map_err(BridgeError::from)
    }
}

impl Default for TerminalCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for TerminalCredentialProvider {
    async fn server_url(&self) -> Result<String> {
        loop {
            let answer = self.ask("Enter server URL: ").await?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
        }
    }

    async fn credentials(&self) -> Result<Credentials> {
        let username = self.ask("Enter username: ").await?;
        let password = self.ask_hidden("Enter password: ").await?;
        debug!(username = %username, "Collected credentials from terminal");
        Ok(Credentials::new(username.trim(), password))
    }
}

/// Reads the server URL and credentials from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider {
    var_names: Option<(String, String, String)>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom variable names instead of `MUSIC_SYNC_*`
    pub fn with_vars(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            var_names: Some((url.into(), username.into(), password.into())),
        }
    }

    fn names(&self) -> (&str, &str, &str) {
        match &self.var_names {
            Some((url, user, pass)) => (url, user, pass),
            None => (ENV_SERVER_URL, ENV_USERNAME, ENV_PASSWORD),
        }
    }

    fn var(name: &str) -> Result<String> {
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(BridgeError::NotAvailable(format!("{} is not set", name))),
        }
    }

    /// Whether all three variables are present
    pub fn is_configured(&self) -> bool {
        let (url, user, pass) = self.names();
        [url, user, pass].iter().all(|name| Self::var(name).is_ok())
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn server_url(&self) -> Result<String> {
        Self::var(self.names().0)
    }

    async fn credentials(&self) -> Result<Credentials> {
        let (_, user, pass) = self.names();
        Ok(Credentials::new(Self::var(user)?, Self::var(pass)?))
    }
}
