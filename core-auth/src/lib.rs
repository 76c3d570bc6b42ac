//! # Authentication Module
//!
//! Session handling for the offline sync agent.
//!
//! ## Overview
//!
//! The library server authenticates with an opaque token carried in a
//! `token` cookie. This crate obtains that token (`POST /login`), persists it
//! in the settings store, verifies it with a cheap request (`GET /get_csrf`) and
//! replaces it when the server stops accepting it.
//!
//! ## Features
//!
//! - Session state machine with bounded, backed-off login retries
//! - Server URL and credentials from a pluggable `CredentialProvider`
//! - Token persistence under the `sync_url` / `sync_token` settings
//! - Auth event emission on the core event bus

pub mod endpoint;
pub mod error;
pub mod manager;
pub mod token_store;
pub mod types;

pub use endpoint::{authenticate, ServerEndpoint};
pub use error::{is_session_status, AuthError, Result};
pub use manager::SessionManager;
pub use token_store::TokenStore;
pub use types::{AuthToken, SessionState, TokenResponse, SYNC_TOKEN_KEY, SYNC_URL_KEY};
