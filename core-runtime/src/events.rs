//! # Event Bus System
//!
//! Typed events published by the session manager and the sync engine over a
//! `tokio::sync::broadcast` channel.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wraps [`AuthEvent`] and [`SyncEvent`]
//! - **EventBus**: broadcast channel for publishing events
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌────────────────┐   emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ SessionManager ├─────────>│          ├────────────>│ CLI output │
//! └────────────────┘          │ EventBus │             └────────────┘
//! ┌────────────────┐   emit   │          │  subscribe  ┌────────────┐
//! │ SyncCoordinator├─────────>│          ├────────────>│   tests    │
//! └────────────────┘          └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Sync(SyncEvent::Started {
//!     cycle_id: "cycle-1".to_string(),
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Sync started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Emitting with no subscribers returns `SendError`; publishers ignore it with
//! `.ok()`. Slow subscribers receive `RecvError::Lagged(n)` and may continue;
//! `RecvError::Closed` means every sender is gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// A cycle emits one event per changed track, so large catalogs may outrun a
/// slow subscriber; those subscribers see `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session handling
    Auth(AuthEvent),
    /// Sync cycle progress
    Sync(SyncEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Sync(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::TokenRejected { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::TrackSkipped { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::LoggedIn { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by the session manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// No usable token; a login is about to start.
    LoginRequired {
        /// Why the token is unusable ("no token", "rejected by server", ...)
        reason: String,
    },
    /// Login succeeded and a new token was stored.
    LoggedIn {
        /// Attempts it took, starting at 1
        attempts: u32,
    },
    /// The check request accepted the token.
    TokenValidated,
    /// The server refused the token.
    TokenRejected {
        /// HTTP status of the refusal
        status: u16,
    },
    /// Authentication failed for good.
    AuthError {
        message: String,
        /// Whether re-running the agent later may succeed
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::LoginRequired { .. } => "Login required",
            AuthEvent::LoggedIn { .. } => "Logged in",
            AuthEvent::TokenValidated => "Session token validated",
            AuthEvent::TokenRejected { .. } => "Session token rejected",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted during a sync cycle, in cycle order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Cycle initiated.
    Started { cycle_id: String },
    /// History queue drained.
    HistoryFlushed { cycle_id: String, delivered: u64 },
    /// Remote catalog fetched and diffed.
    CatalogFetched {
        cycle_id: String,
        playlists: u64,
        tracks_seen: u64,
        tracks_changed: u64,
        /// False when the server truncated the listing
        complete: bool,
    },
    /// A new or stale track was stored locally.
    TrackMaterialized {
        cycle_id: String,
        path: String,
        is_new: bool,
    },
    /// A track could not be materialized and stays pending.
    TrackSkipped {
        cycle_id: String,
        path: String,
        reason: String,
    },
    /// Stale replica entries removed.
    Pruned {
        cycle_id: String,
        tracks: u64,
        playlists: u64,
    },
    /// Cycle finished.
    Completed {
        cycle_id: String,
        tracks_added: u64,
        tracks_updated: u64,
        tracks_failed: u64,
        history_delivered: u64,
        duration_ms: u64,
    },
    /// Cycle aborted.
    Failed {
        cycle_id: String,
        message: String,
        /// False for configuration errors, which need operator action
        recoverable: bool,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::Started { .. } => "Sync started",
            SyncEvent::HistoryFlushed { .. } => "History flushed",
            SyncEvent::CatalogFetched { .. } => "Catalog fetched",
            SyncEvent::TrackMaterialized { .. } => "Track stored",
            SyncEvent::TrackSkipped { .. } => "Track skipped",
            SyncEvent::Pruned { .. } => "Replica pruned",
            SyncEvent::Completed { .. } => "Sync completed successfully",
            SyncEvent::Failed { .. } => "Sync failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel.
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let sync_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every event currently buffered, skipping lag notifications.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
