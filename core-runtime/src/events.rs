//! # Event Bus System
//!
//! Event-driven notifications for the storage core using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The client facade publishes auth and transfer state changes here so that
//! host UIs can react (enable buttons, show a signed-in badge) without
//! polling. Transfer *progress* is intentionally NOT on the bus — it is
//! delivered synchronously per chunk through the callback handed to the
//! transfer engine, so a slow UI subscriber can never distort progress
//! accounting.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, AuthEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! let event = CoreEvent::Auth(AuthEvent::SignedIn {
//!     provider: "Dropbox".to_string(),
//! });
//! event_bus.emit(event).ok();
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` yields two receiver errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal,
//!   the subscriber keeps receiving new events.
//! - **`RecvError::Closed`**: all senders dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// File transfer events
    Transfer(TransferEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Transfer(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Transfer(TransferEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Transfer(TransferEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the authorization lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// An interactive login flow was started.
    SigningIn {
        /// The provider being authenticated with (e.g., "Dropbox").
        provider: String,
    },
    /// Tokens were obtained and persisted; the client is ready.
    SignedIn {
        /// The provider that authenticated.
        provider: String,
    },
    /// Stored tokens were usable without an interactive login.
    SessionRestored {
        /// The provider whose session was restored.
        provider: String,
        /// Whether a refresh round trip was needed (false for the legacy
        /// non-expiring token model).
        refreshed: bool,
    },
    /// Stored tokens were cleared; a fresh login is required.
    SignedOut {
        /// The provider that was signed out.
        provider: String,
    },
    /// An authorization step failed or was cancelled.
    AuthError {
        /// The provider involved.
        provider: String,
        /// Human-readable error message.
        message: String,
        /// Whether the error is recoverable by retrying the login.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::SessionRestored { .. } => "Stored session restored",
            AuthEvent::SignedOut { .. } => "User signed out",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Transfer Events
// ============================================================================

/// Coarse transfer lifecycle events (started/finished), not per-chunk
/// progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TransferEvent {
    /// An upload or download began.
    Started {
        /// "upload" or "download".
        direction: String,
        /// Remote entry id (downloads) or destination name (uploads).
        target: String,
        /// Total bytes when known up front.
        total_bytes: Option<u64>,
    },
    /// The transfer finished successfully.
    Completed {
        /// "upload" or "download".
        direction: String,
        /// Remote entry id of the finished transfer.
        target: String,
    },
    /// The transfer was cancelled cooperatively.
    Cancelled {
        /// "upload" or "download".
        direction: String,
        /// Target of the cancelled transfer.
        target: String,
    },
    /// The transfer failed.
    Failed {
        /// "upload" or "download".
        direction: String,
        /// Target of the failed transfer.
        target: String,
        /// Human-readable error message.
        message: String,
    },
}

impl TransferEvent {
    fn description(&self) -> &str {
        match self {
            TransferEvent::Started { .. } => "Transfer started",
            TransferEvent::Completed { .. } => "Transfer completed",
            TransferEvent::Cancelled { .. } => "Transfer cancelled",
            TransferEvent::Failed { .. } => "Transfer failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none — callers that don't care use `.ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let event = CoreEvent::Auth(AuthEvent::SignedIn {
            provider: "Dropbox".to_string(),
        });
        bus.emit(event.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CoreEvent::Transfer(TransferEvent::Started {
            direction: "upload".to_string(),
            target: "report.pdf".to_string(),
            total_bytes: Some(1024),
        });
        bus.emit(event.clone()).unwrap();

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Auth(AuthEvent::SignedOut {
            provider: "Box".to_string(),
        });
        assert!(bus.emit(event).is_err());
    }

    #[test]
    fn test_severity_mapping() {
        let error = CoreEvent::Auth(AuthEvent::AuthError {
            provider: "Dropbox".to_string(),
            message: "state mismatch".to_string(),
            recoverable: true,
        });
        assert_eq!(error.severity(), EventSeverity::Error);

        let signed_in = CoreEvent::Auth(AuthEvent::SignedIn {
            provider: "Dropbox".to_string(),
        });
        assert_eq!(signed_in.severity(), EventSeverity::Info);

        let started = CoreEvent::Transfer(TransferEvent::Started {
            direction: "download".to_string(),
            target: "id-1".to_string(),
            total_bytes: None,
        });
        assert_eq!(started.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Auth(AuthEvent::SessionRestored {
            provider: "Google Drive".to_string(),
            refreshed: true,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
