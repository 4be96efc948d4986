//! # Event Bus System
//!
//! Broadcasts identity lifecycle events using `tokio::sync::broadcast` so
//! host code can observe refreshes and identity changes without registering
//! a change hook.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping domain enums such as [`IdentityEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, IdentityEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Identity(IdentityEvent::IdentityChanged {
//!         old_identity_id: "id-1".to_string(),
//!         new_identity_id: "id-2".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Identity(IdentityEvent::IdentityChanged { .. })));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events and may continue.
//! - **`RecvError::Closed`**: all senders were dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; the identity core ignores that
//! result, so observing events is always optional.

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

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Identity refresh and login-set events
    Identity(IdentityEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Identity(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Identity(IdentityEvent::RefreshFailed { .. }) => EventSeverity::Error,
            CoreEvent::Identity(IdentityEvent::HookFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Identity(IdentityEvent::IdentityChanged { .. })
            | CoreEvent::Identity(IdentityEvent::CustomProviderLinked { .. })
            | CoreEvent::Identity(IdentityEvent::CustomProviderUnlinked { .. }) => {
                EventSeverity::Info
            }
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
// Identity Events
// ============================================================================

/// Events related to identity refreshes and linked login providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IdentityEvent {
    /// A refresh was started against the credential store.
    Refreshing {
        /// Identity id resolved by the previous operation, if any.
        previous_identity_id: Option<String>,
    },
    /// A refresh or identity install completed.
    Refreshed {
        /// The resolved identity id.
        identity_id: String,
        /// Linked provider names.
        services: Vec<String>,
    },
    /// The credential store failed the refresh.
    RefreshFailed {
        /// Human-readable error message.
        message: String,
    },
    /// The resolved identity id differs from the previous one.
    IdentityChanged {
        old_identity_id: String,
        new_identity_id: String,
    },
    /// A change hook failed; the failure was isolated.
    HookFailed {
        /// Human-readable error message.
        message: String,
    },
    /// The developer-authenticated provider was linked.
    CustomProviderLinked { identity_id: String },
    /// The developer-authenticated provider was unlinked.
    CustomProviderUnlinked { identity_id: String },
}

impl IdentityEvent {
    fn description(&self) -> &str {
        match self {
            IdentityEvent::Refreshing { .. } => "Refreshing identity",
            IdentityEvent::Refreshed { .. } => "Identity refreshed",
            IdentityEvent::RefreshFailed { .. } => "Identity refresh failed",
            IdentityEvent::IdentityChanged { .. } => "Identity id changed",
            IdentityEvent::HookFailed { .. } => "Identity change hook failed",
            IdentityEvent::CustomProviderLinked { .. } => "Custom provider linked",
            IdentityEvent::CustomProviderUnlinked { .. } => "Custom provider unlinked",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   Subscribers falling further behind receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
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

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, IdentityEvent};
///
/// let event_bus = EventBus::new(100);
/// let changes = EventStream::new(event_bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Identity(IdentityEvent::IdentityChanged { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
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
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
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
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
