//! # Event Bus System
//!
//! Provides typed notifications from folder models to their observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for folder updates and resolution progress
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! A folder model publishes row-level notifications (`RowsInserted`,
//! `RowsRemoved`, `RowsChanged`) in the exact order it mutates its index, so a
//! view layer replaying them stays aligned with the model. Row numbers are only
//! valid at the moment of the event; consumers must not cache them across
//! later events.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ mods model   ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ List view  │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────────┘
//! │ packs model  ├──────────────>│  channel) │     subscribe    ┌────────────┐
//! └──────────────┘               │           ├─────────────────>│ Status bar │
//!                                └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, EventStream, FolderEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut mods_only = EventStream::new(bus.subscribe())
//!     .filter(|event| event.folder() == "mods");
//!
//! bus.emit(CoreEvent::Folder(FolderEvent::UpdateFinished {
//!     folder: "mods".to_string(),
//! }))
//! .ok();
//!
//! let event = mods_only.recv().await.unwrap();
//! assert_eq!(event.description(), "Folder update finished");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   A view that lags should re-read the whole model instead of replaying rows.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Folder scan and row-level events
    Folder(FolderEvent),
    /// Background resolution (parse) events
    Resolution(ResolutionEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Folder(e) => e.description(),
            CoreEvent::Resolution(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Folder(FolderEvent::UpdateFailed { .. }) => EventSeverity::Error,
            CoreEvent::Resolution(ResolutionEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Folder(FolderEvent::OrphansCleaned { .. }) => EventSeverity::Warning,
            CoreEvent::Folder(FolderEvent::UpdateFinished { .. })
            | CoreEvent::Folder(FolderEvent::WatchStarted { .. })
            | CoreEvent::Folder(FolderEvent::WatchStopped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Name of the folder the event belongs to.
    pub fn folder(&self) -> &str {
        match self {
            CoreEvent::Folder(e) => e.folder(),
            CoreEvent::Resolution(e) => e.folder(),
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
// Folder Events
// ============================================================================

/// Events describing scans of a managed folder and the resulting row changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FolderEvent {
    /// A directory scan was dispatched.
    UpdateStarted {
        folder: String,
        /// Whether orphaned metadata records will be deleted by this scan.
        clean_orphans: bool,
    },
    /// A scan finished and its snapshot was reconciled into the index.
    UpdateSucceeded {
        folder: String,
        inserted: usize,
        removed: usize,
        changed: usize,
    },
    /// A scan failed; the index was left unchanged.
    UpdateFailed {
        folder: String,
        message: String,
    },
    /// No scan is in flight and none is pending.
    UpdateFinished { folder: String },
    /// Rows `first..=last` were appended.
    RowsInserted {
        folder: String,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` were removed.
    RowsRemoved {
        folder: String,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` changed in place.
    RowsChanged {
        folder: String,
        first: usize,
        last: usize,
    },
    /// Metadata records without a backing file were deleted.
    OrphansCleaned { folder: String, count: usize },
    /// Filesystem notifications were attached.
    WatchStarted { folder: String },
    /// Filesystem notifications were detached.
    WatchStopped { folder: String },
}

impl FolderEvent {
    fn description(&self) -> &str {
        match self {
            FolderEvent::UpdateStarted { .. } => "Folder scan started",
            FolderEvent::UpdateSucceeded { .. } => "Folder scan reconciled",
            FolderEvent::UpdateFailed { .. } => "Folder scan failed",
            FolderEvent::UpdateFinished { .. } => "Folder update finished",
            FolderEvent::RowsInserted { .. } => "Rows inserted",
            FolderEvent::RowsRemoved { .. } => "Rows removed",
            FolderEvent::RowsChanged { .. } => "Rows changed",
            FolderEvent::OrphansCleaned { .. } => "Orphaned metadata deleted",
            FolderEvent::WatchStarted { .. } => "Folder watch started",
            FolderEvent::WatchStopped { .. } => "Folder watch stopped",
        }
    }

    fn folder(&self) -> &str {
        match self {
            FolderEvent::UpdateStarted { folder, .. }
            | FolderEvent::UpdateSucceeded { folder, .. }
            | FolderEvent::UpdateFailed { folder, .. }
            | FolderEvent::UpdateFinished { folder }
            | FolderEvent::RowsInserted { folder, .. }
            | FolderEvent::RowsRemoved { folder, .. }
            | FolderEvent::RowsChanged { folder, .. }
            | FolderEvent::OrphansCleaned { folder, .. }
            | FolderEvent::WatchStarted { folder }
            | FolderEvent::WatchStopped { folder } => folder,
        }
    }
}

// ============================================================================
// Resolution Events
// ============================================================================

/// Events describing background parse tasks, keyed by ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ResolutionEvent {
    /// A parse task was dispatched under `ticket`.
    Started {
        folder: String,
        ticket: u64,
        resource_id: String,
    },
    /// Parsed details were applied to the resource.
    Resolved {
        folder: String,
        ticket: u64,
        resource_id: String,
    },
    /// The parse failed; the resource is unresolved again.
    Failed {
        folder: String,
        ticket: u64,
        resource_id: String,
        message: String,
    },
    /// The ticket was cancelled before completion.
    Cancelled {
        folder: String,
        ticket: u64,
        resource_id: String,
    },
    /// No parse task is outstanding.
    Settled { folder: String },
}

impl ResolutionEvent {
    fn description(&self) -> &str {
        match self {
            ResolutionEvent::Started { .. } => "Resolution started",
            ResolutionEvent::Resolved { .. } => "Resource resolved",
            ResolutionEvent::Failed { .. } => "Resolution failed",
            ResolutionEvent::Cancelled { .. } => "Resolution cancelled",
            ResolutionEvent::Settled { .. } => "All resolutions settled",
        }
    }

    fn folder(&self) -> &str {
        match self {
            ResolutionEvent::Started { folder, .. }
            | ResolutionEvent::Resolved { folder, .. }
            | ResolutionEvent::Failed { folder, .. }
            | ResolutionEvent::Cancelled { folder, .. }
            | ResolutionEvent::Settled { folder } => folder,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for broadcasting engine events.
///
/// Cloning is cheap; clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the given buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `broadcast` channel requirement);
    /// `EngineConfig` validation rejects zero before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none. Publishers in this workspace ignore that error.
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

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with predicate filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let rows_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Folder(_)));
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

    /// Adds a filter function to this stream.
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

    /// Drains every matching event currently buffered.
    ///
    /// Lag errors are skipped; the remaining buffered events are still
    /// returned.
    pub fn drain(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Some(next) = self.try_recv() {
            match next {
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
