//! Event types for the review event system
//!
//! Provides review event definitions and the EventBus used to notify the
//! terminal front end (or any other observer) about session progress.

mod review_types;

pub use review_types::{Decision, ReviewPhase};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{ClusterId, ExemplarKind};

/// Review event types
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding to a UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReviewEvent {
    /// Upload requested for a new session
    SessionStarted {
        session_id: Uuid,
        /// Number of rows in the uploaded dataset
        row_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Backend accepted the dataset and chose the reference series
    UploadCompleted {
        session_id: Uuid,
        reference_row: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new exemplar is ready for the reviewer
    ///
    /// Triggers:
    /// - Terminal: redraw the reference/exemplar comparison
    ExemplarPresented {
        session_id: Uuid,
        cluster_id: ClusterId,
        kind: ExemplarKind,
        row: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A reviewer decision was confirmed by the backend response
    DecisionConfirmed {
        session_id: Uuid,
        cluster_id: ClusterId,
        phase: ReviewPhase,
        decision: Decision,
        questions_answered: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Further clustering requested for a heterogeneous cluster
    SubclusterRequested {
        session_id: Uuid,
        cluster_id: ClusterId,
        /// Optimistic cluster count after the split
        num_clusters: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cluster set exhausted, review finished
    ReviewCompleted {
        session_id: Uuid,
        questions_answered: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Authoritative label mapping received
    FinalLabelsReceived {
        session_id: Uuid,
        row_count: usize,
        cluster_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Label table written to disk
    ExportGenerated {
        session_id: Uuid,
        path: PathBuf,
        row_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A backend request failed; the session stays where it was
    ///
    /// Triggers:
    /// - Terminal: tell the reviewer to retry
    RequestFailed {
        session_id: Uuid,
        /// Human-readable command description (e.g. "fetch-farthest(3)")
        command: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session discarded by the reviewer
    SessionReset {
        old_session_id: Uuid,
        new_session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReviewEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::SessionStarted { .. } => "SessionStarted",
            ReviewEvent::UploadCompleted { .. } => "UploadCompleted",
            ReviewEvent::ExemplarPresented { .. } => "ExemplarPresented",
            ReviewEvent::DecisionConfirmed { .. } => "DecisionConfirmed",
            ReviewEvent::SubclusterRequested { .. } => "SubclusterRequested",
            ReviewEvent::ReviewCompleted { .. } => "ReviewCompleted",
            ReviewEvent::FinalLabelsReceived { .. } => "FinalLabelsReceived",
            ReviewEvent::ExportGenerated { .. } => "ExportGenerated",
            ReviewEvent::RequestFailed { .. } => "RequestFailed",
            ReviewEvent::SessionReset { .. } => "SessionReset",
        }
    }
}

/// Broadcast channel for review events
///
/// # Examples
///
/// ```
/// use clab_common::events::{EventBus, ReviewEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(ReviewEvent::ReviewCompleted {
///     session_id: uuid::Uuid::new_v4(),
///     questions_answered: 4,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReviewEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before slow receivers
    /// start missing old events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ReviewEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReviewEvent,
    ) -> Result<usize, broadcast::error::SendError<ReviewEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReviewEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
