//! Review session state
//!
//! A single value describing where the reviewer is. Only
//! [`reduce`](super::reduce) produces new states.

use chrono::{DateTime, Utc};
use clab_common::api::{ClusterId, FinalLabels};
use clab_common::events::{Decision, ReviewPhase};
use serde::Serialize;
use uuid::Uuid;

use super::Command;

/// Outstanding backend request the session is waiting on
///
/// `decision` is the reviewer answer this request will confirm. Counters move
/// only when the awaited response arrives, never when the reviewer clicks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pending {
    pub awaiting: Command,
    pub decision: Option<Decision>,
}

/// Review session state (in-memory, one per uploaded dataset)
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    /// Unique session identifier, regenerated on reset
    pub session_id: Uuid,

    /// Current workflow phase
    pub phase: ReviewPhase,

    /// Cluster under review; never decreases
    pub current_cluster_id: ClusterId,

    /// Confirmed reviewer decisions
    pub questions_answered: u32,

    /// Optimistic cluster count, resynchronized from the final labels
    pub num_clusters: u32,

    /// Whether the label table has been written
    pub export_generated: bool,

    /// Reference series chosen by the backend at upload
    pub reference_row: Option<usize>,

    /// Exemplar row for the current phase and cluster
    pub exemplar: Option<usize>,

    /// Request in flight, if any
    pub pending: Option<Pending>,

    /// Decision whose commands went out but whose fetch failed; a retry
    /// re-sends only the fetch
    pub interrupted: Option<Pending>,

    /// Whether entering `Done` already issued the final-label fetch
    pub final_labels_requested: bool,

    /// Authoritative mapping, once fetched
    #[serde(skip)]
    pub final_labels: Option<FinalLabels>,

    /// Last failure reported to the reviewer
    pub last_error: Option<String>,

    pub started_at: DateTime<Utc>,

    /// Set when the session reaches `Done`
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Create a fresh session in `Init`
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            phase: ReviewPhase::Init,
            current_cluster_id: ClusterId::FIRST,
            questions_answered: 0,
            num_clusters: 0,
            export_generated: false,
            reference_row: None,
            exemplar: None,
            pending: None,
            interrupted: None,
            final_labels_requested: false,
            final_labels: None,
            last_error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == ReviewPhase::Done
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// A decision can be accepted right now
    pub fn awaiting_decision(&self) -> bool {
        self.phase.is_reviewing() && self.exemplar.is_some() && self.pending.is_none()
    }

    /// The export action is offered only once the final labels are in
    pub fn export_ready(&self) -> bool {
        self.is_terminal() && self.final_labels.is_some()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
