//! Review state machine
//!
//! ```text
//! Init ──upload──▶ FarthestReview(c) ──No──▶ ClosestReview(c)
//!                   │  ▲  ▲                   │      │
//!                   │  │  └────Yes (split c)──┘      │
//!                   │  └──Yes: c+1      No: c+1 ─────┘
//!                   │
//!                   └──▶ Done  (sentinel for the active phase)
//! ```
//!
//! The reducer never talks to the backend. It returns the commands to run;
//! their responses come back as further [`SessionInput`]s.

use chrono::Utc;
use clab_common::api::{ClusterId, Exemplar, ExemplarKind, FinalLabels};
use clab_common::events::{Decision, ReviewPhase};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::state::{Pending, SessionState};

/// Backend call requested by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", content = "cluster_id", rename_all = "snake_case")]
pub enum Command {
    Upload,
    FetchFarthest(ClusterId),
    FetchClosest(ClusterId),
    RequestSubcluster(ClusterId),
    LabelTrue(ClusterId),
    LabelFalse(ClusterId),
    FetchFinalLabels,
}

impl Command {
    /// Commands whose completion the session does not wait for
    pub fn is_fire_and_forget(&self) -> bool {
        matches!(self, Command::RequestSubcluster(_))
    }

    fn fetch(kind: ExemplarKind, cluster: ClusterId) -> Command {
        match kind {
            ExemplarKind::Farthest => Command::FetchFarthest(cluster),
            ExemplarKind::Closest => Command::FetchClosest(cluster),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Upload => write!(f, "upload"),
            Command::FetchFarthest(c) => write!(f, "fetch-farthest({})", c),
            Command::FetchClosest(c) => write!(f, "fetch-closest({})", c),
            Command::RequestSubcluster(c) => write!(f, "request-subcluster({})", c),
            Command::LabelTrue(c) => write!(f, "label-true({})", c),
            Command::LabelFalse(c) => write!(f, "label-false({})", c),
            Command::FetchFinalLabels => write!(f, "fetch-final-labels"),
        }
    }
}

/// Everything that can happen to a session
#[derive(Debug, Clone)]
pub enum SessionInput {
    /// Reviewer asked to upload the dataset
    Start,
    /// Backend accepted the upload
    UploadCompleted { reference_row: usize },
    /// Backend answered a farthest/closest fetch
    ExemplarFetched {
        kind: ExemplarKind,
        cluster_id: ClusterId,
        exemplar: Exemplar,
    },
    /// Reviewer answered the current question
    Decide(Decision),
    /// Reviewer asked to re-issue a fetch that failed
    Refresh,
    /// Backend returned the final mapping
    FinalLabelsFetched(FinalLabels),
    /// A backend call failed
    RequestFailed { command: Command, message: String },
    /// The label table was written
    ExportGenerated,
    /// Reviewer discarded the session
    Reset,
}

/// Inputs the current state cannot accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("still waiting for {0}")]
    Busy(Command),

    #[error("no question to answer in phase {0}")]
    NotReviewing(ReviewPhase),

    #[error("no exemplar loaded for cluster {0}; retry the fetch first")]
    NoExemplar(ClusterId),

    #[error("session already started (phase {0})")]
    AlreadyStarted(ReviewPhase),

    #[error("nothing to retry in phase {0}")]
    NothingToRefresh(ReviewPhase),

    #[error("answer '{0}' was already sent; retry {1} instead of changing it")]
    AlreadyAnswered(Decision, Command),
}

/// Result of one reducer step
#[derive(Debug, Clone)]
pub struct Step {
    pub state: SessionState,
    /// Commands to run, in order
    pub commands: Vec<Command>,
}

impl Step {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            state: state.clone(),
            commands: Vec::new(),
        }
    }

    fn issue(state: SessionState, commands: Vec<Command>) -> Self {
        Self { state, commands }
    }
}

/// Apply one input to a session state
pub fn reduce(state: &SessionState, input: SessionInput) -> Result<Step, TransitionError> {
    match input {
        SessionInput::Start => start(state),
        SessionInput::UploadCompleted { reference_row } => Ok(upload_completed(state, reference_row)),
        SessionInput::ExemplarFetched {
            kind,
            cluster_id,
            exemplar,
        } => Ok(exemplar_fetched(state, kind, cluster_id, exemplar)),
        SessionInput::Decide(decision) => decide(state, decision),
        SessionInput::Refresh => refresh(state),
        SessionInput::FinalLabelsFetched(labels) => Ok(final_labels_fetched(state, labels)),
        SessionInput::RequestFailed { command, message } => {
            Ok(request_failed(state, command, message))
        }
        SessionInput::ExportGenerated => Ok(export_generated(state)),
        SessionInput::Reset => Ok(Step::unchanged(&SessionState::new())),
    }
}

fn start(state: &SessionState) -> Result<Step, TransitionError> {
    if let Some(pending) = &state.pending {
        return Err(TransitionError::Busy(pending.awaiting));
    }
    if state.phase != ReviewPhase::Init {
        return Err(TransitionError::AlreadyStarted(state.phase));
    }

    let mut next = state.clone();
    next.pending = Some(Pending {
        awaiting: Command::Upload,
        decision: None,
    });
    Ok(Step::issue(next, vec![Command::Upload]))
}

fn upload_completed(state: &SessionState, reference_row: usize) -> Step {
    if !is_awaiting(state, Command::Upload) {
        tracing::warn!("Ignoring upload response without a pending upload");
        return Step::unchanged(state);
    }

    let first = Command::FetchFarthest(ClusterId::FIRST);
    let mut next = state.clone();
    next.phase = ReviewPhase::FarthestReview;
    next.current_cluster_id = ClusterId::FIRST;
    next.num_clusters = 1;
    next.reference_row = Some(reference_row);
    next.exemplar = None;
    next.last_error = None;
    next.pending = Some(Pending {
        awaiting: first,
        decision: None,
    });

    tracing::info!(reference_row, "Review started at cluster 0");
    Step::issue(next, vec![first])
}

fn exemplar_fetched(
    state: &SessionState,
    kind: ExemplarKind,
    cluster_id: ClusterId,
    exemplar: Exemplar,
) -> Step {
    let Some(pending) = state.pending.as_ref().filter(|p| p.awaiting == Command::fetch(kind, cluster_id)) else {
        // Stale or duplicate delivery (including a repeated sentinel after Done)
        tracing::warn!(%kind, %cluster_id, "Ignoring unexpected exemplar response");
        return Step::unchanged(state);
    };

    let mut next = state.clone();
    next.pending = None;
    next.interrupted = None;
    next.last_error = None;

    if let Some(decision) = pending.decision {
        confirm_decision(&mut next, decision);
    }

    match exemplar {
        Exemplar::Row(row) => {
            next.exemplar = Some(row);
            Step::unchanged(&next)
        }
        Exemplar::Exhausted => {
            let mut commands = Vec::new();
            enter_done(&mut next, &mut commands);
            Step::issue(next, commands)
        }
    }
}

/// Apply the counter and phase changes of a decision whose response arrived
fn confirm_decision(next: &mut SessionState, decision: Decision) {
    next.questions_answered += 1;

    match (next.phase, decision) {
        (ReviewPhase::FarthestReview, Decision::Yes) => {
            next.current_cluster_id = next.current_cluster_id.next();
        }
        (ReviewPhase::FarthestReview, Decision::No) => {
            next.phase = ReviewPhase::ClosestReview;
        }
        (ReviewPhase::ClosestReview, Decision::Yes) => {
            next.num_clusters += 1;
            next.phase = ReviewPhase::FarthestReview;
        }
        (ReviewPhase::ClosestReview, Decision::No) => {
            next.current_cluster_id = next.current_cluster_id.next();
            next.phase = ReviewPhase::FarthestReview;
        }
        (phase, _) => {
            tracing::error!(%phase, %decision, "Decision confirmed outside a review phase");
        }
    }

    tracing::info!(
        cluster_id = %next.current_cluster_id,
        phase = %next.phase,
        questions_answered = next.questions_answered,
        "Decision confirmed"
    );
}

/// Move to `Done`; the final-label fetch is issued on the first entry only
fn enter_done(next: &mut SessionState, commands: &mut Vec<Command>) {
    if next.phase == ReviewPhase::Done {
        return;
    }

    next.phase = ReviewPhase::Done;
    next.exemplar = None;
    next.ended_at = Some(Utc::now());
    tracing::info!(
        questions_answered = next.questions_answered,
        "Cluster set exhausted, review complete"
    );

    if !next.final_labels_requested {
        next.final_labels_requested = true;
        next.pending = Some(Pending {
            awaiting: Command::FetchFinalLabels,
            decision: None,
        });
        commands.push(Command::FetchFinalLabels);
    }
}

fn decide(state: &SessionState, decision: Decision) -> Result<Step, TransitionError> {
    if let Some(pending) = &state.pending {
        return Err(TransitionError::Busy(pending.awaiting));
    }
    if !state.phase.is_reviewing() {
        return Err(TransitionError::NotReviewing(state.phase));
    }
    if state.exemplar.is_none() {
        return Err(TransitionError::NoExemplar(state.current_cluster_id));
    }

    if let Some(interrupted) = &state.interrupted {
        match interrupted.decision {
            Some(previous) if previous == decision => return Ok(resume(state, interrupted)),
            // Only a closest fetch went out; nothing to take back
            _ if matches!(interrupted.awaiting, Command::FetchClosest(_)) => {}
            Some(previous) => {
                return Err(TransitionError::AlreadyAnswered(previous, interrupted.awaiting))
            }
            None => {}
        }
    }

    let c = state.current_cluster_id;
    let (commands, awaiting) = match (state.phase, decision) {
        (ReviewPhase::FarthestReview, Decision::Yes) => {
            let fetch = Command::FetchFarthest(c.next());
            (vec![Command::LabelTrue(c), fetch], fetch)
        }
        (ReviewPhase::FarthestReview, Decision::No) => {
            let fetch = Command::FetchClosest(c);
            (vec![fetch], fetch)
        }
        (ReviewPhase::ClosestReview, Decision::Yes) => {
            let fetch = Command::FetchFarthest(c);
            (vec![Command::RequestSubcluster(c), fetch], fetch)
        }
        (ReviewPhase::ClosestReview, Decision::No) => {
            let fetch = Command::FetchFarthest(c.next());
            (vec![Command::LabelFalse(c), fetch], fetch)
        }
        (phase, _) => return Err(TransitionError::NotReviewing(phase)),
    };

    tracing::debug!(cluster_id = %c, phase = %state.phase, %decision, "Decision submitted");

    let mut next = state.clone();
    next.interrupted = None;
    next.pending = Some(Pending {
        awaiting,
        decision: Some(decision),
    });
    Ok(Step::issue(next, commands))
}

/// Re-send the fetch of an interrupted decision without its side effects
fn resume(state: &SessionState, interrupted: &Pending) -> Step {
    tracing::info!(command = %interrupted.awaiting, "Retrying interrupted fetch");

    let mut next = state.clone();
    next.interrupted = None;
    next.pending = Some(interrupted.clone());
    Step::issue(next, vec![interrupted.awaiting])
}

fn refresh(state: &SessionState) -> Result<Step, TransitionError> {
    if let Some(pending) = &state.pending {
        return Err(TransitionError::Busy(pending.awaiting));
    }
    if let Some(interrupted) = &state.interrupted {
        return Ok(resume(state, interrupted));
    }

    let command = match state.phase {
        ReviewPhase::Init => return start(state),
        ReviewPhase::FarthestReview | ReviewPhase::ClosestReview if state.exemplar.is_none() => {
            let kind = state
                .phase
                .exemplar_kind()
                .ok_or(TransitionError::NothingToRefresh(state.phase))?;
            Command::fetch(kind, state.current_cluster_id)
        }
        ReviewPhase::Done if state.final_labels.is_none() => Command::FetchFinalLabels,
        phase => return Err(TransitionError::NothingToRefresh(phase)),
    };

    let mut next = state.clone();
    next.pending = Some(Pending {
        awaiting: command,
        decision: None,
    });
    Ok(Step::issue(next, vec![command]))
}

fn final_labels_fetched(state: &SessionState, labels: FinalLabels) -> Step {
    if !is_awaiting(state, Command::FetchFinalLabels) {
        tracing::warn!("Ignoring final labels without a pending request");
        return Step::unchanged(state);
    }

    let mut next = state.clone();
    next.pending = None;
    next.last_error = None;
    next.num_clusters = u32::try_from(labels.cluster_count()).unwrap_or(u32::MAX);
    next.final_labels = Some(labels);
    Step::unchanged(&next)
}

fn request_failed(state: &SessionState, command: Command, message: String) -> Step {
    let mut next = state.clone();
    next.last_error = Some(format!("{}: {}", command, message));

    // A background command never holds the lock; any other failure releases it
    if !command.is_fire_and_forget() {
        if let Some(pending) = next.pending.take() {
            // Everything before the awaited fetch already went out
            if pending.awaiting == command && pending.decision.is_some() {
                next.interrupted = Some(pending);
            }
        }
    }
    Step::unchanged(&next)
}

fn export_generated(state: &SessionState) -> Step {
    if !state.export_ready() {
        tracing::warn!(phase = %state.phase, "Ignoring export notification before final labels");
        return Step::unchanged(state);
    }
    let mut next = state.clone();
    next.export_generated = true;
    Step::unchanged(&next)
}

fn is_awaiting(state: &SessionState, command: Command) -> bool {
    state
        .pending
        .as_ref()
        .is_some_and(|pending| pending.awaiting == command)
}
