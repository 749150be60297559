//! Reviewer: async driver of the review session
//!
//! Owns the only [`SessionState`]. Every reviewer action goes through
//! [`reduce`]; the resulting commands are executed against the backend one at
//! a time and their responses are fed back into the reducer until the session
//! is waiting on the reviewer again.
//!
//! Taking `&mut self` for every action means a second decision cannot be
//! submitted while the first one's request is still outstanding.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clab_common::api::ExemplarKind;
use clab_common::events::{Decision, EventBus, ReviewEvent, ReviewPhase};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::dataset::DatasetStore;
use crate::error::{Error, Result};
use crate::export::{build_export, ExportTable};
use crate::gateway::{ClusterBackend, GatewayError};
use crate::session::{reduce, Command, SessionInput, SessionState, Step};
use crate::view::ReviewView;

/// Drives one review session against a clustering backend
pub struct Reviewer {
    dataset: DatasetStore,
    backend: Arc<dyn ClusterBackend>,
    event_bus: EventBus,
    state: SessionState,
    export_path: Option<PathBuf>,
    background: Vec<JoinHandle<()>>,
}

impl Reviewer {
    pub fn new(dataset: DatasetStore, backend: Arc<dyn ClusterBackend>, event_bus: EventBus) -> Self {
        Self {
            dataset,
            backend,
            event_bus,
            state: SessionState::new(),
            export_path: None,
            background: Vec::new(),
        }
    }

    /// Write the label table here automatically when review completes
    pub fn with_export_path(mut self, path: PathBuf) -> Self {
        self.export_path = Some(path);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn dataset(&self) -> &DatasetStore {
        &self.dataset
    }

    pub fn export_path(&self) -> Option<&Path> {
        self.export_path.as_deref()
    }

    /// Comparison currently awaiting a decision, if any
    pub fn view(&self) -> Option<ReviewView<'_>> {
        ReviewView::build(&self.state, &self.dataset)
    }

    /// Upload the dataset and fetch the first exemplar
    pub async fn start(&mut self) -> Result<()> {
        self.dispatch(SessionInput::Start).await
    }

    /// Submit the reviewer's answer for the exemplar on screen
    pub async fn decide(&mut self, decision: Decision) -> Result<()> {
        self.dispatch(SessionInput::Decide(decision)).await
    }

    /// Re-issue the request that failed for the current phase
    ///
    /// In `Init` this uploads the dataset, as after a reset.
    pub async fn refresh(&mut self) -> Result<()> {
        self.dispatch(SessionInput::Refresh).await
    }

    /// Discard the session and start over from `Init`
    ///
    /// Background commands already sent keep running; they no longer affect
    /// the new session.
    pub fn reset(&mut self) -> Result<()> {
        let old_session_id = self.state.session_id;
        let step = reduce(&self.state, SessionInput::Reset)?;
        self.state = step.state;

        info!(%old_session_id, new_session_id = %self.state.session_id, "Session reset");
        self.event_bus.emit_lossy(ReviewEvent::SessionReset {
            old_session_id,
            new_session_id: self.state.session_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Label table built from the final mapping
    ///
    /// Only available once the session is `Done` and the mapping arrived.
    pub fn export_table(&self) -> Result<ExportTable> {
        match &self.state.final_labels {
            Some(labels) if self.state.is_terminal() => Ok(build_export(labels)),
            _ => Err(Error::ExportUnavailable(self.state.phase)),
        }
    }

    /// Write the label table to `path`; returns the number of rows written
    pub fn write_export(&mut self, path: &Path) -> Result<usize> {
        let table = self.export_table()?;
        table.write_to_path(path)?;

        let step = reduce(&self.state, SessionInput::ExportGenerated)?;
        self.state = step.state;

        self.event_bus.emit_lossy(ReviewEvent::ExportGenerated {
            session_id: self.state.session_id,
            path: path.to_path_buf(),
            row_count: table.len(),
            timestamp: Utc::now(),
        });
        Ok(table.len())
    }

    /// Wait for fire-and-forget commands still in flight
    pub async fn settle(&mut self) {
        for handle in self.background.drain(..) {
            if let Err(e) = handle.await {
                warn!("Background command task failed: {}", e);
            }
        }
    }

    async fn dispatch(&mut self, input: SessionInput) -> Result<()> {
        let step = reduce(&self.state, input)?;
        let mut queue: VecDeque<Command> = self.apply(step).into();

        while let Some(command) = queue.pop_front() {
            if command == Command::Upload {
                self.event_bus.emit_lossy(ReviewEvent::SessionStarted {
                    session_id: self.state.session_id,
                    row_count: self.dataset.len(),
                    timestamp: Utc::now(),
                });
            }
            if command.is_fire_and_forget() {
                self.spawn_background(command);
                continue;
            }

            match self.execute(command).await {
                Ok(Some(response)) => {
                    let step = reduce(&self.state, response)?;
                    queue.extend(self.apply(step));
                }
                Ok(None) => {}
                Err(e) => {
                    error!(%command, "Backend request failed: {}", e);
                    let step = reduce(
                        &self.state,
                        SessionInput::RequestFailed {
                            command,
                            message: e.to_string(),
                        },
                    )?;
                    self.apply(step);
                    self.event_bus.emit_lossy(ReviewEvent::RequestFailed {
                        session_id: self.state.session_id,
                        command: command.to_string(),
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e.into());
                }
            }
        }

        self.auto_export()
    }

    /// Run one command; acknowledgements produce no session input
    async fn execute(&self, command: Command) -> std::result::Result<Option<SessionInput>, GatewayError> {
        let input = match command {
            Command::Upload => {
                let reference_row = self
                    .backend
                    .upload(self.dataset.name(), self.dataset.raw_bytes())
                    .await?;
                self.check_row(reference_row, "reference")?;
                Some(SessionInput::UploadCompleted { reference_row })
            }
            Command::FetchFarthest(cluster_id) => {
                let exemplar = self.backend.fetch_farthest(cluster_id).await?;
                if let Some(row) = exemplar.row() {
                    self.check_row(row, "farthest exemplar")?;
                }
                Some(SessionInput::ExemplarFetched {
                    kind: ExemplarKind::Farthest,
                    cluster_id,
                    exemplar,
                })
            }
            Command::FetchClosest(cluster_id) => {
                let exemplar = self.backend.fetch_closest(cluster_id).await?;
                if let Some(row) = exemplar.row() {
                    self.check_row(row, "closest exemplar")?;
                }
                Some(SessionInput::ExemplarFetched {
                    kind: ExemplarKind::Closest,
                    cluster_id,
                    exemplar,
                })
            }
            Command::LabelTrue(cluster_id) => {
                self.backend.label_true(cluster_id).await?;
                None
            }
            Command::LabelFalse(cluster_id) => {
                self.backend.label_false(cluster_id).await?;
                None
            }
            Command::RequestSubcluster(cluster_id) => {
                self.backend.request_subcluster(cluster_id).await?;
                None
            }
            Command::FetchFinalLabels => {
                let labels = self.backend.fetch_final_labels().await?;
                if labels.row_count() != self.dataset.len() {
                    warn!(
                        labelled = labels.row_count(),
                        rows = self.dataset.len(),
                        "Final labels do not cover the dataset exactly"
                    );
                }
                Some(SessionInput::FinalLabelsFetched(labels))
            }
        };
        Ok(input)
    }

    fn check_row(&self, row: usize, what: &str) -> std::result::Result<(), GatewayError> {
        if row < self.dataset.len() {
            Ok(())
        } else {
            Err(GatewayError::Malformed(format!(
                "{} row {} outside dataset of {} rows",
                what,
                row,
                self.dataset.len()
            )))
        }
    }

    fn spawn_background(&mut self, command: Command) {
        let Command::RequestSubcluster(cluster_id) = command else {
            warn!(%command, "Not a background command");
            return;
        };

        let backend = Arc::clone(&self.backend);
        let event_bus = self.event_bus.clone();
        let session_id = self.state.session_id;

        info!(%cluster_id, "Requesting further clustering");
        let handle = tokio::spawn(async move {
            if let Err(e) = backend.request_subcluster(cluster_id).await {
                warn!(%cluster_id, "Subcluster request failed: {}", e);
                event_bus.emit_lossy(ReviewEvent::RequestFailed {
                    session_id,
                    command: command.to_string(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        });

        self.background.retain(|h| !h.is_finished());
        self.background.push(handle);
    }

    /// Install a new state and announce what changed
    fn apply(&mut self, step: Step) -> Vec<Command> {
        let Step { state, commands } = step;
        let old = std::mem::replace(&mut self.state, state);
        self.emit_changes(&old);
        commands
    }

    fn emit_changes(&self, old: &SessionState) {
        let new = &self.state;
        let session_id = new.session_id;
        let timestamp = Utc::now();

        if old.reference_row.is_none() {
            if let Some(reference_row) = new.reference_row {
                self.event_bus.emit_lossy(ReviewEvent::UploadCompleted {
                    session_id,
                    reference_row,
                    timestamp,
                });
            }
        }

        if new.questions_answered > old.questions_answered {
            if let Some(decision) = old.pending.as_ref().and_then(|p| p.decision) {
                self.event_bus.emit_lossy(ReviewEvent::DecisionConfirmed {
                    session_id,
                    cluster_id: old.current_cluster_id,
                    phase: old.phase,
                    decision,
                    questions_answered: new.questions_answered,
                    timestamp,
                });
            }
        }

        if new.num_clusters > old.num_clusters && old.phase == ReviewPhase::ClosestReview {
            self.event_bus.emit_lossy(ReviewEvent::SubclusterRequested {
                session_id,
                cluster_id: old.current_cluster_id,
                num_clusters: new.num_clusters,
                timestamp,
            });
        }

        if let (Some(row), Some(kind)) = (new.exemplar, new.phase.exemplar_kind()) {
            // A failure also clears `pending` but leaves the old exemplar up
            if old.pending.is_some() && new.pending.is_none() && new.last_error.is_none() {
                self.event_bus.emit_lossy(ReviewEvent::ExemplarPresented {
                    session_id,
                    cluster_id: new.current_cluster_id,
                    kind,
                    row,
                    timestamp,
                });
            }
        }

        if new.phase == ReviewPhase::Done && old.phase != ReviewPhase::Done {
            self.event_bus.emit_lossy(ReviewEvent::ReviewCompleted {
                session_id,
                questions_answered: new.questions_answered,
                timestamp,
            });
        }

        if old.final_labels.is_none() {
            if let Some(labels) = &new.final_labels {
                self.event_bus.emit_lossy(ReviewEvent::FinalLabelsReceived {
                    session_id,
                    row_count: labels.row_count(),
                    cluster_count: labels.cluster_count(),
                    timestamp,
                });
            }
        }
    }

    /// Generate the export once, the first time the labels are available
    fn auto_export(&mut self) -> Result<()> {
        if !self.state.export_ready() || self.state.export_generated {
            return Ok(());
        }
        let Some(path) = self.export_path.clone() else {
            return Ok(());
        };
        self.write_export(&path).map(|_| ())
    }
}
