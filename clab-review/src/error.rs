//! Error types for clab-review
//!
//! Every failure is recoverable: the session stays in its pre-call state and
//! the reviewer re-issues the action that triggered it.

use clab_common::events::ReviewPhase;
use thiserror::Error;

use crate::dataset::DatasetError;
use crate::gateway::GatewayError;
use crate::session::TransitionError;

/// Main error type for clab-review
#[derive(Error, Debug)]
pub enum Error {
    /// Backend request failed or returned a malformed payload
    #[error("Backend error: {0}")]
    Gateway(#[from] GatewayError),

    /// Input not accepted in the current session state
    #[error("Rejected: {0}")]
    Transition(#[from] TransitionError),

    /// Dataset could not be loaded
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Export requested before the final labels are available
    #[error("Export unavailable in phase {0}: review not finished")]
    ExportUnavailable(ReviewPhase),

    /// CSV writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared library errors (configuration)
    #[error("{0}")]
    Common(#[from] clab_common::Error),
}

/// Convenience Result type using clab-review Error
pub type Result<T> = std::result::Result<T, Error>;
