//! Review workflow types shared by events and the session state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ExemplarKind;

/// Phase of the review workflow
///
/// `Init → FarthestReview ⇄ ClosestReview → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewPhase {
    /// Dataset not uploaded yet
    Init,
    /// Reviewing the least similar member of the current cluster
    FarthestReview,
    /// Reviewing the most similar member of the current cluster
    ClosestReview,
    /// Cluster set exhausted; final labels available
    Done,
}

impl ReviewPhase {
    /// Exemplar kind under review in this phase
    pub fn exemplar_kind(self) -> Option<ExemplarKind> {
        match self {
            ReviewPhase::FarthestReview => Some(ExemplarKind::Farthest),
            ReviewPhase::ClosestReview => Some(ExemplarKind::Closest),
            ReviewPhase::Init | ReviewPhase::Done => None,
        }
    }

    pub fn is_reviewing(self) -> bool {
        self.exemplar_kind().is_some()
    }
}

impl fmt::Display for ReviewPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewPhase::Init => write!(f, "INIT"),
            ReviewPhase::FarthestReview => write!(f, "FARTHEST_REVIEW"),
            ReviewPhase::ClosestReview => write!(f, "CLOSEST_REVIEW"),
            ReviewPhase::Done => write!(f, "DONE"),
        }
    }
}

/// Reviewer answer to "does this exemplar match the reference series?"
///
/// In the closest phase a `Yes` means the closest member still fails to match
/// and the cluster should be split further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Yes,
    No,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Yes => write!(f, "yes"),
            Decision::No => write!(f, "no"),
        }
    }
}
