//! Backend request/response types
//!
//! # Wire format
//!
//! The clustering backend encodes "no such exemplar" and "cluster set
//! exhausted" with the integer `-1`. Every other field is a non-negative row
//! index or cluster id.
//!
//! ```text
//! POST /upload                       -> { "expected_graph": 5 }
//! GET  /getFarthestGraph?graph_id=0  -> { "farthest_graph": 12 }
//! GET  /getClosestGraph?graph_id=0   -> { "closest_graph": -1 }
//! GET  /getLabelGraphId              -> { "labels": ["A","B"], "cluster_id": [0,-1,1] }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Wire value meaning "no exemplar" / "unlabeled"
pub const SENTINEL: i64 = -1;

// ========================================
// Wire Shapes
// ========================================

/// Response to `POST /upload`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadResponse {
    /// Row index of the reference ("expected") series
    pub expected_graph: i64,
}

/// Response to `GET /getFarthestGraph`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FarthestResponse {
    pub farthest_graph: i64,
}

/// Response to `GET /getClosestGraph`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClosestResponse {
    pub closest_graph: i64,
}

/// Response to `GET /getLabelGraphId`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FinalLabelsResponse {
    /// Label name per cluster id
    pub labels: Vec<String>,
    /// Cluster id per dataset row, `-1` for unlabeled rows
    pub cluster_id: Vec<i64>,
}

// ========================================
// Domain Types
// ========================================

/// Cluster identifier assigned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl ClusterId {
    /// The first cluster reviewed after upload
    pub const FIRST: ClusterId = ClusterId(0);

    /// The cluster reviewed after this one is accepted
    pub fn next(self) -> ClusterId {
        ClusterId(self.0.saturating_add(1))
    }

    /// Decode a non-negative wire id
    pub fn from_wire(value: i64) -> Result<ClusterId> {
        u32::try_from(value)
            .map(ClusterId)
            .map_err(|_| Error::InvalidInput(format!("cluster id out of range: {}", value)))
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which extreme member of a cluster an exemplar represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExemplarKind {
    /// Most dissimilar to the reference series
    Farthest,
    /// Most similar to the reference series
    Closest,
}

impl fmt::Display for ExemplarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExemplarKind::Farthest => write!(f, "farthest"),
            ExemplarKind::Closest => write!(f, "closest"),
        }
    }
}

/// Decoded exemplar reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum Exemplar {
    /// Row index of the exemplar series
    Row(usize),
    /// No exemplar of this kind exists
    Exhausted,
}

impl Exemplar {
    /// Decode a wire exemplar, rejecting negative values other than the sentinel
    pub fn from_wire(value: i64) -> Result<Exemplar> {
        if value == SENTINEL {
            return Ok(Exemplar::Exhausted);
        }
        usize::try_from(value)
            .map(Exemplar::Row)
            .map_err(|_| Error::InvalidInput(format!("invalid exemplar index: {}", value)))
    }

    pub fn row(self) -> Option<usize> {
        match self {
            Exemplar::Row(row) => Some(row),
            Exemplar::Exhausted => None,
        }
    }
}

/// Authoritative per-row cluster assignment returned at the end of review
///
/// Construction validates that every assigned cluster id indexes `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalLabels {
    labels: Vec<String>,
    assignments: Vec<Option<ClusterId>>,
}

impl FinalLabels {
    pub fn new(labels: Vec<String>, assignments: Vec<Option<ClusterId>>) -> Result<Self> {
        for (row, id) in assignments.iter().enumerate() {
            if let Some(id) = id {
                if id.0 as usize >= labels.len() {
                    return Err(Error::InvalidInput(format!(
                        "row {} assigned to cluster {} but only {} labels exist",
                        row,
                        id,
                        labels.len()
                    )));
                }
            }
        }
        Ok(Self { labels, assignments })
    }

    /// Decode the `/getLabelGraphId` payload
    pub fn from_wire(response: FinalLabelsResponse) -> Result<Self> {
        let assignments = response
            .cluster_id
            .into_iter()
            .map(|value| {
                if value == SENTINEL {
                    Ok(None)
                } else {
                    ClusterId::from_wire(value).map(Some)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(response.labels, assignments)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn assignments(&self) -> &[Option<ClusterId>] {
        &self.assignments
    }

    /// Number of dataset rows covered
    pub fn row_count(&self) -> usize {
        self.assignments.len()
    }

    /// Number of clusters the backend ended up with
    pub fn cluster_count(&self) -> usize {
        self.labels.len()
    }

    /// Label name for a row, `None` when the row is unlabeled or out of range
    pub fn label_for(&self, row: usize) -> Option<&str> {
        self.assignments
            .get(row)
            .copied()
            .flatten()
            .and_then(|id| self.labels.get(id.0 as usize))
            .map(String::as_str)
    }
}
