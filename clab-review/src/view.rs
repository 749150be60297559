//! Review view
//!
//! What a renderer needs to draw the current comparison: the reference series
//! and the exemplar under review, plotted over sample positions `0..len`.
//! No drawing happens here.

use clab_common::api::{ClusterId, ExemplarKind};
use clab_common::events::ReviewPhase;
use std::ops::Range;
use uuid::Uuid;

use crate::dataset::DatasetStore;
use crate::session::SessionState;

/// One dataset row borrowed for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesRef<'a> {
    pub row: usize,
    pub samples: &'a [f64],
}

/// Data for the reference-vs-exemplar comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewView<'a> {
    pub session_id: Uuid,
    pub cluster_id: ClusterId,
    pub phase: ReviewPhase,
    pub kind: ExemplarKind,
    pub questions_answered: u32,
    pub num_clusters: u32,
    pub reference: SeriesRef<'a>,
    pub exemplar: SeriesRef<'a>,
}

impl<'a> ReviewView<'a> {
    /// Build the view when a question is on screen
    ///
    /// Returns `None` outside the review phases, while the exemplar is still
    /// being fetched, or if a row index does not exist in the dataset.
    pub fn build(state: &SessionState, dataset: &'a DatasetStore) -> Option<Self> {
        let kind = state.phase.exemplar_kind()?;
        let reference_row = state.reference_row?;
        let exemplar_row = state.exemplar?;

        Some(Self {
            session_id: state.session_id,
            cluster_id: state.current_cluster_id,
            phase: state.phase,
            kind,
            questions_answered: state.questions_answered,
            num_clusters: state.num_clusters,
            reference: SeriesRef {
                row: reference_row,
                samples: dataset.row(reference_row)?,
            },
            exemplar: SeriesRef {
                row: exemplar_row,
                samples: dataset.row(exemplar_row)?,
            },
        })
    }

    /// X-axis labels: sample positions of the reference series
    pub fn x_axis(&self) -> Range<usize> {
        0..self.reference.samples.len()
    }

    pub fn caption(&self) -> String {
        format!("Actual Graph (Cluster No.: {})", self.cluster_id)
    }

    /// Question shown to the reviewer
    pub fn prompt(&self) -> &'static str {
        match self.kind {
            ExemplarKind::Farthest => "Does the farthest member match the expected graph?",
            ExemplarKind::Closest => "Does the closest member still differ from the expected graph?",
        }
    }
}

/// Compact numeric description of a series for terminal display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub len: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SeriesSummary {
    pub fn of(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let (min, max, sum) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        Some(Self {
            len: samples.len(),
            min,
            max,
            mean: sum / samples.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetStore {
        DatasetStore::from_bytes("v.csv", b"1,2,3,4\n0,0,0,0\n2,4,6,8\n".to_vec()).unwrap()
    }

    fn state(phase: ReviewPhase, exemplar: Option<usize>) -> SessionState {
        let mut state = SessionState::new();
        state.phase = phase;
        state.current_cluster_id = ClusterId(3);
        state.reference_row = Some(0);
        state.exemplar = exemplar;
        state
    }

    #[test]
    fn test_view_in_farthest_phase() {
        let dataset = dataset();
        let view = ReviewView::build(&state(ReviewPhase::FarthestReview, Some(2)), &dataset).unwrap();

        assert_eq!(view.kind, ExemplarKind::Farthest);
        assert_eq!(view.reference.row, 0);
        assert_eq!(view.exemplar.samples, &[2.0, 4.0, 6.0, 8.0]);
        assert_eq!(view.x_axis(), 0..4);
        assert_eq!(view.caption(), "Actual Graph (Cluster No.: 3)");
    }

    #[test]
    fn test_no_view_without_question() {
        let dataset = dataset();
        assert!(ReviewView::build(&state(ReviewPhase::FarthestReview, None), &dataset).is_none());
        assert!(ReviewView::build(&state(ReviewPhase::Done, Some(1)), &dataset).is_none());
        assert!(ReviewView::build(&state(ReviewPhase::ClosestReview, Some(40)), &dataset).is_none());
    }

    #[test]
    fn test_series_summary() {
        let summary = SeriesSummary::of(&[2.0, -1.0, 5.0]).unwrap();
        assert_eq!(summary.len, 3);
        assert_eq!(summary.min, -1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.mean, 2.0);
        assert!(SeriesSummary::of(&[]).is_none());
    }
}
