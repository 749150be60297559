//! # Cluster Review Client Library (clab-review)
//!
//! Interactive resolution of an externally computed time-series clustering.
//!
//! **Purpose:** Upload a CSV dataset to the clustering backend, walk the
//! reviewer through each cluster (farthest exemplar first, closest exemplar
//! only when needed), request subclustering for heterogeneous clusters, and
//! export the final per-row labels.
//!
//! **Architecture:**
//! - [`dataset`]: rows of the uploaded CSV, looked up by index
//! - [`gateway`]: typed client for the backend REST API
//! - [`session`]: pure review state machine `(state, input) -> (state, commands)`
//! - [`reviewer`]: async driver executing session commands against the gateway
//! - [`export`]: row-to-label table built from the backend's final mapping
//! - [`view`]: the data a renderer needs for the current comparison

pub mod dataset;
pub mod error;
pub mod export;
pub mod gateway;
pub mod reviewer;
pub mod session;
pub mod view;

pub use error::{Error, Result};
pub use reviewer::Reviewer;
