//! Test helper modules for clab-review integration tests
//!
//! - ScriptedBackend: in-process [`ClusterBackend`] with canned answers
//! - FakeServer: axum server speaking the backend's REST routes

#![allow(dead_code)]

pub mod fake_server;
pub mod scripted_backend;

pub use fake_server::FakeServer;
pub use scripted_backend::{Call, ScriptedBackend};

use clab_review::dataset::DatasetStore;

/// Dataset of `rows` series, row `i` holding `[i, i+1, i+2]`
pub fn dataset(rows: usize) -> DatasetStore {
    let csv: String = (0..rows)
        .map(|i| format!("{},{},{}\n", i, i + 1, i + 2))
        .collect();
    DatasetStore::from_bytes("wells.csv", csv.into_bytes()).expect("valid test dataset")
}
