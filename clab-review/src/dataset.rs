//! Dataset Store
//!
//! Holds the uploaded CSV rows indexed by zero-based position. Each record is
//! one numeric series. The raw bytes are kept so the exact file can be sent
//! to the backend.

use csv::{ReaderBuilder, Trim};
use std::path::Path;
use thiserror::Error;

/// Dataset loading errors
#[derive(Debug, Error)]
pub enum DatasetError {
    /// File contained no rows
    #[error("dataset {0} contains no rows")]
    Empty(String),

    /// A cell could not be parsed as a number
    #[error("row {row}, column {column}: not a number: {value:?}")]
    InvalidCell {
        row: usize,
        column: usize,
        value: String,
    },

    /// CSV framing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// In-memory dataset, immutable once loaded
#[derive(Debug, Clone)]
pub struct DatasetStore {
    name: String,
    raw: Vec<u8>,
    rows: Vec<Vec<f64>>,
}

impl DatasetStore {
    /// Parse a headerless CSV where every record is one series
    ///
    /// Cells are trimmed; empty cells are skipped so trailing commas do not
    /// produce bogus samples.
    pub fn from_bytes(name: impl Into<String>, raw: Vec<u8>) -> Result<Self, DatasetError> {
        let name = name.into();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(raw.as_slice());

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let mut samples = Vec::with_capacity(record.len());
            for (column, cell) in record.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let value = cell.parse::<f64>().map_err(|_| DatasetError::InvalidCell {
                    row,
                    column,
                    value: cell.to_string(),
                })?;
                samples.push(value);
            }
            rows.push(samples);
        }

        if rows.is_empty() {
            return Err(DatasetError::Empty(name));
        }

        tracing::debug!(dataset = %name, rows = rows.len(), "Dataset parsed");
        Ok(Self { name, raw, rows })
    }

    /// Load a CSV file from disk
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let raw = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset.csv".to_string());
        Self::from_bytes(name, raw)
    }

    /// File name sent with the upload
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exact bytes of the original file
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
