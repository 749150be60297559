//! Export Builder
//!
//! Turns the backend's final mapping into a flat `Well ID,Label` table.
//! Building is a pure function of [`FinalLabels`]; writing is separate.

use clab_common::api::FinalLabels;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;

use crate::Result;

/// Header row of the exported file
pub const EXPORT_HEADER: [&str; 2] = ["Well ID", "Label"];

/// Value written for rows without a cluster
pub const UNLABELED: &str = "-1";

/// Label assigned to one row
///
/// Serializes as the label name, or as the number `-1` when unlabeled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Name(String),
    Unlabeled,
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Label::Name(name) => serializer.serialize_str(name),
            Label::Unlabeled => serializer.serialize_i64(-1),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Name(name) => write!(f, "{}", name),
            Label::Unlabeled => write!(f, "{}", UNLABELED),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub row: usize,
    pub label: Label,
}

/// Row-index-to-label table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportTable {
    rows: Vec<ExportRow>,
}

/// Build the export table from the final mapping
pub fn build_export(labels: &FinalLabels) -> ExportTable {
    let rows = (0..labels.row_count())
        .map(|row| ExportRow {
            row,
            label: labels
                .label_for(row)
                .map(|name| Label::Name(name.to_string()))
                .unwrap_or(Label::Unlabeled),
        })
        .collect();

    ExportTable { rows }
}

impl ExportTable {
    pub fn rows(&self) -> &[ExportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV with the `Well ID,Label` header
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(EXPORT_HEADER)?;
        for entry in &self.rows {
            wtr.write_record([entry.row.to_string(), entry.label.to_string()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write the table to `path`, replacing any existing file
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))?;
        tracing::info!(path = %path.display(), rows = self.len(), "Label export written");
        Ok(())
    }
}
