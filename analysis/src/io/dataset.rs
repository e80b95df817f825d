//! CSV loading for the behavioural dataset.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::debug;

use crate::core::types::{Dataset, Observation};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Data file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse {} record {record}", path.display())]
    Parse {
        path: PathBuf,
        record: u64,
        #[source]
        source: csv::Error,
    },
}

/// One CSV row; extra columns are ignored.
#[derive(Debug, Deserialize)]
struct ObservationRow {
    #[serde(rename = "SubjectID")]
    subject_id: String,
    #[serde(rename = "SessionID")]
    session_id: u32,
    #[serde(rename = "Correct", deserialize_with = "binary_outcome")]
    correct: f64,
    #[serde(rename = "ContrastHeterogeneity")]
    contrast_heterogeneity: f64,
    #[serde(rename = "GridCoarseness")]
    grid_coarseness: f64,
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Observation {
            subject_id: row.subject_id,
            session_id: row.session_id,
            correct: row.correct,
            contrast_heterogeneity: row.contrast_heterogeneity,
            grid_coarseness: row.grid_coarseness,
        }
    }
}

/// Accepts `0/1`, `0.0/1.0` and `true/false` (any case).
fn binary_outcome<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(1.0),
        "0" | "0.0" | "false" => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "Correct must be binary (0/1 or true/false), got {other:?}"
        ))),
    }
}

/// Load every observation from a comma-separated file with a header row.
pub fn load_data(path: &Path) -> Result<Dataset, DatasetError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DatasetError::NotFound {
            path: path.to_path_buf(),
        },
        _ => DatasetError::Open {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let dataset = read_data(file, path)?;
    debug!(path = %path.display(), rows = dataset.len(), "dataset loaded");
    Ok(dataset)
}

fn read_data<R: io::Read>(reader: R, path: &Path) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<ObservationRow>().enumerate() {
        let row = record.map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            record: index as u64 + 1,
            source,
        })?;
        rows.push(Observation::from(row));
    }
    Ok(Dataset::new(rows))
}
