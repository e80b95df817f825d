//! Shared deterministic types for the statistical core.
//!
//! These types carry the behavioural dataset through filtering and model
//! fitting. They do not touch the filesystem.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SUBJECT_ID: &str = "SubjectID";
pub const SESSION_ID: &str = "SessionID";
pub const CORRECT: &str = "Correct";
pub const CONTRAST_HETEROGENEITY: &str = "ContrastHeterogeneity";
pub const GRID_COARSENESS: &str = "GridCoarseness";

/// One trial of the behavioural experiment.
///
/// Every observation belongs to exactly one subject and one session.
/// Observations of the same subject are correlated; the subject id is the
/// cluster key for estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub subject_id: String,
    pub session_id: u32,
    /// Binary outcome, stored as `0.0` or `1.0`.
    pub correct: f64,
    pub contrast_heterogeneity: f64,
    pub grid_coarseness: f64,
}

impl Observation {
    /// Numeric value of a named column, `None` for unknown or non-numeric columns.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        match column {
            SESSION_ID => Some(f64::from(self.session_id)),
            CORRECT => Some(self.correct),
            CONTRAST_HETEROGENEITY => Some(self.contrast_heterogeneity),
            GRID_COARSENESS => Some(self.grid_coarseness),
            _ => None,
        }
    }

    /// Grouping label of a named column, `None` if the column cannot group.
    pub fn group_key(&self, column: &str) -> Option<String> {
        match column {
            SUBJECT_ID => Some(self.subject_id.clone()),
            SESSION_ID => Some(self.session_id.to_string()),
            _ => None,
        }
    }
}

/// In-memory table of observations, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: Vec<Observation>,
}

impl Dataset {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows recorded in `session_id`.
    pub fn session(&self, session_id: u32) -> Dataset {
        self.filter(|row| row.session_id == session_id)
    }

    /// Rows recorded in any session other than `session_id`.
    pub fn excluding_session(&self, session_id: u32) -> Dataset {
        self.filter(|row| row.session_id != session_id)
    }

    pub fn filter<F: Fn(&Observation) -> bool>(&self, keep: F) -> Dataset {
        Dataset {
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Column values by name; `None` if the column is not numeric.
    pub fn numeric(&self, column: &str) -> Option<Vec<f64>> {
        self.rows.iter().map(|row| row.numeric(column)).collect()
    }

    /// Row indices per group label, groups in sorted label order.
    pub fn group_indices(&self, column: &str) -> Option<BTreeMap<String, Vec<usize>>> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, row) in self.rows.iter().enumerate() {
            groups.entry(row.group_key(column)?).or_default().push(index);
        }
        Some(groups)
    }

    /// Distinct session ids, ascending.
    pub fn session_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.rows.iter().map(|row| row.session_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
