//! Design matrices built from a formula and a dataset.

use ndarray::{Array1, Array2};

use crate::core::formula::Formula;
use crate::core::gee::FitError;
use crate::core::types::Dataset;

/// Response, design matrix and cluster membership for one fit.
#[derive(Debug, Clone)]
pub struct Design {
    pub column_names: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Row indices per cluster, clusters in sorted label order.
    pub clusters: Vec<Vec<usize>>,
}

impl Design {
    pub fn build(formula: &Formula, groups: &str, data: &Dataset) -> Result<Self, FitError> {
        if data.is_empty() {
            return Err(FitError::EmptyData {
                formula: formula.source().to_string(),
            });
        }
        let y = data
            .numeric(formula.response())
            .ok_or_else(|| FitError::UnknownColumn(formula.response().to_string()))?;

        let n = data.len();
        let mut x = Array2::<f64>::ones((n, formula.terms().len()));
        for (col, term) in formula.terms().iter().enumerate() {
            for factor in &term.factors {
                let values = data
                    .numeric(factor)
                    .ok_or_else(|| FitError::UnknownColumn(factor.clone()))?;
                for (row, value) in values.into_iter().enumerate() {
                    x[[row, col]] *= value;
                }
            }
        }

        let clusters = data
            .group_indices(groups)
            .ok_or_else(|| FitError::UnknownColumn(groups.to_string()))?
            .into_values()
            .collect();

        Ok(Self {
            column_names: formula.term_names(),
            x,
            y: Array1::from(y),
            clusters,
        })
    }

    pub fn nobs(&self) -> usize {
        self.y.len()
    }

    pub fn n_params(&self) -> usize {
        self.x.ncols()
    }
}
