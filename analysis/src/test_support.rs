//! Test-only helpers: synthetic datasets, prepared fits and a scripted backend.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::core::cov_struct::CovStruct;
use crate::core::family::Family;
use crate::core::model::{ModelFitter, ModelSpec};
use crate::core::results::{ClusterSizes, GeeResults};
use crate::core::types::{Dataset, Observation};

/// `subjects × sessions × trials` rows with `Correct` alternating 0/1 in row order.
///
/// Predictors cycle with trial, session and subject so that no column is
/// constant within a session.
pub fn alternating_dataset(subjects: usize, sessions: u32, trials: usize) -> Dataset {
    let mut rows = Vec::with_capacity(subjects * sessions as usize * trials);
    for subject in 0..subjects {
        for session in 1..=sessions {
            for trial in 0..trials {
                let index = rows.len();
                rows.push(Observation {
                    subject_id: format!("s{:02}", subject + 1),
                    session_id: session,
                    correct: (index % 2) as f64,
                    contrast_heterogeneity: ((trial + subject) % 4) as f64 * 0.25,
                    grid_coarseness: (1 + (3 * trial + session as usize + subject) % 5) as f64,
                });
            }
        }
    }
    Dataset::new(rows)
}

/// Write `data` as the experiment CSV (header plus one line per row).
pub fn write_dataset_csv(path: &Path, data: &Dataset) -> Result<()> {
    let mut buf =
        String::from("SubjectID,SessionID,ContrastHeterogeneity,GridCoarseness,Correct\n");
    for row in data.rows() {
        buf.push_str(&format!(
            "{},{},{},{},{}\n",
            row.subject_id,
            row.session_id,
            row.contrast_heterogeneity,
            row.grid_coarseness,
            row.correct
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

/// `|z|` whose two-sided normal p-value is `p_value`.
pub fn z_for_p_value(p_value: f64) -> f64 {
    match Normal::new(0.0, 1.0) {
        Ok(dist) if p_value > 0.0 && p_value <= 1.0 => -dist.inverse_cdf(p_value / 2.0),
        _ => f64::NAN,
    }
}

/// Prepared fit of `formula` whose single-term Wald p-values are given.
///
/// Terms not listed get coefficient 0 (p-value 1). Standard errors are 1 and
/// coefficients are independent.
pub fn results_with_p_values(formula: &str, p_values: &[(&str, f64)]) -> Result<GeeResults> {
    let spec = ModelSpec::binomial_exchangeable(formula, "SubjectID")?;
    let term_names = spec.formula.term_names();
    for (term, _) in p_values {
        if !term_names.iter().any(|name| name == term) {
            return Err(anyhow!("term {term:?} not in {formula:?}"));
        }
    }
    let params = term_names
        .iter()
        .map(|name| {
            p_values
                .iter()
                .find(|(term, _)| term == name)
                .map_or(0.0, |(_, p)| z_for_p_value(*p))
        })
        .collect::<Vec<_>>();
    let k = params.len();
    let identity: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    Ok(GeeResults {
        formula: spec.formula.source().to_string(),
        response: spec.formula.response().to_string(),
        groups: spec.groups,
        family: Family::Binomial,
        cov_struct: CovStruct::Exchangeable,
        term_names,
        params,
        cov_robust: identity.clone(),
        cov_naive: identity,
        dependence: 0.0,
        scale: 1.0,
        nobs: 0,
        cluster_sizes: ClusterSizes {
            count: 0,
            min: 0,
            max: 0,
            mean: 0.0,
        },
        iterations: 1,
        converged: true,
    })
}

/// One recorded fit request.
#[derive(Debug, Clone, PartialEq)]
pub struct FitCall {
    pub formula: String,
    pub rows: usize,
    pub sessions: Vec<u32>,
}

/// Fitter that returns prepared results keyed by formula source.
pub struct ScriptedFitter {
    responses: Vec<GeeResults>,
    calls: RefCell<Vec<FitCall>>,
}

impl ScriptedFitter {
    pub fn new(responses: Vec<GeeResults>) -> Self {
        Self {
            responses,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<FitCall> {
        self.calls.borrow().clone()
    }
}

impl ModelFitter for ScriptedFitter {
    fn fit(&self, spec: &ModelSpec, data: &Dataset) -> Result<GeeResults> {
        self.calls.borrow_mut().push(FitCall {
            formula: spec.formula.source().to_string(),
            rows: data.len(),
            sessions: data.session_ids(),
        });
        self.responses
            .iter()
            .find(|results| results.formula == spec.formula.source())
            .cloned()
            .ok_or_else(|| anyhow!("no scripted result for {}", spec.formula))
    }
}
