//! Generalized estimating equations for clustered outcomes.
//!
//! Mean parameters are found by Fisher scoring on the estimating equations
//! `sum_i D_i' V_i^-1 (y_i - mu_i) = 0`, alternating with a moment update of
//! the working correlation. Inference uses the cluster-robust sandwich
//! covariance.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::cov_struct::CovStruct;
use crate::core::design::Design;
use crate::core::family::Family;
use crate::core::formula::Formula;
use crate::core::linalg::invert_spd;
use crate::core::results::{ClusterSizes, GeeResults};
use crate::core::types::Dataset;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("no observations to fit {formula:?}")]
    EmptyData { formula: String },
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
    #[error("response value {value} at row {row} is outside the {family} support")]
    InvalidResponse { row: usize, value: f64, family: Family },
    #[error("information matrix is singular after {iterations} iterations (collinear design?)")]
    Singular { iterations: usize },
    #[error("estimates became non-finite after {iterations} iterations")]
    NonFinite { iterations: usize },
}

/// Iteration controls for the scoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub max_iter: usize,
    /// Convergence when the largest absolute parameter step falls below this.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: 60,
            tolerance: 1e-6,
        }
    }
}

/// Per-cluster contributions at the current parameters.
struct Contributions {
    /// `sum_i D_i' V_i^-1 D_i`
    bread: Array2<f64>,
    /// `sum_i D_i' V_i^-1 (y_i - mu_i)`
    score: Array1<f64>,
    /// `sum_i s_i s_i'` with `s_i` the cluster score.
    meat: Array2<f64>,
    /// Pearson residuals per cluster.
    residuals: Vec<Vec<f64>>,
}

/// Fit a GEE model of `formula` on `data`, clustered by the `groups` column.
pub fn fit_gee(
    formula: &Formula,
    groups: &str,
    data: &Dataset,
    family: Family,
    cov_struct: CovStruct,
    options: &FitOptions,
) -> Result<GeeResults, FitError> {
    let design = Design::build(formula, groups, data)?;
    if let Some((row, &value)) = design
        .y
        .iter()
        .enumerate()
        .find(|(_, value)| !family.accepts(**value))
    {
        return Err(FitError::InvalidResponse { row, value, family });
    }

    let p = design.n_params();
    let mut params = Array1::<f64>::zeros(p);
    let mut dependence = 0.0;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < options.max_iter {
        iterations += 1;
        let step = contributions(&design, &params, family, cov_struct, dependence);
        let bread_inv = invert_spd(&step.bread).ok_or(FitError::Singular { iterations })?;
        let update = bread_inv.dot(&step.score);
        params += &update;
        if params.iter().any(|value| !value.is_finite()) {
            return Err(FitError::NonFinite { iterations });
        }

        let refreshed = contributions(&design, &params, family, cov_struct, dependence);
        dependence = cov_struct.estimate_dependence(&refreshed.residuals, p);

        let max_step = update.iter().fold(0.0f64, |acc, value| acc.max(value.abs()));
        debug!(iterations, max_step, dependence, "gee scoring step");
        if max_step < options.tolerance {
            converged = true;
            break;
        }
    }
    if !converged {
        warn!(
            formula = %formula,
            iterations,
            "gee did not converge; estimates may be unreliable"
        );
    }

    let fin = contributions(&design, &params, family, cov_struct, dependence);
    let bread_inv = invert_spd(&fin.bread).ok_or(FitError::Singular { iterations })?;
    let cov_robust = bread_inv.dot(&fin.meat).dot(&bread_inv);
    let scale = if family.fixed_scale() {
        1.0
    } else {
        pearson_scale(&fin.residuals, design.nobs(), p)
    };
    let cov_naive = &bread_inv * scale;
    if cov_robust.iter().any(|value| !value.is_finite()) {
        return Err(FitError::NonFinite { iterations });
    }

    Ok(GeeResults {
        formula: formula.source().to_string(),
        response: formula.response().to_string(),
        groups: groups.to_string(),
        family,
        cov_struct,
        term_names: design.column_names.clone(),
        params: params.to_vec(),
        cov_robust: rows_of(&cov_robust),
        cov_naive: rows_of(&cov_naive),
        dependence,
        scale,
        nobs: design.nobs(),
        cluster_sizes: ClusterSizes::from_clusters(&design.clusters),
        iterations,
        converged,
    })
}

fn contributions(
    design: &Design,
    params: &Array1<f64>,
    family: Family,
    cov_struct: CovStruct,
    dependence: f64,
) -> Contributions {
    let p = design.n_params();
    let eta = design.x.dot(params);
    let mut bread = Array2::<f64>::zeros((p, p));
    let mut score = Array1::<f64>::zeros(p);
    let mut meat = Array2::<f64>::zeros((p, p));
    let mut residuals = Vec::with_capacity(design.clusters.len());

    for rows in &design.clusters {
        let x_i = design.x.select(Axis(0), rows);
        let mut pearson = Vec::with_capacity(rows.len());
        let mut weights = Vec::with_capacity(rows.len());
        for &row in rows {
            let mu = family.mean(eta[row]);
            let sd = family.variance(mu).sqrt();
            pearson.push((design.y[row] - mu) / sd);
            weights.push(family.mean_derivative(mu) / sd);
        }

        // With V = S R S and D = G X: D'V^-1 = Z' R^-1 S^-1 where Z = (G / S) X.
        let z_i = &x_i * &Array1::from(weights).insert_axis(Axis(1));
        let r_inv_resid = Array1::from(cov_struct.apply_inverse(dependence, &pearson));
        let mut r_inv_z = Array2::<f64>::zeros(z_i.raw_dim());
        for (col, column) in z_i.axis_iter(Axis(1)).enumerate() {
            let transformed = cov_struct.apply_inverse(dependence, &column.to_vec());
            for (row, value) in transformed.into_iter().enumerate() {
                r_inv_z[[row, col]] = value;
            }
        }

        bread += &z_i.t().dot(&r_inv_z);
        let cluster_score = z_i.t().dot(&r_inv_resid);
        score += &cluster_score;
        let column = cluster_score.view().insert_axis(Axis(1));
        meat += &column.dot(&column.t());
        residuals.push(pearson);
    }

    Contributions {
        bread,
        score,
        meat,
        residuals,
    }
}

fn pearson_scale(residuals: &[Vec<f64>], nobs: usize, n_params: usize) -> f64 {
    let ssr: f64 = residuals.iter().flatten().map(|r| r * r).sum();
    let df = if nobs > n_params { nobs - n_params } else { nobs };
    ssr / df as f64
}

fn rows_of(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Observation;

    fn obs(subject: &str, x: f64, y: f64) -> Observation {
        Observation {
            subject_id: subject.to_string(),
            session_id: 1,
            correct: y,
            contrast_heterogeneity: x,
            grid_coarseness: 0.0,
        }
    }

    fn logit(p: f64) -> f64 {
        (p / (1.0 - p)).ln()
    }

    /// Four subjects, binary predictor: 3/8 correct at x=0 and 6/8 at x=1.
    fn binary_predictor_data() -> Dataset {
        let mut rows = Vec::new();
        let x0 = [[1.0, 0.0], [1.0, 0.0], [1.0, 0.0], [0.0, 0.0]];
        let x1 = [[1.0, 1.0], [1.0, 1.0], [1.0, 0.0], [1.0, 0.0]];
        for (index, subject) in ["a", "b", "c", "d"].into_iter().enumerate() {
            for y in x0[index] {
                rows.push(obs(subject, 0.0, y));
            }
            for y in x1[index] {
                rows.push(obs(subject, 1.0, y));
            }
        }
        Dataset::new(rows)
    }

    #[test]
    fn independence_matches_logistic_regression() {
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let results = fit_gee(
            &formula,
            "SubjectID",
            &binary_predictor_data(),
            Family::Binomial,
            CovStruct::Independence,
            &FitOptions::default(),
        )
        .expect("fit");
        assert!(results.converged);
        let b0 = logit(3.0 / 8.0);
        let b1 = logit(6.0 / 8.0) - b0;
        assert!((results.params[0] - b0).abs() < 1e-8, "{:?}", results.params);
        assert!((results.params[1] - b1).abs() < 1e-8, "{:?}", results.params);
        assert_eq!(results.dependence, 0.0);
    }

    #[test]
    fn intercept_only_robust_variance_matches_closed_form() {
        let data = Dataset::new(vec![
            obs("a", 0.0, 1.0),
            obs("a", 0.0, 1.0),
            obs("a", 0.0, 0.0),
            obs("b", 0.0, 0.0),
            obs("b", 0.0, 0.0),
            obs("c", 0.0, 1.0),
            obs("c", 0.0, 0.0),
            obs("c", 0.0, 1.0),
        ]);
        let formula = Formula::parse("Correct ~ 1").expect("parse");
        let results = fit_gee(
            &formula,
            "SubjectID",
            &data,
            Family::Binomial,
            CovStruct::Independence,
            &FitOptions::default(),
        )
        .expect("fit");

        let p: f64 = 4.0 / 8.0;
        assert!((results.params[0] - logit(p)).abs() < 1e-8);
        // Sandwich: sum_i (sum_j (y_ij - p))^2 / (N p (1 - p))^2
        let cluster_sums = [2.0 - 3.0 * p, 0.0 - 2.0 * p, 2.0 - 3.0 * p];
        let meat: f64 = cluster_sums.iter().map(|s| s * s).sum();
        let bread = 8.0 * p * (1.0 - p);
        let expected = meat / (bread * bread);
        assert!((results.cov_robust[0][0] - expected).abs() < 1e-10);
        assert!((results.cov_naive[0][0] - 1.0 / bread).abs() < 1e-10);
    }

    #[test]
    fn gaussian_independence_matches_least_squares() {
        // y = 1 + 2x exactly, plus symmetric noise that cancels in the fit.
        let data = Dataset::new(vec![
            obs("a", 0.0, 1.5),
            obs("a", 0.0, 0.5),
            obs("b", 1.0, 3.5),
            obs("b", 1.0, 2.5),
            obs("c", 2.0, 5.0),
        ]);
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let results = fit_gee(
            &formula,
            "SubjectID",
            &data,
            Family::Gaussian,
            CovStruct::Independence,
            &FitOptions::default(),
        )
        .expect("fit");
        assert!((results.params[0] - 1.0).abs() < 1e-10);
        assert!((results.params[1] - 2.0).abs() < 1e-10);
        // Residuals are ±0.5 on four rows and 0 on one: 1.0 / (5 - 2).
        assert!((results.scale - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn exchangeable_fit_recovers_effect_direction() {
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let results = fit_gee(
            &formula,
            "SubjectID",
            &binary_predictor_data(),
            Family::Binomial,
            CovStruct::Exchangeable,
            &FitOptions::default(),
        )
        .expect("fit");
        assert!(results.converged);
        assert!(results.params[1] > 0.0);
        assert!(results.dependence > -1.0 && results.dependence < 1.0);
        assert_eq!(results.nobs, 16);
        assert_eq!(results.cluster_sizes.count, 4);
    }

    #[test]
    fn collinear_design_is_singular() {
        let data = Dataset::new(vec![obs("a", 1.0, 1.0), obs("b", 1.0, 0.0), obs("c", 1.0, 1.0)]);
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let err = fit_gee(
            &formula,
            "SubjectID",
            &data,
            Family::Binomial,
            CovStruct::Exchangeable,
            &FitOptions::default(),
        )
        .expect_err("singular");
        assert!(matches!(err, FitError::Singular { iterations: 1 }));
    }

    #[test]
    fn non_binary_outcome_is_rejected_for_binomial() {
        let data = Dataset::new(vec![obs("a", 0.0, 1.0), obs("a", 1.0, 0.5)]);
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let err = fit_gee(
            &formula,
            "SubjectID",
            &data,
            Family::Binomial,
            CovStruct::Exchangeable,
            &FitOptions::default(),
        )
        .expect_err("invalid response");
        assert!(matches!(err, FitError::InvalidResponse { row: 1, .. }));
    }

    #[test]
    fn separated_data_returns_unconverged_fit() {
        let data = Dataset::new(vec![
            obs("a", 0.0, 0.0),
            obs("a", 1.0, 1.0),
            obs("b", 0.0, 0.0),
            obs("b", 1.0, 1.0),
        ]);
        let formula = Formula::parse("Correct ~ ContrastHeterogeneity").expect("parse");
        let results = fit_gee(
            &formula,
            "SubjectID",
            &data,
            Family::Binomial,
            CovStruct::Exchangeable,
            &FitOptions {
                max_iter: 25,
                tolerance: 1e-6,
            },
        )
        .expect("separation is not fatal");
        assert!(!results.converged);
        assert_eq!(results.iterations, 25);
        assert!(results.params.iter().all(|value| value.is_finite()));
    }
}
