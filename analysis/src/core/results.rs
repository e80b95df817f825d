//! Fitted GEE model: estimates, covariances and inference.
//!
//! A `GeeResults` is created by a fit, never mutated, and persisted as-is.
//! All inference uses the cluster-robust covariance.

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use thiserror::Error;

use crate::core::cov_struct::CovStruct;
use crate::core::family::Family;
use crate::core::linalg::{invert_spd, quadratic_form};

#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("unknown term {term:?} (model terms: {available})")]
    UnknownTerm { term: String, available: String },
    #[error("wald test needs at least one term")]
    NoTerms,
    #[error("covariance of {terms} is not positive definite")]
    DegenerateCovariance { terms: String },
}

/// Summary of cluster sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterSizes {
    pub count: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl ClusterSizes {
    pub fn from_clusters(clusters: &[Vec<usize>]) -> Self {
        let sizes: Vec<usize> = clusters.iter().map(Vec::len).collect();
        let count = sizes.len();
        let total: usize = sizes.iter().sum();
        Self {
            count,
            min: sizes.iter().copied().min().unwrap_or(0),
            max: sizes.iter().copied().max().unwrap_or(0),
            mean: if count == 0 {
                0.0
            } else {
                total as f64 / count as f64
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeeResults {
    pub formula: String,
    pub response: String,
    /// Cluster column.
    pub groups: String,
    pub family: Family,
    pub cov_struct: CovStruct,
    pub term_names: Vec<String>,
    pub params: Vec<f64>,
    /// Sandwich covariance, row-major.
    pub cov_robust: Vec<Vec<f64>>,
    /// Model-based covariance, row-major.
    pub cov_naive: Vec<Vec<f64>>,
    /// Working correlation parameter (0 for independence).
    pub dependence: f64,
    pub scale: f64,
    pub nobs: usize,
    pub cluster_sizes: ClusterSizes,
    pub iterations: usize,
    pub converged: bool,
}

/// Outcome of a Wald test that the named coefficients are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaldTest {
    pub terms: Vec<String>,
    pub statistic: f64,
    pub df: usize,
    pub p_value: f64,
}

impl GeeResults {
    pub fn term_index(&self, term: &str) -> Result<usize, InferenceError> {
        self.term_names
            .iter()
            .position(|name| name == term)
            .ok_or_else(|| InferenceError::UnknownTerm {
                term: term.to_string(),
                available: self.term_names.join(", "),
            })
    }

    pub fn param(&self, term: &str) -> Result<f64, InferenceError> {
        Ok(self.params[self.term_index(term)?])
    }

    pub fn std_errors(&self) -> Vec<f64> {
        (0..self.params.len())
            .map(|i| self.cov_robust[i][i].max(0.0).sqrt())
            .collect()
    }

    pub fn z_values(&self) -> Vec<f64> {
        self.params
            .iter()
            .zip(self.std_errors())
            .map(|(param, se)| param / se)
            .collect()
    }

    /// Two-sided normal p-values per coefficient.
    pub fn p_values(&self) -> Vec<f64> {
        self.z_values()
            .into_iter()
            .map(|z| chi_squared_sf(z * z, 1))
            .collect()
    }

    /// Confidence bounds `(lower, upper)` at level `1 - alpha`.
    pub fn conf_int(&self, alpha: f64) -> Vec<(f64, f64)> {
        let q = two_sided_normal_quantile(alpha);
        self.params
            .iter()
            .zip(self.std_errors())
            .map(|(param, se)| (param - q * se, param + q * se))
            .collect()
    }

    /// Joint Wald test of `coef = 0` for every named term.
    pub fn wald_test(&self, terms: &[&str]) -> Result<WaldTest, InferenceError> {
        if terms.is_empty() {
            return Err(InferenceError::NoTerms);
        }
        let indices = terms
            .iter()
            .map(|term| self.term_index(term))
            .collect::<Result<Vec<_>, _>>()?;

        let k = indices.len();
        let b = Array1::from_shape_fn(k, |i| self.params[indices[i]]);
        let v = Array2::from_shape_fn((k, k), |(i, j)| self.cov_robust[indices[i]][indices[j]]);
        let v_inv = invert_spd(&v).ok_or_else(|| InferenceError::DegenerateCovariance {
            terms: terms.join(", "),
        })?;
        let statistic = quadratic_form(&v_inv, &b);
        let p_value = chi_squared_sf(statistic, k);

        Ok(WaldTest {
            terms: terms.iter().map(|term| term.to_string()).collect(),
            statistic,
            df: k,
            p_value,
        })
    }

    /// Scalar p-value of the single-term Wald test.
    pub fn wald_p_value(&self, term: &str) -> Result<f64, InferenceError> {
        Ok(self.wald_test(&[term])?.p_value)
    }
}

impl fmt::Display for GeeResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(86);
        let thin = "-".repeat(86);
        writeln!(f, "{:^86}", "GEE Regression Results")?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Dep. Variable: {:<26}No. Observations: {:>10}", self.response, self.nobs)?;
        writeln!(
            f,
            "Model: {:<33}No. clusters: {:>14}",
            "GEE", self.cluster_sizes.count
        )?;
        writeln!(
            f,
            "Family: {:<32}Min. cluster size: {:>9}",
            self.family.to_string(),
            self.cluster_sizes.min
        )?;
        writeln!(
            f,
            "Link: {:<34}Max. cluster size: {:>9}",
            self.family.link_name(),
            self.cluster_sizes.max
        )?;
        writeln!(
            f,
            "Dependence structure: {:<18}Mean cluster size: {:>9.1}",
            self.cov_struct.to_string(),
            self.cluster_sizes.mean
        )?;
        writeln!(
            f,
            "Covariance type: {:<23}Iterations: {:>16}",
            "robust", self.iterations
        )?;
        writeln!(
            f,
            "Converged: {:<29}Dependence (alpha): {:>8.4}",
            self.converged, self.dependence
        )?;
        writeln!(f, "Formula: {}", self.formula)?;
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "{:<40}{:>8}{:>9}{:>8}{:>8}{:>9}{:>9}",
            "", "coef", "std err", "z", "P>|z|", "[0.025", "0.975]"
        )?;
        writeln!(f, "{thin}")?;
        let se = self.std_errors();
        let z = self.z_values();
        let p = self.p_values();
        let ci = self.conf_int(0.05);
        for (i, name) in self.term_names.iter().enumerate() {
            writeln!(
                f,
                "{:<40}{:>8.4}{:>9.3}{:>8.3}{:>8.3}{:>9.3}{:>9.3}",
                truncate(name, 39),
                self.params[i],
                se[i],
                z[i],
                p[i],
                ci[i].0,
                ci[i].1
            )?;
        }
        write!(f, "{rule}")
    }
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut out: String = name.chars().take(width - 1).collect();
    out.push('~');
    out
}

/// `q` with `P(|Z| > q) = alpha` for standard normal `Z`.
fn two_sided_normal_quantile(alpha: f64) -> f64 {
    if alpha.is_nan() || alpha <= 0.0 || alpha > 1.0 {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(dist) => -dist.inverse_cdf(alpha / 2.0),
        Err(_) => f64::NAN,
    }
}

/// Upper tail of the chi-square distribution.
fn chi_squared_sf(statistic: f64, df: usize) -> f64 {
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(params: Vec<f64>, cov: Vec<Vec<f64>>) -> GeeResults {
        let names = (0..params.len())
            .map(|i| if i == 0 { "Intercept".to_string() } else { format!("x{i}") })
            .collect();
        GeeResults {
            formula: "y ~ x1 + x2".to_string(),
            response: "y".to_string(),
            groups: "SubjectID".to_string(),
            family: Family::Binomial,
            cov_struct: CovStruct::Exchangeable,
            term_names: names,
            params,
            cov_robust: cov.clone(),
            cov_naive: cov,
            dependence: 0.1,
            scale: 1.0,
            nobs: 20,
            cluster_sizes: ClusterSizes {
                count: 4,
                min: 5,
                max: 5,
                mean: 5.0,
            },
            iterations: 7,
            converged: true,
        }
    }

    #[test]
    fn single_term_wald_matches_two_sided_z_test() {
        let fit = results(
            vec![0.2, 1.96, -0.5],
            vec![
                vec![0.04, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 0.25],
            ],
        );
        let wald = fit.wald_test(&["x1"]).expect("wald");
        assert_eq!(wald.df, 1);
        assert!((wald.statistic - 1.96 * 1.96).abs() < 1e-12);
        assert!((wald.p_value - 0.05).abs() < 1e-3, "{}", wald.p_value);
        assert!((wald.p_value - fit.p_values()[1]).abs() < 1e-9);
    }

    #[test]
    fn joint_wald_uses_covariance_between_terms() {
        let fit = results(
            vec![0.0, 1.0, 1.0],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.5],
                vec![0.0, 0.5, 1.0],
            ],
        );
        let wald = fit.wald_test(&["x1", "x2"]).expect("wald");
        // b' V^-1 b with V = [[1, .5], [.5, 1]] and b = (1, 1) is 4/3.
        assert!((wald.statistic - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(wald.df, 2);
        assert!((wald.p_value - (-2.0f64 / 3.0).exp()).abs() < 1e-9);
    }

    #[test]
    fn unknown_term_lists_available_terms() {
        let fit = results(vec![0.0, 1.0], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let err = fit.wald_test(&["SessionID:GridCoarseness"]).expect_err("unknown");
        assert_eq!(
            err,
            InferenceError::UnknownTerm {
                term: "SessionID:GridCoarseness".to_string(),
                available: "Intercept, x1".to_string(),
            }
        );
        assert_eq!(fit.wald_test(&[]).expect_err("empty"), InferenceError::NoTerms);
    }

    #[test]
    fn conf_int_is_symmetric_around_estimate() {
        let fit = results(vec![1.0, -2.0], vec![vec![0.25, 0.0], vec![0.0, 1.0]]);
        let ci = fit.conf_int(0.05);
        let q = 1.959_963_984_540_054;
        assert!((ci[0].0 - (1.0 - q * 0.5)).abs() < 1e-12);
        assert!((ci[1].1 - (-2.0 + q)).abs() < 1e-12);
    }

    #[test]
    fn far_tail_p_value_keeps_precision() {
        let fit = results(vec![0.0, 9.0], vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let p = fit.wald_p_value("x1").expect("wald");
        // 2 * Phi(-9)
        let expected = 2.257_176_811_907_681e-19;
        assert!(p > 0.0);
        assert!(((p - expected) / expected).abs() < 1e-6, "{p}");
    }

    #[test]
    fn summary_lists_every_term() {
        let fit = results(
            vec![0.1, 0.2, 0.3],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        );
        let summary = fit.to_string();
        assert!(summary.contains("GEE Regression Results"));
        assert!(summary.contains("Exchangeable"));
        for name in &fit.term_names {
            assert!(summary.contains(name.as_str()));
        }
    }
}
