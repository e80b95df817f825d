//! Working correlation structures for within-cluster dependence.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keeps exchangeable correlations strictly inside the positive definite range.
const ALPHA_MARGIN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovStruct {
    /// Observations within a cluster are treated as uncorrelated.
    Independence,
    /// Every pair within a cluster shares one correlation `alpha`.
    Exchangeable,
}

impl CovStruct {
    /// Moment estimate of the dependence parameter from Pearson residuals.
    ///
    /// `residuals` holds one slice per cluster, `n_params` is the number of
    /// mean parameters. Independence always yields 0.
    pub fn estimate_dependence(self, residuals: &[Vec<f64>], n_params: usize) -> f64 {
        match self {
            CovStruct::Independence => 0.0,
            CovStruct::Exchangeable => exchangeable_alpha(residuals, n_params),
        }
    }

    /// Apply the inverse working correlation of a cluster of `v.len()` rows.
    pub fn apply_inverse(self, dependence: f64, v: &[f64]) -> Vec<f64> {
        match self {
            CovStruct::Independence => v.to_vec(),
            CovStruct::Exchangeable => exchangeable_inverse(dependence, v),
        }
    }
}

impl fmt::Display for CovStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CovStruct::Independence => "Independence",
            CovStruct::Exchangeable => "Exchangeable",
        };
        f.write_str(name)
    }
}

fn exchangeable_alpha(residuals: &[Vec<f64>], n_params: usize) -> f64 {
    let n_params = n_params as f64;
    let mut ssr = 0.0;
    let mut nobs = 0.0;
    let mut cross = 0.0;
    let mut n_pairs = 0.0;
    let mut max_size = 0usize;
    for cluster in residuals {
        let sum: f64 = cluster.iter().sum();
        let sq: f64 = cluster.iter().map(|r| r * r).sum();
        ssr += sq;
        nobs += cluster.len() as f64;
        cross += (sum * sum - sq) / 2.0;
        n_pairs += 0.5 * cluster.len() as f64 * (cluster.len() as f64 - 1.0);
        max_size = max_size.max(cluster.len());
    }
    if n_pairs == 0.0 || ssr == 0.0 {
        return 0.0;
    }

    let scale_df = if nobs > n_params { nobs - n_params } else { nobs };
    let scale = ssr / scale_df;
    let pair_df = if n_pairs > n_params { n_pairs - n_params } else { n_pairs };
    let alpha = cross / scale / pair_df;
    if !alpha.is_finite() {
        return 0.0;
    }

    let lower = if max_size > 1 {
        -1.0 / (max_size as f64 - 1.0)
    } else {
        -1.0
    };
    alpha.clamp(lower + ALPHA_MARGIN, 1.0 - ALPHA_MARGIN)
}

/// `R^-1 v` for `R = (1 - a) I + a 11'`, in closed form.
fn exchangeable_inverse(alpha: f64, v: &[f64]) -> Vec<f64> {
    let n = v.len() as f64;
    let c = alpha / (1.0 + (n - 1.0) * alpha);
    let total: f64 = v.iter().sum();
    v.iter()
        .map(|value| (value - c * total) / (1.0 - alpha))
        .collect()
}
