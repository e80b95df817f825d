//! Outcome distributions with their canonical links.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fitted probabilities stay this far away from 0 and 1.
const PROB_EPS: f64 = 1e-8;
/// Clamp for log-link linear predictors before exponentiation.
const ETA_MAX: f64 = 700.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Binary outcome, logit link.
    Binomial,
    /// Count outcome, log link.
    Poisson,
    /// Continuous outcome, identity link.
    Gaussian,
}

impl Family {
    pub fn link_name(self) -> &'static str {
        match self {
            Family::Binomial => "logit",
            Family::Poisson => "log",
            Family::Gaussian => "identity",
        }
    }

    /// Inverse link: mean from linear predictor.
    pub fn mean(self, eta: f64) -> f64 {
        match self {
            Family::Binomial => {
                let eta = eta.clamp(-ETA_MAX, ETA_MAX);
                (1.0 / (1.0 + (-eta).exp())).clamp(PROB_EPS, 1.0 - PROB_EPS)
            }
            Family::Poisson => eta.clamp(-ETA_MAX, ETA_MAX).exp(),
            Family::Gaussian => eta,
        }
    }

    /// `d mean / d eta` evaluated at `mu`.
    pub fn mean_derivative(self, mu: f64) -> f64 {
        match self {
            Family::Binomial => mu * (1.0 - mu),
            Family::Poisson => mu,
            Family::Gaussian => 1.0,
        }
    }

    pub fn variance(self, mu: f64) -> f64 {
        match self {
            Family::Binomial => mu * (1.0 - mu),
            Family::Poisson => mu,
            Family::Gaussian => 1.0,
        }
    }

    /// Whether the dispersion is fixed at 1 rather than estimated.
    pub fn fixed_scale(self) -> bool {
        matches!(self, Family::Binomial | Family::Poisson)
    }

    /// Whether `y` lies in the support of the outcome.
    pub fn accepts(self, y: f64) -> bool {
        match self {
            Family::Binomial => y == 0.0 || y == 1.0,
            Family::Poisson => y >= 0.0 && y.is_finite(),
            Family::Gaussian => y.is_finite(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Binomial => "Binomial",
            Family::Poisson => "Poisson",
            Family::Gaussian => "Gaussian",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logit_mean_is_clamped_inside_unit_interval() {
        assert!((Family::Binomial.mean(0.0) - 0.5).abs() < 1e-12);
        let high = Family::Binomial.mean(1e6);
        let low = Family::Binomial.mean(-1e6);
        assert!(high < 1.0 && high > 0.99);
        assert!(low > 0.0 && low < 0.01);
    }

    #[test]
    fn canonical_links_have_derivative_equal_to_variance() {
        for family in [Family::Binomial, Family::Poisson] {
            let mu = family.mean(0.3);
            assert_eq!(family.mean_derivative(mu), family.variance(mu));
        }
    }

    #[test]
    fn binomial_accepts_only_zero_and_one() {
        assert!(Family::Binomial.accepts(0.0));
        assert!(Family::Binomial.accepts(1.0));
        assert!(!Family::Binomial.accepts(0.5));
        assert!(!Family::Poisson.accepts(-1.0));
    }
}
