//! Significance gate deciding whether per-session follow-up fits run.

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::results::{GeeResults, InferenceError};

pub const DEFAULT_CUTOFF: f64 = 0.05;

/// Tagged outcome of testing one interaction term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    Significant {
        p_value: f64,
    },
    NotSignificant {
        /// `null` in JSON when the Wald test was undefined.
        #[serde(deserialize_with = "nan_from_null")]
        p_value: f64,
    },
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl GateOutcome {
    /// Significant iff `p_value < cutoff`. A NaN p-value is never significant.
    pub fn from_p_value(p_value: f64, cutoff: f64) -> Self {
        if p_value < cutoff {
            GateOutcome::Significant { p_value }
        } else {
            GateOutcome::NotSignificant { p_value }
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(self, GateOutcome::Significant { .. })
    }

    pub fn p_value(&self) -> f64 {
        match self {
            GateOutcome::Significant { p_value } | GateOutcome::NotSignificant { p_value } => {
                *p_value
            }
        }
    }
}

/// Wald-test `term` on `results` and classify it against `cutoff`.
///
/// A term whose robust variance is not positive gets a NaN p-value and is
/// not significant. Unknown terms are errors.
pub fn evaluate_gate(
    results: &GeeResults,
    term: &str,
    cutoff: f64,
) -> Result<GateOutcome, InferenceError> {
    let p_value = match results.wald_p_value(term) {
        Ok(p_value) => p_value,
        Err(InferenceError::DegenerateCovariance { .. }) => f64::NAN,
        Err(err) => return Err(err),
    };
    Ok(GateOutcome::from_p_value(p_value, cutoff))
}

/// Sessions to refit for a gate outcome: all of `1..=sessions` or none.
pub fn follow_up_sessions(outcome: &GateOutcome, sessions: u32) -> Vec<u32> {
    if outcome.is_significant() {
        (1..=sessions).collect()
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::results_with_p_values;

    #[test]
    fn p_below_cutoff_is_significant() {
        let outcome = GateOutcome::from_p_value(0.03, DEFAULT_CUTOFF);
        assert_eq!(outcome, GateOutcome::Significant { p_value: 0.03 });
        assert_eq!(follow_up_sessions(&outcome, 8), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn p_above_cutoff_skips_follow_up() {
        let outcome = GateOutcome::from_p_value(0.10, DEFAULT_CUTOFF);
        assert_eq!(outcome, GateOutcome::NotSignificant { p_value: 0.10 });
        assert!(follow_up_sessions(&outcome, 8).is_empty());
    }

    #[test]
    fn p_equal_to_cutoff_is_not_significant() {
        assert!(!GateOutcome::from_p_value(0.05, 0.05).is_significant());
        assert!(!GateOutcome::from_p_value(f64::NAN, 0.05).is_significant());
    }

    #[test]
    fn raising_the_cutoff_never_revokes_significance() {
        let p_values = [0.0, 0.001, 0.01, 0.03, 0.049, 0.05, 0.051, 0.1, 0.5, 1.0];
        let cutoffs = [0.001, 0.01, 0.025, 0.05, 0.1, 0.2, 1.0];
        for p in p_values {
            for (low, high) in cutoffs.iter().zip(cutoffs.iter().skip(1)) {
                let before = GateOutcome::from_p_value(p, *low).is_significant();
                let after = GateOutcome::from_p_value(p, *high).is_significant();
                assert!(!before || after, "p={p} low={low} high={high}");
            }
        }
    }

    #[test]
    fn degenerate_term_variance_is_not_significant() {
        let mut results = results_with_p_values(
            "Correct ~ GridCoarseness + SessionID + SessionID:GridCoarseness",
            &[("SessionID:GridCoarseness", 0.01)],
        )
        .expect("results");
        let index = results
            .term_names
            .iter()
            .position(|name| name == "SessionID:GridCoarseness")
            .expect("term");
        results.cov_robust[index][index] = 0.0;

        let outcome = evaluate_gate(&results, "SessionID:GridCoarseness", DEFAULT_CUTOFF)
            .expect("gate");
        assert!(!outcome.is_significant());
        assert!(outcome.p_value().is_nan());
        assert!(evaluate_gate(&results, "SessionID:Missing", DEFAULT_CUTOFF).is_err());
    }

    #[test]
    fn undefined_p_value_round_trips_as_null() {
        let json = serde_json::to_string(&GateOutcome::NotSignificant { p_value: f64::NAN })
            .expect("serialize");
        assert_eq!(json, r#"{"outcome":"not_significant","p_value":null}"#);
        let back: GateOutcome = serde_json::from_str(&json).expect("deserialize");
        assert!(!back.is_significant());
        assert!(back.p_value().is_nan());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_string(&GateOutcome::NotSignificant { p_value: 0.25 })
            .expect("serialize");
        assert_eq!(json, r#"{"outcome":"not_significant","p_value":0.25}"#);
    }
}
