//! Generalized-estimating-equation analysis of behavioural accuracy.
//!
//! The crate fits population-averaged logistic models of trial accuracy on
//! stimulus difficulty and training session, clustered by subject, then gates
//! per-session follow-up fits on the significance of the session interactions.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic statistics (formulas, estimation,
//!   inference, gates). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (CSV, config, model files).
//!
//! [`pipeline`] coordinates core logic with I/O to implement `gee-accuracy`.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
