//! Deterministic, pure statistical logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! datasets and return deterministic outputs suitable for tests.

pub mod cov_struct;
pub mod design;
pub mod family;
pub mod formula;
pub mod gate;
pub mod gee;
pub mod linalg;
pub mod model;
pub mod results;
pub mod types;
