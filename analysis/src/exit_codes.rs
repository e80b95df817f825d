//! Stable exit codes for the analysis and figure binaries.

/// Pipeline completed; every requested artifact was written.
pub const OK: i32 = 0;
/// Missing input, invalid config, fit failure or any other error.
pub const ERROR: i32 = 1;
