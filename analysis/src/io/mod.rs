//! Side-effecting I/O: the dataset CSV, TOML config and serialized fits.

pub mod config;
pub mod dataset;
pub mod model_store;
