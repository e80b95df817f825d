//! Figure three of the paper: Arnold-tongue heatmaps per session and the
//! transfer-session model comparison.
//!
//! - [`config`]: TOML figure configuration.
//! - [`arrays`]: NumPy inputs.
//! - [`render`]: the renderer seam and its `plotters` backend.
//! - [`pipeline`]: which panel reads which array and where it is written.

pub mod arrays;
pub mod colormap;
pub mod config;
pub mod pipeline;
pub mod render;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
