//! Analysis configuration stored in `config/statistics/gee_accuracy.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::gate::DEFAULT_CUTOFF;
use crate::core::gee::FitOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config/statistics/gee_accuracy.toml";

/// Analysis configuration (TOML).
///
/// Missing fields default to the values the study was archived with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Behavioural dataset (CSV).
    pub data_path: PathBuf,

    /// Directory receiving the serialized fits and the gate manifest.
    pub results_dir: PathBuf,

    /// Interaction terms are significant iff their Wald p-value is below this.
    pub cutoff: f64,

    /// Held-out session excluded from every fit.
    pub transfer_session: u32,

    /// Training sessions `1..=sessions` refit when a gate is significant.
    pub sessions: u32,

    pub fit: FitOptions,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/Experiment.csv"),
            results_dir: PathBuf::from("results/statistics"),
            cutoff: DEFAULT_CUTOFF,
            transfer_session: 9,
            sessions: 8,
            fit: FitOptions::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cutoff.is_nan() || self.cutoff <= 0.0 || self.cutoff > 1.0 {
            return Err(anyhow!("cutoff must be in (0, 1], got {}", self.cutoff));
        }
        if self.sessions == 0 {
            return Err(anyhow!("sessions must be > 0"));
        }
        if self.fit.max_iter == 0 {
            return Err(anyhow!("fit.max_iter must be > 0"));
        }
        if self.fit.tolerance.is_nan() || self.fit.tolerance <= 0.0 {
            return Err(anyhow!("fit.tolerance must be > 0"));
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(anyhow!("data_path must be non-empty"));
        }
        if self.results_dir.as_os_str().is_empty() {
            return Err(anyhow!("results_dir must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AnalysisConfig::default()`.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no analysis config, using defaults");
        let cfg = AnalysisConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AnalysisConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
