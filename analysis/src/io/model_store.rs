//! Persistence of fitted models under the results directory.
//!
//! Each fit is written as pretty JSON. Floats round-trip exactly, so a
//! reloaded model reproduces its estimates and Wald tests bit for bit.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::results::GeeResults;

pub const FIRST_SESSION_MODEL: &str = "gee_first";
pub const FULL_MODEL: &str = "gee_full";
pub const GATE_MANIFEST: &str = "gee_gates.json";

/// Writes fitted models into one results directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the model saved under `name`.
    pub fn model_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Session-indexed model path, e.g. `gee_grid_coarseness_3.json`.
    pub fn session_model_path(&self, stem: &str, session: u32) -> PathBuf {
        self.model_path(&session_model_name(stem, session))
    }

    /// Persist `results` under `name`, creating the directory if needed.
    pub fn save(&self, name: &str, results: &GeeResults) -> Result<PathBuf> {
        write_model(self.model_path(name), results)
    }

    /// Persist one per-session follow-up fit.
    pub fn save_session(&self, stem: &str, session: u32, results: &GeeResults) -> Result<PathBuf> {
        write_model(self.session_model_path(stem, session), results)
    }

    pub fn load(&self, name: &str) -> Result<GeeResults> {
        load_model(&self.model_path(name))
    }
}

fn session_model_name(stem: &str, session: u32) -> String {
    format!("{stem}_{session}")
}

fn write_model(path: PathBuf, results: &GeeResults) -> Result<PathBuf> {
    write_json_atomic(&path, results)?;
    debug!(path = %path.display(), "model saved");
    Ok(path)
}

/// Load a model written by [`ModelStore::save`].
pub fn load_model(path: &Path) -> Result<GeeResults> {
    read_json(path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Atomically write pretty JSON with trailing newline (temp file + rename).
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("results path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
