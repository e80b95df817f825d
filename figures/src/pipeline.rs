//! Orchestration for `figure-three`: load each panel's array and render it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ndarray::Axis;
use tracing::{debug, instrument};

use crate::arrays::{load_grid, load_npz_vector, load_session_means};
use crate::config::FigureConfig;
use crate::render::{DeltaAicPanel, FigureRenderer, HeatmapPanel};

pub const DEFAULT_OUT_DIR: &str = "results/figures/figure_three";
pub const DELTA_AIC: &str = "delta_AIC";

/// Input locations relative to the repository root.
#[derive(Debug, Clone)]
pub struct FigureInputs {
    root: PathBuf,
}

impl FigureInputs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session: u32) -> PathBuf {
        self.root
            .join("results/empirical")
            .join(format!("session_{session}"))
    }

    pub fn average_bat(&self, session: u32) -> PathBuf {
        self.session_dir(session).join("average_bat.npy")
    }

    pub fn continuous_bat(&self, session: u32) -> PathBuf {
        self.session_dir(session).join("continuous_bat.npy")
    }

    pub fn simulated_tongues(&self) -> PathBuf {
        self.root.join("results/simulation/highres_arnold_tongues.npy")
    }

    pub fn transfer_comparison(&self) -> PathBuf {
        self.root
            .join("results/empirical/transfer_model_comparison.npz")
    }
}

/// Panel files written, in render order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FigureReport {
    pub panels: Vec<PathBuf>,
}

/// Render every panel of figure three into `out_dir`.
#[instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn render_figure_three<R: FigureRenderer>(
    inputs: &FigureInputs,
    out_dir: &Path,
    cfg: &FigureConfig,
    renderer: &R,
) -> Result<FigureReport> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let mut report = FigureReport::default();

    for session in 1..=cfg.data.num_sessions {
        let grid = load_grid(&inputs.average_bat(session))?;
        let title = format!("Session {session}");
        let path = out_dir.join(format!("top_row_{session}.png"));
        let panel = HeatmapPanel {
            title: &title,
            values: grid.view(),
            group: &cfg.data,
        };
        renderer.heatmap(&panel, &path)?;
        report.panels.push(path);
    }

    for session in 1..=cfg.data.num_sessions {
        let grid = load_grid(&inputs.continuous_bat(session))?;
        let title = format!("Session {session}");
        let path = out_dir.join(format!("middle_row_{session}.png"));
        let panel = HeatmapPanel {
            title: &title,
            values: grid.view(),
            group: &cfg.data,
        };
        renderer.heatmap(&panel, &path)?;
        report.panels.push(path);
    }

    let simulated_path = inputs.simulated_tongues();
    let simulated = load_session_means(&simulated_path)?;
    let available = simulated.len_of(Axis(0));
    if available < cfg.model.num_sessions as usize {
        return Err(anyhow!(
            "{} holds {available} sessions, model.num_sessions is {}",
            simulated_path.display(),
            cfg.model.num_sessions
        ));
    }
    for session in 1..=cfg.model.num_sessions {
        let title = format!("Session {session}");
        let path = out_dir.join(format!("bottom_row_{session}.png"));
        let panel = HeatmapPanel {
            title: &title,
            values: simulated.index_axis(Axis(0), session as usize - 1),
            group: &cfg.model,
        };
        renderer.heatmap(&panel, &path)?;
        report.panels.push(path);
    }

    let comparison_path = inputs.transfer_comparison();
    let delta_aic = load_npz_vector(&comparison_path, DELTA_AIC)?;
    let sessions: Vec<f64> = (1..cfg.data.num_sessions).map(f64::from).collect();
    if delta_aic.len() != sessions.len() {
        return Err(anyhow!(
            "{DELTA_AIC} in {} has {} values, expected {} (sessions 1..{})",
            comparison_path.display(),
            delta_aic.len(),
            sessions.len(),
            cfg.data.num_sessions
        ));
    }
    let delta_aic = delta_aic.to_vec();
    let path = out_dir.join("bottom_row_transfer.png");
    renderer.delta_aic(
        &DeltaAicPanel {
            sessions: &sessions,
            delta_aic: &delta_aic,
            transfer: &cfg.transfer,
        },
        &path,
    )?;
    report.panels.push(path);

    debug!(panels = report.panels.len(), "figure three rendered");
    Ok(report)
}
