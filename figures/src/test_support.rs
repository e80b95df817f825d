//! Test-only helpers: configs, synthetic input arrays and a recording renderer.

use std::cell::RefCell;
use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, Array4};
use ndarray_npy::{NpzWriter, write_npy};

use crate::config::{
    Bounds, FigureConfig, FillConfig, GeneralConfig, PanelGroup, Ticks, TransferConfig,
};
use crate::pipeline::{DELTA_AIC, FigureInputs};
use crate::render::{DeltaAicPanel, FigureRenderer, HeatmapPanel};

fn panel_group(num_sessions: u32, colorbar: &str) -> PanelGroup {
    PanelGroup {
        num_sessions,
        labels: vec![
            "Contrast heterogeneity".to_string(),
            "Grid coarseness".to_string(),
            colorbar.to_string(),
        ],
        ticks: Ticks::default(),
        bounds: Bounds {
            x: [0.0, 1.0],
            y: [0.0, 1.0],
            color: [0.0, 1.0],
        },
    }
}

/// Valid config with `data_sessions` empirical and `model_sessions` simulated panels.
pub fn sample_config(data_sessions: u32, model_sessions: u32) -> FigureConfig {
    FigureConfig {
        general: GeneralConfig {
            figure_size: [4.0, 4.0],
            dpi: 72,
            colormap: "viridis".to_string(),
            fontsizes: vec![8.0, 7.0, 6.0, 6.0],
        },
        data: panel_group(data_sessions, "Accuracy"),
        model: panel_group(model_sessions, "Synchronization"),
        transfer: TransferConfig {
            labels: vec![
                "Transfer".to_string(),
                "Session".to_string(),
                "dAIC".to_string(),
            ],
            line_color: "black".to_string(),
            text_color: "#333333".to_string(),
            fill: FillConfig {
                colors: vec!["#dddddd".to_string()],
                alpha: 0.5,
                bounds_x: [0.5, 8.5],
                bounds_y: vec![[0.0, 4.0]],
                labels: vec!["transfer".to_string()],
                label_x: 1.0,
                label_y: vec![3.0],
            },
        },
    }
}

/// Write every array `cfg` asks for under `root`.
///
/// Grids are 2 x 3, the simulated stack holds `model.num_sessions` sessions of
/// two repeats, and `delta_AIC` has `data.num_sessions - 1` values.
pub fn write_inputs(root: &Path, cfg: &FigureConfig) -> Result<()> {
    let inputs = FigureInputs::new(root);
    for session in 1..=cfg.data.num_sessions {
        let grid = Array2::from_shape_fn((2, 3), |(y, x)| {
            f64::from(session) * 0.1 + (y * 3 + x) as f64 * 0.01
        });
        for path in [inputs.average_bat(session), inputs.continuous_bat(session)] {
            write_array(&path, &grid)?;
        }
    }

    let stack = Array4::from_shape_fn(
        (cfg.model.num_sessions as usize, 2, 2, 3),
        |(s, r, y, x)| (s + r + y + x) as f64 / 10.0,
    );
    write_array(&inputs.simulated_tongues(), &stack)?;

    let delta_aic = Array1::from_iter(
        (0..cfg.data.num_sessions.saturating_sub(1)).map(|i| f64::from(i) * 3.0 - 1.0),
    );
    let path = inputs.transfer_comparison();
    create_parent(&path)?;
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut npz = NpzWriter::new(file);
    npz.add_array(DELTA_AIC, &delta_aic)
        .with_context(|| format!("write {}", path.display()))?;
    npz.finish()
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn write_array<A: ndarray_npy::WriteNpyExt>(path: &Path, array: &A) -> Result<()> {
    create_parent(path)?;
    write_npy(path, array).with_context(|| format!("write {}", path.display()))
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    Ok(())
}

/// What a renderer was asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedPanel {
    Heatmap {
        title: String,
        shape: (usize, usize),
        x_label: String,
    },
    DeltaAic {
        sessions: Vec<f64>,
        delta_aic: Vec<f64>,
    },
}

/// Renderer that records each panel and writes an empty file in its place.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    calls: RefCell<Vec<RecordedPanel>>,
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<RecordedPanel> {
        self.calls.borrow().clone()
    }
}

impl FigureRenderer for RecordingRenderer {
    fn heatmap(&self, panel: &HeatmapPanel<'_>, path: &Path) -> Result<()> {
        self.calls.borrow_mut().push(RecordedPanel::Heatmap {
            title: panel.title.to_string(),
            shape: panel.values.dim(),
            x_label: panel.group.x_label().to_string(),
        });
        fs::write(path, b"").with_context(|| format!("write {}", path.display()))
    }

    fn delta_aic(&self, panel: &DeltaAicPanel<'_>, path: &Path) -> Result<()> {
        self.calls.borrow_mut().push(RecordedPanel::DeltaAic {
            sessions: panel.sessions.to_vec(),
            delta_aic: panel.delta_aic.to_vec(),
        });
        fs::write(path, b"").with_context(|| format!("write {}", path.display()))
    }
}
