//! Figure configuration stored in `config/plotting/figure_three.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::colormap::{Colormap, parse_color};

pub const DEFAULT_CONFIG_PATH: &str = "config/plotting/figure_three.toml";

const CM_PER_INCH: f64 = 2.54;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigureConfig {
    pub general: GeneralConfig,
    /// Empirical panels (top and middle rows).
    pub data: PanelGroup,
    /// Simulated panels (bottom row).
    pub model: PanelGroup,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// Width and height in centimetres.
    pub figure_size: [f64; 2],
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    pub colormap: String,
    /// Point sizes: title, axis labels, tick labels, then colorbar label.
    pub fontsizes: Vec<f64>,
}

fn default_dpi() -> u32 {
    300
}

/// Styling shared by one row of heatmap panels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelGroup {
    pub num_sessions: u32,
    /// x label, y label and an optional colorbar label.
    pub labels: Vec<String>,
    pub ticks: Ticks,
    pub bounds: Bounds,
}

impl PanelGroup {
    pub fn x_label(&self) -> &str {
        self.labels.first().map_or("", String::as_str)
    }

    pub fn y_label(&self) -> &str {
        self.labels.get(1).map_or("", String::as_str)
    }

    pub fn colorbar_label(&self) -> &str {
        self.labels.get(2).map_or("", String::as_str)
    }
}

/// Tick positions in data coordinates. Empty lists fall back to even spacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ticks {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub colorbar: Vec<f64>,
}

/// Axis extents and the value range spanned by the colormap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub color: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferConfig {
    /// Title, x label and y label.
    pub labels: Vec<String>,
    pub line_color: String,
    pub text_color: String,
    pub fill: FillConfig,
}

/// Shaded horizontal bands, one per colour, each with a text label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FillConfig {
    pub colors: Vec<String>,
    pub alpha: f64,
    pub bounds_x: [f64; 2],
    pub bounds_y: Vec<[f64; 2]>,
    pub labels: Vec<String>,
    pub label_x: f64,
    pub label_y: Vec<f64>,
}

impl FigureConfig {
    pub fn validate(&self) -> Result<()> {
        let general = &self.general;
        let [width, height] = general.figure_size;
        if !(is_positive(width) && is_positive(height)) {
            return Err(anyhow!("general.figure_size must be positive, got {width} x {height}"));
        }
        if general.dpi == 0 {
            return Err(anyhow!("general.dpi must be > 0"));
        }
        Colormap::from_name(&general.colormap).context("general.colormap")?;
        if general.fontsizes.len() < 3 {
            return Err(anyhow!(
                "general.fontsizes needs at least 3 entries, got {}",
                general.fontsizes.len()
            ));
        }
        if !general.fontsizes.iter().copied().all(is_positive) {
            return Err(anyhow!("general.fontsizes must be positive"));
        }
        validate_group("data", &self.data)?;
        validate_group("model", &self.model)?;
        validate_transfer(&self.transfer)
    }
}

fn validate_group(name: &str, group: &PanelGroup) -> Result<()> {
    if group.num_sessions == 0 {
        return Err(anyhow!("{name}.num_sessions must be > 0"));
    }
    if !(2..=3).contains(&group.labels.len()) {
        return Err(anyhow!(
            "{name}.labels needs 2 or 3 entries, got {}",
            group.labels.len()
        ));
    }
    let bounds = &group.bounds;
    for (axis, range) in [("x", bounds.x), ("y", bounds.y), ("color", bounds.color)] {
        if !is_increasing(range) {
            return Err(anyhow!("{name}.bounds.{axis} must be increasing, got {range:?}"));
        }
    }
    Ok(())
}

fn validate_transfer(transfer: &TransferConfig) -> Result<()> {
    if transfer.labels.len() != 3 {
        return Err(anyhow!(
            "transfer.labels needs 3 entries (title, x, y), got {}",
            transfer.labels.len()
        ));
    }
    parse_color(&transfer.line_color).context("transfer.line_color")?;
    parse_color(&transfer.text_color).context("transfer.text_color")?;
    let fill = &transfer.fill;
    let regions = fill.colors.len();
    if fill.bounds_y.len() != regions || fill.labels.len() != regions || fill.label_y.len() != regions
    {
        return Err(anyhow!(
            "transfer.fill colors, bounds_y, labels and label_y must have equal lengths"
        ));
    }
    for color in &fill.colors {
        parse_color(color).context("transfer.fill.colors")?;
    }
    if !(0.0..=1.0).contains(&fill.alpha) {
        return Err(anyhow!("transfer.fill.alpha must be in [0, 1], got {}", fill.alpha));
    }
    if !is_increasing(fill.bounds_x) || !fill.bounds_y.iter().copied().all(is_increasing) {
        return Err(anyhow!("transfer.fill bounds must be increasing"));
    }
    if !fill.label_x.is_finite() || !fill.label_y.iter().all(|y| y.is_finite()) {
        return Err(anyhow!("transfer.fill label positions must be finite"));
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_increasing([lo, hi]: [f64; 2]) -> bool {
    lo.is_finite() && hi.is_finite() && lo < hi
}

/// Pixel dimensions of a `width_cm` x `height_cm` figure at `dpi`.
pub fn convert_size(width_cm: f64, height_cm: f64, dpi: u32) -> (u32, u32) {
    let to_pixels = |cm: f64| (cm / CM_PER_INCH * f64::from(dpi)).round().max(1.0) as u32;
    (to_pixels(width_cm), to_pixels(height_cm))
}

/// Load and validate the figure config. The file is required.
pub fn load_figure_config(path: &Path) -> Result<FigureConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FigureConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
