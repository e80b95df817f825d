//! Panel rendering.
//!
//! [`FigureRenderer`] is the seam between the figure pipeline and the drawing
//! backend. [`PlottersRenderer`] writes PNG files through `plotters`.

use std::error::Error;
use std::path::Path;

use anyhow::{Result, anyhow};
use ndarray::ArrayView2;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::colormap::{Colormap, parse_color};
use crate::config::{GeneralConfig, PanelGroup, TransferConfig, convert_size};

const FONT: &str = "sans-serif";
const POINTS_PER_INCH: f64 = 72.0;
const COLORBAR_STEPS: usize = 128;

/// One heatmap panel: a session grid with its row styling.
#[derive(Debug, Clone, Copy)]
pub struct HeatmapPanel<'a> {
    pub title: &'a str,
    /// Rows run along y (row 0 at the lower bound), columns along x.
    pub values: ArrayView2<'a, f64>,
    pub group: &'a PanelGroup,
}

/// Transfer-session model comparison plotted against training session.
#[derive(Debug, Clone, Copy)]
pub struct DeltaAicPanel<'a> {
    pub sessions: &'a [f64],
    pub delta_aic: &'a [f64],
    pub transfer: &'a TransferConfig,
}

pub trait FigureRenderer {
    fn heatmap(&self, panel: &HeatmapPanel<'_>, path: &Path) -> Result<()>;
    fn delta_aic(&self, panel: &DeltaAicPanel<'_>, path: &Path) -> Result<()>;
}

/// Axis-aligned cell of a heatmap in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub value: f64,
}

/// Split the panel extent evenly over the grid.
pub fn heatmap_cells(values: ArrayView2<'_, f64>, x: [f64; 2], y: [f64; 2]) -> Vec<Cell> {
    let (rows, cols) = values.dim();
    let dx = (x[1] - x[0]) / cols as f64;
    let dy = (y[1] - y[0]) / rows as f64;
    values
        .indexed_iter()
        .map(|((row, col), &value)| Cell {
            x: (x[0] + col as f64 * dx, x[0] + (col + 1) as f64 * dx),
            y: (y[0] + row as f64 * dy, y[0] + (row + 1) as f64 * dy),
            value,
        })
        .collect()
}

/// Configured ticks, or five evenly spaced ones across `range`.
pub fn tick_points(ticks: &[f64], range: [f64; 2]) -> Vec<f64> {
    if !ticks.is_empty() {
        return ticks.to_vec();
    }
    (0..5)
        .map(|i| range[0] + (range[1] - range[0]) * i as f64 / 4.0)
        .collect()
}

/// Padded `[lo, hi]` covering every finite value in `values`.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return [-1.0, 1.0];
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    [lo - pad, hi + pad]
}

/// PNG renderer sized from `[general]`.
#[derive(Debug, Clone)]
pub struct PlottersRenderer {
    size: (u32, u32),
    dpi: u32,
    colormap: Colormap,
    fontsizes: Vec<f64>,
}

impl PlottersRenderer {
    pub fn new(general: &GeneralConfig) -> Result<Self> {
        let [width_cm, height_cm] = general.figure_size;
        Ok(Self {
            size: convert_size(width_cm, height_cm, general.dpi),
            dpi: general.dpi,
            colormap: Colormap::from_name(&general.colormap)?,
            fontsizes: general.fontsizes.clone(),
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Font size `index` in pixels; missing entries reuse the last one.
    fn font_px(&self, index: usize) -> f64 {
        let points = self
            .fontsizes
            .get(index)
            .or_else(|| self.fontsizes.last())
            .copied()
            .unwrap_or(10.0);
        points * f64::from(self.dpi) / POINTS_PER_INCH
    }

    fn draw_heatmap(&self, panel: &HeatmapPanel<'_>, path: &Path) -> Result<(), Box<dyn Error>> {
        let group = panel.group;
        let bounds = &group.bounds;
        let [c_lo, c_hi] = bounds.color;
        let title_px = self.font_px(0);
        let label_px = self.font_px(1);
        let tick_px = self.font_px(2);
        let margin = (tick_px * 0.5).round() as u32;

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let bar_width = (self.size.0 / 5).max(1);
        let (main, bar) = root.split_horizontally(self.size.0.saturating_sub(bar_width));

        let mut chart = ChartBuilder::on(&main)
            .caption(panel.title, (FONT, title_px))
            .margin(margin)
            .x_label_area_size((label_px + tick_px * 2.0).round() as u32)
            .y_label_area_size((label_px + tick_px * 3.0).round() as u32)
            .build_cartesian_2d(bounds.x[0]..bounds.x[1], bounds.y[0]..bounds.y[1])?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(0)
            .y_labels(0)
            .x_desc(group.x_label())
            .y_desc(group.y_label())
            .axis_desc_style((FONT, label_px))
            .draw()?;
        chart.draw_series(
            heatmap_cells(panel.values, bounds.x, bounds.y)
                .into_iter()
                .map(|cell| {
                    Rectangle::new(
                        [(cell.x.0, cell.y.0), (cell.x.1, cell.y.1)],
                        self.colormap.map(cell.value, c_lo, c_hi).filled(),
                    )
                }),
        )?;
        let x_ticks: Vec<(f64, (i32, i32))> = tick_points(&group.ticks.x, bounds.x)
            .into_iter()
            .map(|x| (x, chart.backend_coord(&(x, bounds.y[0]))))
            .collect();
        let y_ticks: Vec<(f64, (i32, i32))> = tick_points(&group.ticks.y, bounds.y)
            .into_iter()
            .map(|y| (y, chart.backend_coord(&(bounds.x[0], y))))
            .collect();
        draw_ticks(&root, &x_ticks, TickSide::Below, tick_px)?;
        draw_ticks(&root, &y_ticks, TickSide::Left, tick_px)?;

        let mut colorbar = ChartBuilder::on(&bar)
            .margin(margin)
            .margin_top((title_px * 1.5).round() as u32 + margin)
            .x_label_area_size((label_px + tick_px * 2.0).round() as u32)
            .right_y_label_area_size((label_px + tick_px * 2.5).round() as u32)
            .build_cartesian_2d(0f64..1f64, c_lo..c_hi)?;
        colorbar
            .configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(0)
            .y_desc(group.colorbar_label())
            .axis_desc_style((FONT, self.font_px(3)))
            .draw()?;
        let step = (c_hi - c_lo) / COLORBAR_STEPS as f64;
        colorbar.draw_series((0..COLORBAR_STEPS).map(|i| {
            let lo = c_lo + i as f64 * step;
            Rectangle::new(
                [(0.0, lo), (1.0, lo + step)],
                self.colormap.map(lo + step * 0.5, c_lo, c_hi).filled(),
            )
        }))?;
        let bar_ticks: Vec<(f64, (i32, i32))> = tick_points(&group.ticks.colorbar, bounds.color)
            .into_iter()
            .map(|v| (v, colorbar.backend_coord(&(1.0, v))))
            .collect();
        draw_ticks(&root, &bar_ticks, TickSide::Right, tick_px)?;

        root.present()?;
        Ok(())
    }

    fn draw_delta_aic(&self, panel: &DeltaAicPanel<'_>, path: &Path) -> Result<(), Box<dyn Error>> {
        let transfer = panel.transfer;
        let fill = &transfer.fill;
        let line_color = parse_color(&transfer.line_color)?;
        let text_color = parse_color(&transfer.text_color)?;
        let title_px = self.font_px(0);
        let label_px = self.font_px(1);
        let tick_px = self.font_px(2);
        let margin = (tick_px * 0.5).round() as u32;

        let x_range = padded_range(
            panel
                .sessions
                .iter()
                .copied()
                .chain(fill.bounds_x)
                .chain([fill.label_x]),
        );
        let y_range = padded_range(
            panel
                .delta_aic
                .iter()
                .copied()
                .chain(fill.bounds_y.iter().flatten().copied())
                .chain(fill.label_y.iter().copied()),
        );

        let root = BitMapBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(&transfer.labels[0], (FONT, title_px))
            .margin(margin)
            .x_label_area_size((label_px + tick_px * 2.0).round() as u32)
            .y_label_area_size((label_px + tick_px * 3.0).round() as u32)
            .build_cartesian_2d(x_range[0]..x_range[1], y_range[0]..y_range[1])?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(0)
            .x_desc(transfer.labels[1].as_str())
            .y_desc(transfer.labels[2].as_str())
            .axis_desc_style((FONT, label_px))
            .label_style((FONT, tick_px))
            .draw()?;

        for (i, color) in fill.colors.iter().enumerate() {
            let band = fill.bounds_y[i];
            let color = parse_color(color)?;
            chart.draw_series(std::iter::once(Rectangle::new(
                [(fill.bounds_x[0], band[0]), (fill.bounds_x[1], band[1])],
                color.mix(fill.alpha).filled(),
            )))?;
            chart.draw_series(std::iter::once(Text::new(
                fill.labels[i].clone(),
                (fill.label_x, fill.label_y[i]),
                (FONT, label_px).into_font().color(&text_color),
            )))?;
        }

        let points: Vec<(f64, f64)> = panel
            .sessions
            .iter()
            .copied()
            .zip(panel.delta_aic.iter().copied())
            .collect();
        chart.draw_series(LineSeries::new(
            points.iter().copied(),
            line_color.stroke_width(2),
        ))?;
        let radius = (tick_px * 0.4).round().max(2.0) as i32;
        chart.draw_series(
            points
                .iter()
                .map(|&point| Circle::new(point, radius, line_color.filled())),
        )?;
        let x_ticks: Vec<(f64, (i32, i32))> = panel
            .sessions
            .iter()
            .map(|&x| (x, chart.backend_coord(&(x, y_range[0]))))
            .collect();
        draw_ticks(&root, &x_ticks, TickSide::Below, tick_px)?;

        root.present()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum TickSide {
    Below,
    Left,
    Right,
}

/// Tick marks and labels at backend pixel positions on the root area.
fn draw_ticks(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    ticks: &[(f64, (i32, i32))],
    side: TickSide,
    font_px: f64,
) -> Result<(), Box<dyn Error>> {
    let len = (font_px * 0.3).round().max(2.0) as i32;
    let gap = len + 2;
    let (anchor, mark, offset) = match side {
        TickSide::Below => (Pos::new(HPos::Center, VPos::Top), (0, len), (0, gap)),
        TickSide::Left => (Pos::new(HPos::Right, VPos::Center), (-len, 0), (-gap, 0)),
        TickSide::Right => (Pos::new(HPos::Left, VPos::Center), (len, 0), (gap, 0)),
    };
    let style = (FONT, font_px).into_font().color(&BLACK).pos(anchor);
    for &(value, (x, y)) in ticks {
        root.draw(&PathElement::new(
            vec![(x, y), (x + mark.0, y + mark.1)],
            BLACK.stroke_width(1),
        ))?;
        root.draw(&Text::new(
            format!("{value}"),
            (x + offset.0, y + offset.1),
            style.clone(),
        ))?;
    }
    Ok(())
}

impl FigureRenderer for PlottersRenderer {
    fn heatmap(&self, panel: &HeatmapPanel<'_>, path: &Path) -> Result<()> {
        self.draw_heatmap(panel, path)
            .map_err(|err| anyhow!("render {}: {err}", path.display()))
    }

    fn delta_aic(&self, panel: &DeltaAicPanel<'_>, path: &Path) -> Result<()> {
        self.draw_delta_aic(panel, path)
            .map_err(|err| anyhow!("render {}: {err}", path.display()))
    }
}
