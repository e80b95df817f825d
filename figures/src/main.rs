//! Renders every panel of figure three to `results/figures/figure_three/`.

use std::path::PathBuf;

use analysis::{exit_codes, logging};
use anyhow::Result;
use clap::Parser;
use figures::config::{DEFAULT_CONFIG_PATH, load_figure_config};
use figures::pipeline::{DEFAULT_OUT_DIR, FigureInputs, render_figure_three};
use figures::render::PlottersRenderer;

#[derive(Parser)]
#[command(
    name = "figure-three",
    version,
    about = "Render the Arnold-tongue panels of figure three"
)]
struct Cli {
    /// Figure config (TOML).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Directory the `results/` inputs are read from.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Output directory; defaults to `results/figures/figure_three` under the root.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::ERROR);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_figure_config(&cli.config)?;
    let out_dir = cli
        .out_dir
        .unwrap_or_else(|| cli.root.join(DEFAULT_OUT_DIR));
    let renderer = PlottersRenderer::new(&cfg.general)?;
    let report = render_figure_three(&FigureInputs::new(&cli.root), &out_dir, &cfg, &renderer)?;
    for path in &report.panels {
        println!("wrote {}", path.display());
    }
    Ok(())
}
