//! Session-wise GEE analysis of behavioural accuracy.
//!
//! Reads `data/Experiment.csv`, fits the baseline and full interaction models,
//! and refits per-session models for each significant session interaction.
//! Every fit is written under `results/statistics/`.

use std::io;
use std::path::PathBuf;

use analysis::core::model::GeeFitter;
use analysis::exit_codes;
use analysis::io::config::{DEFAULT_CONFIG_PATH, load_config};
use analysis::io::dataset::{DatasetError, load_data};
use analysis::io::model_store::ModelStore;
use analysis::logging;
use analysis::pipeline::run_analysis;
use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "gee-accuracy",
    version,
    about = "Fit session-wise GEE models of behavioural accuracy"
)]
struct Cli {
    /// Analysis config (TOML). Defaults apply when the file is absent.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Override the dataset path.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Override the results directory.
    #[arg(long)]
    results_dir: Option<PathBuf>,
    /// Override the significance cutoff.
    #[arg(long)]
    cutoff: Option<f64>,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        match err.downcast_ref::<DatasetError>() {
            Some(not_found @ DatasetError::NotFound { .. }) => eprintln!("{not_found}"),
            _ => eprintln!("{:#}", err),
        }
        std::process::exit(exit_codes::ERROR);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config(&cli.config)?;
    if let Some(data) = cli.data {
        cfg.data_path = data;
    }
    if let Some(results_dir) = cli.results_dir {
        cfg.results_dir = results_dir;
    }
    if let Some(cutoff) = cli.cutoff {
        cfg.cutoff = cutoff;
    }
    cfg.validate()
        .map_err(|err| anyhow!("invalid command-line override: {err}"))?;

    let data = load_data(&cfg.data_path)?;
    let store = ModelStore::new(&cfg.results_dir);
    let fitter = GeeFitter::new(cfg.fit);
    let report = run_analysis(&data, &fitter, &store, &cfg, &mut io::stdout().lock())?;

    for gate in &report.gates {
        println!(
            "{}: p = {:.4} ({})",
            gate.term,
            gate.outcome.p_value(),
            if gate.outcome.is_significant() {
                "significant"
            } else {
                "not significant"
            }
        );
    }
    for path in report.model_files() {
        println!("wrote {}", path.display());
    }
    Ok(())
}
