//! Orchestration for one `gee-accuracy` run.
//!
//! Baseline fit on the first session, full interaction fit on every training
//! session, then one significance gate per session interaction. A significant
//! gate refits the matching single-predictor model on each training session.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::gate::{GateOutcome, evaluate_gate, follow_up_sessions};
use crate::core::model::{ModelFitter, ModelSpec};
use crate::core::results::GeeResults;
use crate::core::types::{Dataset, SUBJECT_ID};
use crate::io::config::AnalysisConfig;
use crate::io::model_store::{
    FIRST_SESSION_MODEL, FULL_MODEL, GATE_MANIFEST, ModelStore, write_json_atomic,
};

pub const BASELINE_FORMULA: &str =
    "Correct ~ ContrastHeterogeneity + GridCoarseness + ContrastHeterogeneity*GridCoarseness";

pub const FULL_FORMULA: &str = "Correct ~ ContrastHeterogeneity + GridCoarseness + SessionID \
     + SessionID*ContrastHeterogeneity + SessionID*GridCoarseness \
     + ContrastHeterogeneity*GridCoarseness";

/// Session interaction tested on the full model, with its follow-up model.
#[derive(Debug, Clone, Copy)]
pub struct InteractionGate {
    pub term: &'static str,
    pub reduced_formula: &'static str,
    pub model_stem: &'static str,
}

pub const GATES: [InteractionGate; 2] = [
    InteractionGate {
        term: "SessionID:ContrastHeterogeneity",
        reduced_formula: "Correct ~ ContrastHeterogeneity",
        model_stem: "gee_contrast_heterogeneity",
    },
    InteractionGate {
        term: "SessionID:GridCoarseness",
        reduced_formula: "Correct ~ GridCoarseness",
        model_stem: "gee_grid_coarseness",
    },
];

/// One gate as recorded in the run manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    pub term: String,
    pub cutoff: f64,
    #[serde(flatten)]
    pub outcome: GateOutcome,
    /// Per-session models written for this gate, in session order.
    pub files: Vec<PathBuf>,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub baseline: PathBuf,
    pub full: PathBuf,
    pub gates: Vec<GateRecord>,
}

impl AnalysisReport {
    /// Model files in write order.
    pub fn model_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.baseline.clone(), self.full.clone()];
        for gate in &self.gates {
            files.extend(gate.files.iter().cloned());
        }
        files
    }

    pub fn gate(&self, term: &str) -> Option<&GateRecord> {
        self.gates.iter().find(|gate| gate.term == term)
    }
}

/// Run the full analysis over `data`.
///
/// Summaries of the baseline and full models are written to `out`. Any fit or
/// write failure aborts the run. The gate manifest is written last, so its
/// presence marks a completed run.
#[instrument(skip_all, fields(rows = data.len(), cutoff = cfg.cutoff))]
pub fn run_analysis<F: ModelFitter, W: Write>(
    data: &Dataset,
    fitter: &F,
    store: &ModelStore,
    cfg: &AnalysisConfig,
    out: &mut W,
) -> Result<AnalysisReport> {
    let training = data.excluding_session(cfg.transfer_session);
    debug!(
        dropped = data.len() - training.len(),
        transfer_session = cfg.transfer_session,
        "transfer session excluded"
    );

    let first_session = training.session(1);
    let baseline = fit_model(fitter, BASELINE_FORMULA, &first_session)?;
    print_summary(out, "Session 1 baseline", &baseline)?;
    let baseline_path = store.save(FIRST_SESSION_MODEL, &baseline)?;

    let full = fit_model(fitter, FULL_FORMULA, &training)?;
    print_summary(out, "Training sessions", &full)?;
    let full_path = store.save(FULL_MODEL, &full)?;

    let mut gates = Vec::with_capacity(GATES.len());
    for gate in GATES {
        let outcome = evaluate_gate(&full, gate.term, cfg.cutoff)
            .with_context(|| format!("test {}", gate.term))?;
        if outcome.p_value().is_nan() {
            warn!(term = gate.term, "robust variance is degenerate, gate not significant");
        }
        info!(
            term = gate.term,
            p_value = outcome.p_value(),
            significant = outcome.is_significant(),
            "interaction gate"
        );
        let mut files = Vec::new();
        for session in follow_up_sessions(&outcome, cfg.sessions) {
            let session_data = training.session(session);
            let results = fit_model(fitter, gate.reduced_formula, &session_data)
                .with_context(|| format!("session {session}"))?;
            files.push(store.save_session(gate.model_stem, session, &results)?);
        }
        gates.push(GateRecord {
            term: gate.term.to_string(),
            cutoff: cfg.cutoff,
            outcome,
            files,
        });
    }

    let report = AnalysisReport {
        baseline: baseline_path,
        full: full_path,
        gates,
    };
    write_json_atomic(&store.dir().join(GATE_MANIFEST), &report)?;
    Ok(report)
}

fn fit_model<F: ModelFitter>(fitter: &F, formula: &str, data: &Dataset) -> Result<GeeResults> {
    let spec = ModelSpec::binomial_exchangeable(formula, SUBJECT_ID)?;
    fitter.fit(&spec, data)
}

fn print_summary<W: Write>(out: &mut W, title: &str, results: &GeeResults) -> Result<()> {
    writeln!(out, "{title}").context("write summary")?;
    writeln!(out, "{results}").context("write summary")?;
    Ok(())
}
