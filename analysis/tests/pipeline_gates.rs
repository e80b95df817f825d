//! Gate behaviour of the analysis pipeline, driven by a scripted fitter.

use analysis::core::types::Dataset;
use analysis::io::config::AnalysisConfig;
use analysis::io::model_store::ModelStore;
use analysis::pipeline::{AnalysisReport, BASELINE_FORMULA, FULL_FORMULA, run_analysis};
use analysis::test_support::{ScriptedFitter, alternating_dataset, results_with_p_values};

const CH_TERM: &str = "SessionID:ContrastHeterogeneity";
const GC_TERM: &str = "SessionID:GridCoarseness";

fn fitter(ch_p: f64, gc_p: f64) -> ScriptedFitter {
    ScriptedFitter::new(vec![
        results_with_p_values(BASELINE_FORMULA, &[]).expect("baseline"),
        results_with_p_values(FULL_FORMULA, &[(CH_TERM, ch_p), (GC_TERM, gc_p)]).expect("full"),
        results_with_p_values("Correct ~ ContrastHeterogeneity", &[]).expect("ch"),
        results_with_p_values("Correct ~ GridCoarseness", &[]).expect("gc"),
    ])
}

fn run(data: &Dataset, fitter: &ScriptedFitter, cutoff: f64) -> (tempfile::TempDir, AnalysisReport) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(temp.path().join("results/statistics"));
    let cfg = AnalysisConfig {
        cutoff,
        ..AnalysisConfig::default()
    };
    let report = run_analysis(data, fitter, &store, &cfg, &mut Vec::new()).expect("run");
    (temp, report)
}

fn session_files(temp: &tempfile::TempDir, stem: &str) -> Vec<u32> {
    (1..=9)
        .filter(|s| {
            temp.path()
                .join(format!("results/statistics/{stem}_{s}.json"))
                .exists()
        })
        .collect()
}

#[test]
fn significant_interaction_refits_every_training_session() {
    let (temp, report) = run(&alternating_dataset(2, 9, 2), &fitter(0.03, 0.5), 0.05);

    assert_eq!(
        session_files(&temp, "gee_contrast_heterogeneity"),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );
    let gate = report.gate(CH_TERM).expect("gate");
    assert!(gate.outcome.is_significant());
    assert!((gate.outcome.p_value() - 0.03).abs() < 1e-9);
}

#[test]
fn prescribed_p_values_survive_the_wald_test() {
    for p in [0.001, 0.03, 0.05, 0.1, 0.5] {
        let full = results_with_p_values(FULL_FORMULA, &[(CH_TERM, p)]).expect("full");
        let wald = full.wald_p_value(CH_TERM).expect("wald");
        assert!((wald - p).abs() < 1e-10, "prescribed {p}, got {wald}");
    }
}

#[test]
fn p_value_equal_to_cutoff_writes_no_session_files() {
    let full = results_with_p_values(FULL_FORMULA, &[(CH_TERM, 0.05)]).expect("full");
    let cutoff = full.wald_p_value(CH_TERM).expect("wald");
    let (temp, report) = run(&alternating_dataset(2, 9, 2), &fitter(0.05, 0.5), cutoff);

    let gate = report.gate(CH_TERM).expect("gate");
    assert_eq!(gate.outcome.p_value(), cutoff);
    assert!(!gate.outcome.is_significant());
    assert!(gate.files.is_empty());
    assert!(session_files(&temp, "gee_contrast_heterogeneity").is_empty());
}

#[test]
fn non_significant_interaction_writes_nothing() {
    let (temp, report) = run(&alternating_dataset(2, 9, 2), &fitter(0.10, 0.5), 0.05);

    assert!(session_files(&temp, "gee_contrast_heterogeneity").is_empty());
    assert!(session_files(&temp, "gee_grid_coarseness").is_empty());
    assert!(!report.gate(CH_TERM).expect("gate").outcome.is_significant());
    assert_eq!(report.model_files().len(), 2);
}

#[test]
fn gates_are_independent() {
    let data = alternating_dataset(2, 9, 2);

    let (temp, _) = run(&data, &fitter(0.5, 0.01), 0.05);
    assert!(session_files(&temp, "gee_contrast_heterogeneity").is_empty());
    assert_eq!(session_files(&temp, "gee_grid_coarseness").len(), 8);

    let (temp, report) = run(&data, &fitter(0.01, 0.02), 0.05);
    assert_eq!(session_files(&temp, "gee_contrast_heterogeneity").len(), 8);
    assert_eq!(session_files(&temp, "gee_grid_coarseness").len(), 8);
    assert_eq!(report.model_files().len(), 18);
}

#[test]
fn raising_the_cutoff_only_adds_follow_ups() {
    let data = alternating_dataset(2, 9, 2);
    let (_, strict) = run(&data, &fitter(0.03, 0.07), 0.01);
    let (_, loose) = run(&data, &fitter(0.03, 0.07), 0.10);

    for term in [CH_TERM, GC_TERM] {
        let before = strict.gate(term).expect("gate").outcome.is_significant();
        let after = loose.gate(term).expect("gate").outcome.is_significant();
        assert!(!before || after, "{term}");
    }
    assert!(loose.model_files().len() >= strict.model_files().len());
}

#[test]
fn baseline_uses_first_session_and_transfer_is_excluded() {
    let fitter = fitter(0.03, 0.03);
    run(&alternating_dataset(2, 9, 2), &fitter, 0.05);

    let calls = fitter.calls();
    assert_eq!(calls[0].formula, BASELINE_FORMULA);
    assert_eq!(calls[0].rows, 4);
    assert_eq!(calls[0].sessions, vec![1]);

    assert_eq!(calls[1].rows, 32);
    assert_eq!(calls[1].sessions, (1..=8).collect::<Vec<_>>());
    assert!(calls.iter().all(|call| !call.sessions.contains(&9)));

    let follow_ups = &calls[2..];
    assert_eq!(follow_ups.len(), 16);
    for (offset, call) in follow_ups.iter().enumerate() {
        assert_eq!(call.sessions, vec![offset as u32 % 8 + 1]);
        assert_eq!(call.rows, 4);
    }
}
