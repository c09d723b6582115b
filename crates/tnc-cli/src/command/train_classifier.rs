use std::path::PathBuf;

use anyhow::Context as _;
use tnc_series::Cohort;
use tnc_training::{RunContext, classifier};

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct TrainClassifierArg {
    /// Run configuration (JSON)
    #[arg(long)]
    config: PathBuf,
    /// Labelled training cohort (JSON)
    #[arg(long)]
    data: PathBuf,
    /// Labelled test cohort (JSON)
    #[arg(long)]
    test_data: PathBuf,
    /// Run identifier; defaults to the current UTC time
    #[arg(long)]
    id: Option<String>,
}

pub(crate) fn run(arg: &TrainClassifierArg) -> anyhow::Result<()> {
    let TrainClassifierArg {
        config,
        data,
        test_data,
        id,
    } = arg;
    let config = util::read_json_file("run config", config)?;
    let cohort: Cohort = util::read_json_file("cohort", data)?;
    let test: Cohort = util::read_json_file("test cohort", test_data)?;

    let run = RunContext::new(config, id.clone()).context("Invalid neighborhood policy")?;
    let device = tnc_training::select_device();
    let summary = classifier::run_classification(&cohort, &test, &run, &device)
        .with_context(|| format!("Failed to train classifiers for {}", run.unique_name()))?;

    eprintln!("Classifier training completed");
    eprintln!("  Run: {} ({})", run.unique_name(), run.unique_id());
    eprintln!("  Classifiers trained: {}", summary.scores.len());
    let rows = [
        ("Validation AUC", summary.validation_auroc),
        ("Validation AUPRC", summary.validation_auprc),
        ("Test AUC", summary.test_auroc),
        ("Test AUPRC", summary.test_auprc),
    ];
    for (name, value) in rows {
        match value {
            Some(value) => eprintln!("  {name}: {value:.4}"),
            None => eprintln!("  {name}: n/a"),
        }
    }
    Ok(())
}
