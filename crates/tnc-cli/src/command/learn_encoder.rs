use std::path::PathBuf;

use anyhow::Context as _;
use tnc_series::Cohort;
use tnc_training::{RunContext, contrastive};

use crate::util;

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct LearnEncoderArg {
    /// Run configuration (JSON)
    #[arg(long)]
    config: PathBuf,
    /// Training cohort (JSON)
    #[arg(long)]
    data: PathBuf,
    /// Run identifier; defaults to the current UTC time
    #[arg(long)]
    id: Option<String>,
    /// Resume folds from their checkpoints
    #[arg(long)]
    cont: bool,
}

pub(crate) fn run(arg: &LearnEncoderArg) -> anyhow::Result<()> {
    let LearnEncoderArg {
        config,
        data,
        id,
        cont,
    } = arg;
    let mut config: tnc_training::RunConfig = util::read_json_file("run config", config)?;
    config.learn_encoder.cont |= *cont;
    let cohort: Cohort = util::read_json_file("cohort", data)?;

    let run = RunContext::new(config, id.clone()).context("Invalid neighborhood policy")?;
    let device = tnc_training::select_device();
    let report = contrastive::learn_encoder(&cohort, &run, &device)
        .with_context(|| format!("Failed to train encoder {}", run.unique_name()))?;

    eprintln!("Encoder training completed");
    eprintln!("  Run: {} ({})", run.unique_name(), run.unique_id());
    for fold in &report.folds {
        eprintln!(
            "  Fold {}: best epoch {}, accuracy {:.2}%, loss {:.4}",
            fold.fold,
            fold.best_epoch,
            fold.accuracy * 100.0,
            fold.loss
        );
    }
    if let (Some(accuracy), Some(loss)) = (report.accuracy, report.loss) {
        eprintln!("  Accuracy: {:.2}", accuracy.scaled(100.0));
        eprintln!("  Loss: {loss:.4}");
    }
    eprintln!("  Sampling: {}", report.stats);
    Ok(())
}
