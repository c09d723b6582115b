use std::path::PathBuf;

use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;
use tnc_series::synthetic::{self, SimulationConfig};

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    /// Simulation parameters (JSON); defaults are used for missing fields
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the number of samples
    #[arg(long)]
    num_samples: Option<usize>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let SimulateArg {
        config,
        num_samples,
        seed,
        output,
    } = arg;
    let mut config: SimulationConfig = match config {
        Some(path) => util::read_json_file("simulation config", path)?,
        None => SimulationConfig::default(),
    };
    if let Some(num_samples) = num_samples {
        config.num_samples = *num_samples;
    }

    let cohort = synthetic::simulate(&config, &mut Pcg64Mcg::seed_from_u64(*seed))?;
    let mut output = Output::from_output_path(output.clone())?;
    output.write_json(&cohort)?;

    tracing::info!(
        samples = cohort.len(),
        features = cohort.num_features(),
        len = cohort.series_len(),
        output = %output.display_path(),
        "cohort simulated"
    );
    Ok(())
}
