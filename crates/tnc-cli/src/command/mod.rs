use clap::{Parser, Subcommand};

use self::{
    learn_encoder::LearnEncoderArg, simulate::SimulateArg, train_classifier::TrainClassifierArg,
};

mod learn_encoder;
mod simulate;
mod train_classifier;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Generate a synthetic regime-switching cohort
    Simulate(#[clap(flatten)] SimulateArg),
    /// Train encoders with temporal neighborhood coding
    LearnEncoder(#[clap(flatten)] LearnEncoderArg),
    /// Train outcome classifiers on frozen encoder checkpoints
    TrainClassifier(#[clap(flatten)] TrainClassifierArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Simulate(arg) => simulate::run(&arg)?,
        Mode::LearnEncoder(arg) => learn_encoder::run(&arg)?,
        Mode::TrainClassifier(arg) => train_classifier::run(&arg)?,
    }
    Ok(())
}
