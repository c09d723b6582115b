use derive_more::{Display, Error, From};
use tnc_neighborhood::{PolicyError, SampleError};
use tnc_series::SeriesError;

use crate::checkpoint::CheckpointError;

#[derive(Debug, Display, Error, From)]
pub enum TrainError {
    #[display("tensor operation failed")]
    Tensor { source: candle_core::Error },
    #[display("failed to sample training examples")]
    Sample { source: SampleError },
    #[display("invalid cohort")]
    Series { source: SeriesError },
    #[display("invalid neighborhood policy")]
    Policy { source: PolicyError },
    #[display("checkpoint operation failed")]
    Checkpoint { source: CheckpointError },
    #[display("invalid configuration: {reason}")]
    #[from(skip)]
    InvalidConfig { reason: String },
}

impl TrainError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
