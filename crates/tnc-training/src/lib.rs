//! Contrastive encoder training and downstream classification.
//!
//! This crate trains window encoders with the temporal neighborhood coding
//! objective and evaluates the learned encodings on a sample-level prediction task.
//!
//! # How Training Works
//!
//! 1. **Sampling** - [`tnc_neighborhood`] draws anchors with positive windows from
//!    their neighborhood and negative windows from outside it
//! 2. **Encoding** - One shared [`Encoder`] maps every window to an encoding
//! 3. **Discrimination** - The [`Discriminator`] scores (anchor, neighbor) pairs
//! 4. **Objective** - [`ContrastiveObjective`] turns the scores into a loss; the
//!    debiased form treats negatives as unlabeled rather than strictly negative
//! 5. **Cross-validation** - [`contrastive::learn_encoder`] repeats training per fold,
//!    checkpointing each fold every 10 epochs
//!
//! # Architecture
//!
//! ```text
//! Cohort
//!     ↓ sampled by
//! TncDataset / DataLoader (tnc-neighborhood)
//!     ↓ batches
//! Encoder + Discriminator
//!     ↓ checkpointed
//! CheckpointStore
//!     ↓ frozen encoder
//! Sequence encodings → StatePredictor (classifier)
//!     ↓ scored by
//! AUROC / AUPRC (tnc-stats)
//! ```
//!
//! # Run Identity
//!
//! All training entry points receive a [`RunContext`]. It carries the resolved
//! neighborhood policy, the configuration echoed into checkpoints, and the names
//! checkpoints are stored under. Nothing is read from global state.
//!
//! # Devices
//!
//! Tensors live on the device returned by [`select_device`]: the first CUDA device
//! when candle was built with CUDA support, the CPU otherwise.

pub use self::{
    batch::BatchTensors,
    discriminator::Discriminator,
    encoder::{Encoder, EncoderConfig, InputShape, SequenceEncoding, WindowEncoder},
    error::TrainError,
    loss::ContrastiveObjective,
    run::*,
};

mod batch;
pub mod checkpoint;
pub mod classifier;
pub mod contrastive;
mod discriminator;
pub mod encoder;
mod error;
pub mod loss;
mod run;
