//! Neighborhood sampling for temporal neighborhood coding.
//!
//! Temporal neighborhood coding learns encodings under the assumption that windows
//! close in time share a latent state while distant windows do not. This crate turns a
//! [`Cohort`](tnc_series::Cohort) into training examples for that objective:
//!
//! 1. [`TncDataset::get`] draws an anchor center `t` in `[start + 2·ws, end - 2·ws)` of
//!    the sample's valid range.
//! 2. The configured [`NeighborhoodPolicy`] sizes the neighborhood around `t`
//!    ([`estimator`]).
//! 3. The [`sampler`] draws positive windows inside the neighborhood and negative
//!    windows outside it, optionally rejecting negatives that are still
//!    autocorrelated with the anchor.
//! 4. The [`DataLoader`] batches examples, sampling on worker threads.
//!
//! # Example
//!
//! ```
//! use ndarray::Array2;
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg64Mcg;
//! use tnc_neighborhood::{DatasetConfig, NeighborhoodPolicy, TncDataset};
//! use tnc_series::{Cohort, TimeSeries};
//!
//! let sample = TimeSeries::from_data(Array2::zeros((3, 200))).unwrap();
//! let cohort = Cohort::new(vec![sample], None).unwrap();
//! let config = DatasetConfig {
//!     window_size: 10,
//!     mc_sample_size: 5,
//!     policy: NeighborhoodPolicy::Fixed { eta: 1 },
//! };
//! let dataset = TncDataset::new(cohort, config).unwrap();
//!
//! let item = dataset.get(0, &mut Pcg64Mcg::seed_from_u64(0)).unwrap();
//! assert_eq!(item.neighborhood.half_width, 30);
//! assert_eq!(item.positives.dim(), (5, 1, 3, 10));
//! ```

pub use self::{
    dataset::*,
    estimator::{AcfProfile, NeighborhoodWidth},
    loader::*,
    policy::*,
    sampler::NegativeFallback,
};

mod dataset;
pub mod estimator;
mod loader;
mod policy;
pub mod sampler;
