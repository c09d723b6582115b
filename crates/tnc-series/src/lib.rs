//! Time series data model for temporal neighborhood coding.
//!
//! A sample is a [`TimeSeries`] stored as `[channel, feature, time]`: channel 0 holds
//! the (possibly imputed) measurements and an optional channel 1 holds the
//! missingness mask (`1` observed, `0` missing). A [`Cohort`] groups equally shaped
//! samples with optional [`StateLabels`].
//!
//! # Windows
//!
//! Every window has exactly `window_size` timesteps and is addressed by its center:
//! it covers [`window_bounds`]`(center, window_size)`. The [`ValidRange`] of a sample
//! trims leading and trailing timesteps where nothing was observed, and answers which
//! centers keep a window fully inside the observed data.
//!
//! ```
//! use ndarray::Array2;
//! use tnc_series::TimeSeries;
//!
//! let series = TimeSeries::from_data(Array2::zeros((3, 200))).unwrap();
//! let range = series.valid_range().unwrap();
//! assert_eq!(range.anchor_centers(10), Some(20..180));
//! assert_eq!(series.window(100, 10).dim(), (1, 3, 10));
//! ```

use derive_more::{Display, Error};

pub use self::{cohort::*, labels::*, series::*, window::*};

mod cohort;
mod labels;
mod series;
pub mod synthetic;
mod window;

/// Errors raised while building or inspecting time series.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SeriesError {
    #[display("expected 1 (data) or 2 (data, mask) channels, got {channels}")]
    ChannelCount { channels: usize },
    #[display("time series must have at least one feature and one timestep")]
    Empty,
    #[display("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[display("{labels} labels given for {samples} samples")]
    LabelCount { labels: usize, samples: usize },
    #[display("no timestep has an observed feature")]
    NoObservedTimestep,
    #[display("invalid simulation config: {reason}")]
    InvalidSimulation { reason: &'static str },
}
