use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis, s};
use serde::{Deserialize, Serialize};

use crate::{SeriesError, ValidRange, window_bounds};

/// Channel index of the measured values.
pub const DATA_CHANNEL: usize = 0;
/// Channel index of the missingness mask (`1` observed, `0` imputed).
pub const MASK_CHANNEL: usize = 1;

/// A multivariate time series stored as `[channel, feature, time]`.
///
/// Channel 0 always holds the (possibly imputed) values. An optional channel 1 holds
/// the missingness mask, where `1` marks an observed value and `0` a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Array3<f32>", into = "Array3<f32>")]
pub struct TimeSeries {
    values: Array3<f32>,
}

impl TryFrom<Array3<f32>> for TimeSeries {
    type Error = SeriesError;

    fn try_from(values: Array3<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<TimeSeries> for Array3<f32> {
    fn from(series: TimeSeries) -> Self {
        series.values
    }
}

impl TimeSeries {
    /// Wraps a `[channel, feature, time]` array with one or two channels.
    pub fn new(values: Array3<f32>) -> Result<Self, SeriesError> {
        let (channels, features, len) = values.dim();
        if !(1..=2).contains(&channels) {
            return Err(SeriesError::ChannelCount { channels });
        }
        if features == 0 || len == 0 {
            return Err(SeriesError::Empty);
        }
        Ok(Self { values })
    }

    /// Creates an unmasked series from a `[feature, time]` array.
    pub fn from_data(data: Array2<f32>) -> Result<Self, SeriesError> {
        Self::new(data.insert_axis(Axis(0)))
    }

    /// Creates a masked series from `[feature, time]` data and mask arrays.
    pub fn with_mask(data: Array2<f32>, mask: Array2<f32>) -> Result<Self, SeriesError> {
        if data.dim() != mask.dim() {
            return Err(SeriesError::ShapeMismatch {
                expected: data.shape().to_vec(),
                actual: mask.shape().to_vec(),
            });
        }
        let values = ndarray::stack(Axis(0), &[data.view(), mask.view()])
            .map_err(|_| SeriesError::Empty)?;
        Self::new(values)
    }

    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.values.dim().0
    }

    #[must_use]
    pub fn num_features(&self) -> usize {
        self.values.dim().1
    }

    /// Number of timesteps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.dim().2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_mask(&self) -> bool {
        self.num_channels() == 2
    }

    /// The full `[channel, feature, time]` array.
    #[must_use]
    pub fn values(&self) -> ArrayView3<'_, f32> {
        self.values.view()
    }

    /// The `[feature, time]` data channel.
    #[must_use]
    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.values.index_axis(Axis(0), DATA_CHANNEL)
    }

    /// The `[feature, time]` mask channel, if present.
    #[must_use]
    pub fn mask(&self) -> Option<ArrayView2<'_, f32>> {
        self.has_mask()
            .then(|| self.values.index_axis(Axis(0), MASK_CHANNEL))
    }

    /// Values of one feature over the whole series.
    #[must_use]
    pub fn feature(&self, feature: usize) -> ArrayView1<'_, f32> {
        self.values.slice(s![DATA_CHANNEL, feature, ..])
    }

    /// Fraction of timesteps where `feature` is observed (`1.0` without a mask).
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn observed_fraction(&self, feature: usize) -> f64 {
        let Some(mask) = self.mask() else {
            return 1.0;
        };
        let observed = mask.row(feature).iter().filter(|m| is_observed(**m)).count();
        observed as f64 / self.len() as f64
    }

    /// Computes the range between the first and last timestep with any observed feature.
    ///
    /// Without a mask the whole series is valid.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NoObservedTimestep`] when no timestep has an observed value.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use tnc_series::{TimeSeries, ValidRange};
    ///
    /// let data = array![[0.0, 1.0, 2.0, 3.0, 0.0], [0.0, 5.0, 6.0, 7.0, 0.0]];
    /// let mask = array![[0.0, 1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0, 0.0]];
    /// let series = TimeSeries::with_mask(data, mask).unwrap();
    /// assert_eq!(series.valid_range().unwrap(), ValidRange::new(1, 4));
    /// ```
    pub fn valid_range(&self) -> Result<ValidRange, SeriesError> {
        let Some(mask) = self.mask() else {
            return Ok(ValidRange::new(0, self.len()));
        };
        let observed = mask
            .axis_iter(Axis(1))
            .map(|step| step.iter().any(|m| is_observed(*m)))
            .collect::<Vec<_>>();
        let start = observed
            .iter()
            .position(|o| *o)
            .ok_or(SeriesError::NoObservedTimestep)?;
        let end = observed
            .iter()
            .rposition(|o| *o)
            .ok_or(SeriesError::NoObservedTimestep)?
            + 1;
        Ok(ValidRange::new(start, end))
    }

    /// The `[channel, feature, window_size]` window centered at `center`.
    ///
    /// # Panics
    ///
    /// Panics if the window does not fit in the series.
    #[must_use]
    pub fn window(&self, center: usize, window_size: usize) -> ArrayView3<'_, f32> {
        let bounds = window_bounds(center, window_size);
        assert!(
            bounds.end <= self.len(),
            "window {bounds:?} exceeds series of length {}",
            self.len()
        );
        self.values.slice(s![.., .., bounds])
    }

    /// Returns whether every mask entry in the window is `0`.
    ///
    /// Unmasked series are never fully imputed.
    #[must_use]
    pub fn is_fully_imputed(&self, start: usize, end: usize) -> bool {
        self.mask()
            .is_some_and(|mask| mask.slice(s![.., start..end]).iter().all(|m| !is_observed(*m)))
    }
}

/// Any positive mask value marks the timestep as observed.
fn is_observed(mask: f32) -> bool {
    mask > 0.0
}
