use derive_more::{Display, Error};
use ndarray::{Array3, Array4, ArrayView3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tnc_series::{Cohort, SeriesError, UNKNOWN_LABEL, window_bounds};

use crate::{
    AcfProfile, NeighborhoodPolicy, NeighborhoodWidth,
    estimator::estimate_neighborhood_width,
    sampler::{
        NegativeDraw, NegativeFallback, sample_filtered_negative_centers, sample_negative_centers,
        sample_positive_centers,
    },
};

/// Sampling parameters of a [`TncDataset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub window_size: usize,
    /// Number of positive and negative windows per anchor.
    pub mc_sample_size: usize,
    pub policy: NeighborhoodPolicy,
}

#[derive(Debug, Display, Error)]
pub enum SampleError {
    #[display("sample {index}: {source}")]
    Series { index: usize, source: SeriesError },
    #[display(
        "sample {index}: valid range of {len} steps is too short for windows of {window_size} \
         (need more than {})",
        4 * window_size
    )]
    RangeTooShort {
        index: usize,
        len: usize,
        window_size: usize,
    },
    #[display("invalid dataset config: {reason}")]
    InvalidConfig { reason: &'static str },
    #[display("cannot stack windows: {source}")]
    Shape { source: ndarray::ShapeError },
}

/// One training example: an anchor window with its positive and negative windows.
#[derive(Debug, Clone)]
pub struct TncItem {
    /// `[channel, feature, window_size]`
    pub anchor: Array3<f32>,
    /// `[mc_sample_size, channel, feature, window_size]`
    pub positives: Array4<f32>,
    /// `[mc_sample_size, channel, feature, window_size]`
    pub negatives: Array4<f32>,
    /// State label of the anchor window, [`UNKNOWN_LABEL`] for unlabelled cohorts.
    pub label: f32,
    /// Center timestep of the anchor.
    pub center: usize,
    pub neighborhood: NeighborhoodWidth,
    /// Negatives rejected by the correlation filter before padding.
    pub negatives_removed: Option<usize>,
    pub fallback: Option<NegativeFallback>,
}

/// Indexable, randomized source of TNC training examples.
///
/// Autocorrelation profiles are computed once at construction when the policy needs
/// them and are read-only afterwards, so a dataset can be shared between threads.
#[derive(Debug, Clone)]
pub struct TncDataset {
    cohort: Cohort,
    config: DatasetConfig,
    profiles: Option<Vec<AcfProfile>>,
}

impl TncDataset {
    pub fn new(cohort: Cohort, config: DatasetConfig) -> Result<Self, SampleError> {
        if config.window_size == 0 {
            return Err(SampleError::InvalidConfig {
                reason: "window_size must be positive",
            });
        }
        if config.mc_sample_size == 0 {
            return Err(SampleError::InvalidConfig {
                reason: "mc_sample_size must be positive",
            });
        }
        if let NeighborhoodPolicy::Fixed { eta: 0 } = config.policy {
            return Err(SampleError::InvalidConfig {
                reason: "eta must be positive",
            });
        }

        let profiles = config.policy.uses_acf().then(|| {
            tracing::debug!(samples = cohort.len(), "computing autocorrelation profiles");
            cohort.samples().iter().map(AcfProfile::from_series).collect()
        });
        Ok(Self {
            cohort,
            config,
            profiles,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cohort.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cohort.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    #[must_use]
    pub fn cohort(&self) -> &Cohort {
        &self.cohort
    }

    /// Precomputed autocorrelation profile of sample `index`, if the policy uses one.
    #[must_use]
    pub fn profile(&self, index: usize) -> Option<&AcfProfile> {
        self.profiles.as_ref().map(|profiles| &profiles[index])
    }

    /// The window of sample `index` centered at `center`.
    #[must_use]
    pub fn window(&self, index: usize, center: usize) -> ArrayView3<'_, f32> {
        self.cohort.samples()[index].window(center, self.config.window_size)
    }

    /// Draws a random anchor of sample `index` with its positives and negatives.
    ///
    /// Each call draws a new anchor; repeated calls return different examples.
    ///
    /// # Errors
    ///
    /// Fails when the sample has no observed timestep or its valid range leaves no
    /// room for an anchor (`[start + 2·ws, end - 2·ws)` is empty).
    pub fn get<R>(&self, index: usize, rng: &mut R) -> Result<TncItem, SampleError>
    where
        R: Rng + ?Sized,
    {
        let DatasetConfig {
            window_size,
            mc_sample_size,
            policy,
        } = self.config;
        let sample = &self.cohort.samples()[index];
        let range = sample
            .valid_range()
            .map_err(|source| SampleError::Series { index, source })?;
        let anchors = range
            .anchor_centers(window_size)
            .ok_or(SampleError::RangeTooShort {
                index,
                len: range.len(),
                window_size,
            })?;

        let t = rng.random_range(anchors);
        let neighborhood = estimate_neighborhood_width(
            sample,
            t,
            range,
            window_size,
            &policy,
            self.profile(index),
        );
        let h = neighborhood.half_width;

        let positive_centers = sample_positive_centers(rng, t, range, window_size, h, mc_sample_size);
        let negative_draw = match (policy, self.profile(index)) {
            (NeighborhoodPolicy::AcfPlus { out_threshold, .. }, Some(profile)) => {
                sample_filtered_negative_centers(
                    rng,
                    t,
                    range,
                    window_size,
                    h,
                    mc_sample_size,
                    profile,
                    out_threshold,
                )
            }
            _ => sample_negative_centers(rng, t, range, window_size, h, mc_sample_size),
        };
        let NegativeDraw {
            centers: negative_centers,
            removed,
            fallback,
        } = negative_draw.padded(mc_sample_size);

        let label = self.cohort.labels().map_or(UNKNOWN_LABEL, |labels| {
            labels.window_label(index, window_bounds(t, window_size))
        });
        tracing::trace!(index, t, half_width = h, ?fallback, "sampled anchor");

        Ok(TncItem {
            anchor: self.window(index, t).to_owned(),
            positives: self.stack_windows(index, &positive_centers)?,
            negatives: self.stack_windows(index, &negative_centers)?,
            label,
            center: t,
            neighborhood,
            negatives_removed: removed,
            fallback,
        })
    }

    fn stack_windows(&self, index: usize, centers: &[usize]) -> Result<Array4<f32>, SampleError> {
        let windows = centers
            .iter()
            .map(|&c| self.window(index, c))
            .collect::<Vec<_>>();
        ndarray::stack(Axis(0), &windows).map_err(|source| SampleError::Shape { source })
    }
}
