//! Synthetic cohorts for experiments and tests.
//!
//! [`simulate`] produces regime-switching multivariate series: every sample walks
//! through hidden states with a Markov switching process, and each state drives the
//! features as a mean-reverting AR(1) process around its own means. The hidden state
//! is recorded as a per-timestep label, so learned encodings can be checked against
//! ground truth.
//!
//! [`random_walk`] and [`white_noise`] are the two reference processes for
//! stationarity-driven neighborhood sizing: a unit-root process and a stationary one.

use ndarray::{Array2, Array3};
use rand::Rng;
use rand_distr::{Distribution as _, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::{Cohort, SeriesError, StateLabels, TimeSeries};

/// Parameters of the regime-switching generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub num_samples: usize,
    pub num_features: usize,
    pub len: usize,
    pub num_states: usize,
    /// Probability of leaving the current state at each timestep.
    pub switch_probability: f64,
    /// Standard deviation of the AR(1) innovations.
    pub noise_std: f64,
    /// Probability that a value is missing. A mask channel is added when positive.
    pub missing_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_samples: 100,
            num_features: 3,
            len: 500,
            num_states: 4,
            switch_probability: 0.01,
            noise_std: 0.3,
            missing_rate: 0.0,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<(), SeriesError> {
        let reason = if self.num_samples == 0 || self.num_features == 0 || self.len == 0 {
            "cohort dimensions must be positive"
        } else if self.num_states == 0 {
            "at least one state is required"
        } else if !(0.0..=1.0).contains(&self.switch_probability) {
            "switch_probability must be in [0, 1]"
        } else if !(0.0..1.0).contains(&self.missing_rate) {
            "missing_rate must be in [0, 1)"
        } else if self.noise_std.is_nan() || self.noise_std < 0.0 {
            "noise_std must be non-negative"
        } else {
            return Ok(());
        };
        Err(SeriesError::InvalidSimulation { reason })
    }
}

/// Generates a labelled cohort from `config`.
///
/// # Examples
///
/// ```
/// use rand::SeedableRng as _;
/// use rand::rngs::StdRng;
/// use tnc_series::synthetic::{SimulationConfig, simulate};
///
/// let config = SimulationConfig {
///     num_samples: 4,
///     len: 120,
///     missing_rate: 0.2,
///     ..SimulationConfig::default()
/// };
/// let cohort = simulate(&config, &mut StdRng::seed_from_u64(0)).unwrap();
/// assert_eq!(cohort.len(), 4);
/// assert_eq!(cohort.num_channels(), 2);
/// assert_eq!(cohort.series_len(), 120);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn simulate<R>(config: &SimulationConfig, rng: &mut R) -> Result<Cohort, SeriesError>
where
    R: Rng + ?Sized,
{
    config.validate()?;
    let SimulationConfig {
        num_samples,
        num_features,
        len,
        num_states,
        switch_probability,
        noise_std,
        missing_rate,
    } = *config;

    // per-state feature means and persistence
    let means = Array2::from_shape_fn((num_states, num_features), |_| {
        2.0 * rng.sample::<f64, _>(StandardNormal)
    });
    let persistence = (0..num_states)
        .map(|_| rng.random_range(0.3..0.9))
        .collect::<Vec<f64>>();

    let mut samples = Vec::with_capacity(num_samples);
    let mut labels = Array2::zeros((num_samples, len));
    for i in 0..num_samples {
        let mut state = rng.random_range(0..num_states);
        let mut level = means.row(state).to_vec();
        let mut data = Array2::zeros((num_features, len));
        let mut mask = Array2::ones((num_features, len));

        for t in 0..len {
            if num_states > 1 && rng.random_bool(switch_probability) {
                // uniform over the other states
                let next = rng.random_range(0..num_states - 1);
                state = if next >= state { next + 1 } else { next };
            }
            labels[[i, t]] = state as f32;

            let phi = persistence[state];
            for (f, x) in level.iter_mut().enumerate() {
                let mean = means[[state, f]];
                let noise: f64 = rng.sample(StandardNormal);
                *x = mean + phi * (*x - mean) + noise_std * noise;

                if missing_rate > 0.0 && rng.random_bool(missing_rate) {
                    mask[[f, t]] = 0.0;
                    // carry the last observation forward
                    data[[f, t]] = if t == 0 { 0.0 } else { data[[f, t - 1]] };
                } else {
                    #[expect(clippy::cast_possible_truncation)]
                    let value = *x as f32;
                    data[[f, t]] = value;
                }
            }
        }

        let sample = if missing_rate > 0.0 {
            TimeSeries::with_mask(data, mask)?
        } else {
            TimeSeries::from_data(data)?
        };
        samples.push(sample);
    }

    Cohort::new(samples, Some(StateLabels::PerTimestep(labels)))
}

/// A Gaussian random walk of `len` steps starting at zero.
pub fn random_walk<R>(rng: &mut R, len: usize) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    let mut level = 0.0;
    (0..len)
        .map(|_| {
            let step: f64 = StandardNormal.sample(rng);
            level += step;
            level
        })
        .collect()
}

/// `len` independent standard normal draws.
pub fn white_noise<R>(rng: &mut R, len: usize) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    (0..len).map(|_| StandardNormal.sample(rng)).collect()
}

/// Stacks per-feature series into one unmasked `[1, feature, time]` sample.
///
/// # Panics
///
/// Panics if the features differ in length.
pub fn stack_features(features: &[Vec<f64>]) -> Result<TimeSeries, SeriesError> {
    let len = features.first().map_or(0, Vec::len);
    assert!(
        features.iter().all(|f| f.len() == len),
        "features must have equal length"
    );
    #[expect(clippy::cast_possible_truncation)]
    let values = Array3::from_shape_fn((1, features.len(), len), |(_, f, t)| features[f][t] as f32);
    TimeSeries::new(values)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_labels_track_states() {
        let config = SimulationConfig {
            num_samples: 3,
            len: 300,
            num_states: 2,
            switch_probability: 0.05,
            ..SimulationConfig::default()
        };
        let cohort = simulate(&config, &mut Pcg64Mcg::seed_from_u64(1)).unwrap();
        let Some(StateLabels::PerTimestep(labels)) = cohort.labels() else {
            panic!("expected per-timestep labels");
        };
        assert_eq!(labels.dim(), (3, 300));
        assert!(labels.iter().all(|l| *l == 0.0 || *l == 1.0));
        assert!(!cohort.samples()[0].has_mask());
    }

    #[test]
    fn test_missing_values_are_masked_and_carried() {
        let config = SimulationConfig {
            num_samples: 2,
            len: 200,
            missing_rate: 0.5,
            ..SimulationConfig::default()
        };
        let cohort = simulate(&config, &mut Pcg64Mcg::seed_from_u64(2)).unwrap();
        let sample = &cohort.samples()[0];
        let mask = sample.mask().unwrap();
        let data = sample.data();
        let mut missing = 0;
        for ((f, t), m) in mask.indexed_iter() {
            if *m == 0.0 && t > 0 {
                missing += 1;
                assert_eq!(data[[f, t]], data[[f, t - 1]]);
            }
        }
        assert!(missing > 100);
    }

    #[test]
    fn test_invalid_config() {
        let config = SimulationConfig {
            missing_rate: 1.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            simulate(&config, &mut Pcg64Mcg::seed_from_u64(0)),
            Err(SeriesError::InvalidSimulation { .. })
        ));
    }

    #[test]
    fn test_reference_processes() {
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        let walk = random_walk(&mut rng, 50);
        let noise = white_noise(&mut rng, 50);
        let series = stack_features(&[walk, noise]).unwrap();
        assert_eq!(series.num_features(), 2);
        assert_eq!(series.len(), 50);
    }
}
