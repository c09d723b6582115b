//! Neighborhood width estimation.
//!
//! The neighborhood around an anchor at `t` is a Gaussian with standard deviation
//! `half_width`. Its width is derived from the signal itself:
//!
//! - **ADF**: for radii `ws, 2·ws, 3·ws`, run an Augmented Dickey-Fuller test per
//!   feature on `[t - r, t + r)` and average the p-values. The first radius whose
//!   average falls below the threshold fixes `eta`; otherwise `eta = 3`.
//! - **ACF**: find the first lag where the sample's averaged autocorrelation drops
//!   below the threshold, and take the smallest `eta` with `eta · ws` beyond it
//!   (at most 10).
//! - **Fixed**: `half_width = 3 · ws · eta`.
//!
//! For ADF and ACF the half-width is `eta · ws`.

use serde::{Deserialize, Serialize};
use tnc_series::{TimeSeries, ValidRange};
use tnc_stats::{acf, adf};

use crate::NeighborhoodPolicy;

/// Number of ADF radii tried (`ws`, `2·ws`, `3·ws`).
pub const ADF_RADII: usize = 3;
/// Largest multiplier the ACF policy selects.
pub const MAX_ACF_ETA: usize = 10;
/// P-value substituted when the ADF statistic is undefined.
pub const ADF_NAN_P_VALUE: f64 = 0.01;
/// P-value substituted for a radius where the ADF test fails.
pub const ADF_FAILED_P_VALUE: f64 = 0.6;
/// Minimum fraction of observed timesteps for a feature to enter the ACF average.
pub const MIN_OBSERVED_FRACTION: f64 = 0.4;

/// Neighborhood size chosen for one anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeighborhoodWidth {
    pub eta: usize,
    /// Standard deviation of the positive-sampling Gaussian, in timesteps.
    pub half_width: usize,
}

/// Averaged autocorrelation curve of one sample, indexed by lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcfProfile {
    curve: Vec<f64>,
}

impl AcfProfile {
    /// Averages the autocorrelation functions (lags `0..T`) of the sample's features.
    ///
    /// Only features observed at least 40% of the time and with non-zero variance are
    /// averaged. If none qualifies, every feature with non-zero variance is used; if
    /// the sample is constant everywhere the curve is `1` at lag 0 and `0` after.
    #[must_use]
    pub fn from_series(series: &TimeSeries) -> Self {
        let len = series.len();
        let curves = (0..series.num_features())
            .map(|f| {
                let values = series.feature(f).iter().map(|v| f64::from(*v)).collect::<Vec<_>>();
                (
                    series.observed_fraction(f) >= MIN_OBSERVED_FRACTION,
                    acf::autocorrelation(&values, len.saturating_sub(1)),
                )
            })
            .collect::<Vec<_>>();

        let qualified = curves
            .iter()
            .filter(|(observed, _)| *observed)
            .filter_map(|(_, curve)| curve.as_deref())
            .collect::<Vec<_>>();
        let selected = if qualified.is_empty() {
            tracing::debug!("no feature is observed often enough; averaging all features");
            curves
                .iter()
                .filter_map(|(_, curve)| curve.as_deref())
                .collect()
        } else {
            qualified
        };

        if selected.is_empty() {
            let mut curve = vec![0.0; len.max(1)];
            curve[0] = 1.0;
            return Self { curve };
        }
        Self::average(&selected)
    }

    #[expect(clippy::cast_precision_loss)]
    fn average(curves: &[&[f64]]) -> Self {
        let len = curves[0].len();
        let n = curves.len() as f64;
        let curve = (0..len)
            .map(|lag| curves.iter().map(|c| c[lag]).sum::<f64>() / n)
            .collect();
        Self { curve }
    }

    /// Wraps an already averaged curve.
    #[must_use]
    pub fn from_curve(curve: Vec<f64>) -> Self {
        assert!(!curve.is_empty(), "autocorrelation curve must not be empty");
        Self { curve }
    }

    #[must_use]
    pub fn curve(&self) -> &[f64] {
        &self.curve
    }

    /// Autocorrelation at `lag`, `0.0` beyond the end of the curve.
    #[must_use]
    pub fn at_lag(&self, lag: usize) -> f64 {
        self.curve.get(lag).copied().unwrap_or(0.0)
    }

    /// First lag at which the curve drops below `threshold` (the curve length if never).
    #[must_use]
    pub fn decorrelation_lag(&self, threshold: f64) -> usize {
        acf::first_lag_below(&self.curve, threshold)
    }
}

/// Width of a fixed neighborhood: `half_width = 3 · window_size · eta`.
///
/// # Examples
///
/// ```
/// use tnc_neighborhood::estimator::fixed_width;
///
/// assert_eq!(fixed_width(10, 1).half_width, 30);
/// ```
#[must_use]
pub fn fixed_width(window_size: usize, eta: usize) -> NeighborhoodWidth {
    NeighborhoodWidth {
        eta,
        half_width: 3 * window_size * eta,
    }
}

/// Width from the autocorrelation profile.
///
/// # Examples
///
/// ```
/// use tnc_neighborhood::AcfProfile;
/// use tnc_neighborhood::estimator::acf_width;
///
/// // drops below 0.4 at lag 12
/// let mut curve = vec![0.9; 12];
/// curve.extend([0.1; 40]);
/// let width = acf_width(&AcfProfile::from_curve(curve), 5, 0.4);
/// assert_eq!(width.eta, 3);
/// assert_eq!(width.half_width, 15);
/// ```
#[must_use]
pub fn acf_width(profile: &AcfProfile, window_size: usize, threshold: f64) -> NeighborhoodWidth {
    assert!(window_size > 0);
    let lag = profile.decorrelation_lag(threshold);
    let eta = (lag / window_size + 1).min(MAX_ACF_ETA);
    NeighborhoodWidth {
        eta,
        half_width: eta * window_size,
    }
}

/// Width from Augmented Dickey-Fuller tests on growing radii around `t`.
#[must_use]
pub fn adf_width(
    series: &TimeSeries,
    t: usize,
    range: ValidRange,
    window_size: usize,
    threshold: f64,
) -> NeighborhoodWidth {
    let p_values = (1..=ADF_RADII)
        .map(|k| mean_adf_p_value(series, t, range, k * window_size))
        .collect::<Vec<_>>();
    let eta = p_values
        .iter()
        .position(|p| *p < threshold)
        .map_or(ADF_RADII, |i| i + 1);
    tracing::trace!(t, ?p_values, eta, "ADF neighborhood");
    NeighborhoodWidth {
        eta,
        half_width: eta * window_size,
    }
}

/// Mean ADF p-value across features on `[t - radius, t + radius)` clipped to `range`.
///
/// A failing test on any feature makes the whole radius count as
/// [`ADF_FAILED_P_VALUE`].
#[expect(clippy::cast_precision_loss)]
fn mean_adf_p_value(series: &TimeSeries, t: usize, range: ValidRange, radius: usize) -> f64 {
    let lo = t.saturating_sub(radius).max(range.start);
    let hi = (t + radius).min(range.end);
    let mut total = 0.0;
    for f in 0..series.num_features() {
        let feature = series.feature(f);
        let values = feature
            .iter()
            .skip(lo)
            .take(hi.saturating_sub(lo))
            .map(|v| f64::from(*v))
            .collect::<Vec<_>>();
        match adf::adf_test(&values) {
            Ok(result) if result.p_value.is_nan() => total += ADF_NAN_P_VALUE,
            Ok(result) => total += result.p_value,
            Err(e) => {
                tracing::warn!(t, radius, feature = f, "ADF test failed: {e}");
                return ADF_FAILED_P_VALUE;
            }
        }
    }
    total / series.num_features() as f64
}

/// Neighborhood width for an anchor at `t` under `policy`.
///
/// `profile` is the sample's precomputed autocorrelation profile; the ACF policies
/// compute it on the spot when it is not given.
#[must_use]
pub fn estimate_neighborhood_width(
    series: &TimeSeries,
    t: usize,
    range: ValidRange,
    window_size: usize,
    policy: &NeighborhoodPolicy,
    profile: Option<&AcfProfile>,
) -> NeighborhoodWidth {
    match *policy {
        NeighborhoodPolicy::Fixed { eta } => fixed_width(window_size, eta),
        NeighborhoodPolicy::Adf { threshold } => adf_width(series, t, range, window_size, threshold),
        NeighborhoodPolicy::Acf { threshold }
        | NeighborhoodPolicy::AcfPlus {
            in_threshold: threshold,
            ..
        } => match profile {
            Some(profile) => acf_width(profile, window_size, threshold),
            None => acf_width(&AcfProfile::from_series(series), window_size, threshold),
        },
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;
    use tnc_series::synthetic;

    use super::*;

    #[test]
    fn test_fixed_policy_width() {
        let series = TimeSeries::from_data(Array2::zeros((1, 200))).unwrap();
        let width = estimate_neighborhood_width(
            &series,
            100,
            ValidRange::new(0, 200),
            10,
            &NeighborhoodPolicy::Fixed { eta: 1 },
            None,
        );
        assert_eq!(width, NeighborhoodWidth { eta: 1, half_width: 30 });
    }

    #[test]
    fn test_adf_prefers_wider_neighborhoods_on_random_walks() {
        let window_size = 20;
        let range = ValidRange::new(0, 300);
        let mut rng = Pcg64Mcg::seed_from_u64(17);
        let (mut walk_eta, mut noise_eta) = (0, 0);
        for _ in 0..10 {
            let walk = synthetic::stack_features(&[synthetic::random_walk(&mut rng, 300)]).unwrap();
            let noise = synthetic::stack_features(&[synthetic::white_noise(&mut rng, 300)]).unwrap();
            walk_eta += adf_width(&walk, 150, range, window_size, 0.01).eta;
            noise_eta += adf_width(&noise, 150, range, window_size, 0.01).eta;
        }
        assert!(walk_eta > noise_eta, "walk {walk_eta} vs noise {noise_eta}");
    }

    #[test]
    fn test_adf_failure_yields_widest_neighborhood() {
        // constant data makes every ADF regression singular
        let series = TimeSeries::from_data(Array2::from_elem((2, 100), 1.0)).unwrap();
        let width = adf_width(&series, 50, ValidRange::new(0, 100), 10, 0.01);
        assert_eq!(width.eta, ADF_RADII);
    }

    #[test]
    fn test_acf_eta_is_capped() {
        let profile = AcfProfile::from_curve(vec![1.0; 500]);
        assert_eq!(acf_width(&profile, 10, 0.4).eta, MAX_ACF_ETA);
    }

    #[test]
    fn test_profile_skips_sparse_features() {
        // feature 0 alternates and is fully observed, feature 1 is a ramp observed 25%
        let data = array![
            [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0],
            [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
        ];
        let mask = array![
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        ];
        let series = TimeSeries::with_mask(data, mask).unwrap();
        let profile = AcfProfile::from_series(&series);
        assert_eq!(profile.curve().len(), 8);
        assert!(profile.at_lag(1) < -0.8);
    }

    #[test]
    fn test_profile_of_constant_sample() {
        let series = TimeSeries::from_data(Array2::from_elem((2, 6), 3.0)).unwrap();
        let profile = AcfProfile::from_series(&series);
        assert_eq!(profile.curve(), &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(profile.decorrelation_lag(0.4), 1);
    }
}
