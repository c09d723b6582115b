//! Sample autocorrelation function.
//!
//! The autocorrelation at lag `k` is the normalized autocovariance
//!
//! ```text
//! acf[k] = Σ_{t=0}^{n-k-1} (x_t - m)(x_{t+k} - m) / Σ_{t=0}^{n-1} (x_t - m)²
//! ```
//!
//! where `m` is the sample mean. The denominator uses the full-length sum for every
//! lag (the "non-adjusted" estimator), so `|acf[k]| ≤ 1` and the curve decays toward
//! zero for large lags even on strongly persistent series.

/// Computes the sample autocorrelation function for lags `0..=max_lag`.
///
/// `max_lag` is clamped to `values.len() - 1`, so requesting `T - 1` lags on a series of
/// length `T` yields exactly `T` coefficients.
///
/// # Returns
///
/// * `Some(acf)` - coefficients for lags `0..=min(max_lag, n - 1)`, with `acf[0] == 1.0`
/// * `None` - if the series has fewer than two values, has zero variance, or contains
///   non-finite values
///
/// # Examples
///
/// ```
/// use tnc_stats::acf::autocorrelation;
///
/// let alternating = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
/// let acf = autocorrelation(&alternating, 1).unwrap();
/// assert!(acf[1] < -0.8);
///
/// assert!(autocorrelation(&[3.0, 3.0, 3.0], 2).is_none());
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn autocorrelation(values: &[f64], max_lag: usize) -> Option<Vec<f64>> {
    let n = values.len();
    if n < 2 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let centered = values.iter().map(|v| v - mean).collect::<Vec<_>>();
    let denom = centered.iter().map(|v| v * v).sum::<f64>();
    if denom <= f64::EPSILON * n as f64 {
        return None;
    }

    let max_lag = max_lag.min(n - 1);
    let acf = (0..=max_lag)
        .map(|lag| {
            let cov = centered[lag..]
                .iter()
                .zip(&centered[..n - lag])
                .map(|(a, b)| a * b)
                .sum::<f64>();
            cov / denom
        })
        .collect();
    Some(acf)
}

/// Returns the first lag at which `acf` drops strictly below `threshold`.
///
/// Returns `acf.len()` when the curve never drops below the threshold, so the result
/// can always be used as "the lag where correlation is lost".
///
/// # Examples
///
/// ```
/// use tnc_stats::acf::first_lag_below;
///
/// let acf = [1.0, 0.8, 0.5, 0.3, 0.1];
/// assert_eq!(first_lag_below(&acf, 0.4), 3);
/// assert_eq!(first_lag_below(&acf, 0.0), 5);
/// ```
#[must_use]
pub fn first_lag_below(acf: &[f64], threshold: f64) -> usize {
    acf.iter()
        .position(|&r| r < threshold)
        .unwrap_or(acf.len())
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_distr::{Distribution as _, StandardNormal};
    use rand_pcg::Pcg64Mcg;

    use super::*;

    #[test]
    fn test_lag_zero_is_one() {
        let values = [0.5, 1.5, -2.0, 3.0, 0.25];
        let acf = autocorrelation(&values, 10).unwrap();
        assert_eq!(acf.len(), values.len());
        assert!((acf[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_coefficients_bounded() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let values = (0..200)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect::<Vec<f64>>();
        let acf = autocorrelation(&values, 199).unwrap();
        assert!(acf.iter().all(|r| r.abs() <= 1.0 + 1e-12));
    }

    #[test]
    fn test_persistent_series_decays_slowly() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        let mut level = 0.0;
        let walk = (0..300)
            .map(|_| {
                let step: f64 = StandardNormal.sample(&mut rng);
                level += step;
                level
            })
            .collect::<Vec<f64>>();
        let noise = (0..300)
            .map(|_| StandardNormal.sample(&mut rng))
            .collect::<Vec<f64>>();

        let walk_acf = autocorrelation(&walk, 299).unwrap();
        let noise_acf = autocorrelation(&noise, 299).unwrap();
        assert!(first_lag_below(&walk_acf, 0.4) > first_lag_below(&noise_acf, 0.4));
        assert!(first_lag_below(&noise_acf, 0.4) <= 2);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(autocorrelation(&[], 3).is_none());
        assert!(autocorrelation(&[1.0], 3).is_none());
        assert!(autocorrelation(&[1.0, f64::NAN, 2.0], 1).is_none());
    }
}
