//! Augmented Dickey-Fuller unit-root test.
//!
//! The test fits the regression
//!
//! ```text
//! Δy_t = α + β·y_{t-1} + Σ_{i=1}^{p} γ_i·Δy_{t-i} + ε_t
//! ```
//!
//! and reports the t-statistic of `β`. The null hypothesis is that the series has a
//! unit root (is non-stationary); small p-values reject it.
//!
//! # Lag Selection
//!
//! The number of lagged differences `p` is chosen by minimizing the AIC over
//! `0..=max_lag` on a common estimation sample, where by default
//! `max_lag = min(⌈12·(n/100)^{1/4}⌉, n/2 - 2)`. The regression is then refit with the
//! selected lag on the largest sample it allows.
//!
//! # P-values
//!
//! P-values use MacKinnon's (1994) response-surface approximation for the
//! constant-only regression with a single series.

use derive_more::{Display, Error};
use nalgebra::{DMatrix, DVector};
use statrs::function::erf::erfc;

use crate::ols::OlsFit;

/// Reasons the test cannot produce a statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum AdfError {
    /// The series is too short for the regression with the requested lags.
    #[display("sample size {len} is too short for the ADF regression")]
    InsufficientSamples { len: usize },
    /// The design matrix is singular (e.g. constant input).
    #[display("ADF regression design matrix is singular")]
    SingularDesign,
}

/// Result of an Augmented Dickey-Fuller test.
#[derive(Debug, Clone, Copy)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient.
    pub statistic: f64,
    /// MacKinnon approximate p-value. May be `NaN` when the statistic is undefined.
    pub p_value: f64,
    /// Number of lagged differences used in the final regression.
    pub used_lag: usize,
    /// Number of observations in the final regression.
    pub nobs: usize,
}

/// Runs the test with the default maximum lag and AIC lag selection.
///
/// # Examples
///
/// ```
/// use tnc_stats::adf::adf_test;
///
/// // deterministic pseudo-random noise
/// let noise = (0..120)
///     .map(|i| ((f64::from(i) * 12.9898).sin() * 43_758.545_3).fract())
///     .collect::<Vec<_>>();
/// let result = adf_test(&noise).unwrap();
/// assert!(result.p_value < 0.05);
///
/// assert!(adf_test(&[1.0, 2.0, 3.0]).is_err());
/// ```
pub fn adf_test(values: &[f64]) -> Result<AdfResult, AdfError> {
    adf_test_with_max_lag(values, default_max_lag(values.len())?)
}

/// Runs the test selecting the lag by AIC over `0..=max_lag`.
pub fn adf_test_with_max_lag(values: &[f64], max_lag: usize) -> Result<AdfResult, AdfError> {
    let n = values.len();
    let diff = values.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();
    if diff.len() <= max_lag + 2 {
        return Err(AdfError::InsufficientSamples { len: n });
    }
    if diff.iter().all(|d| *d == 0.0) {
        return Err(AdfError::SingularDesign);
    }

    let best_lag = select_lag(values, &diff, max_lag)?;

    let rows = diff.len() - best_lag;
    let (x, y) = design(values, &diff, best_lag, rows);
    let fit = OlsFit::fit(&x, &y).ok_or(if x.nrows() <= x.ncols() {
        AdfError::InsufficientSamples { len: n }
    } else {
        AdfError::SingularDesign
    })?;

    let statistic = fit.t_value(0);
    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag: best_lag,
        nobs: fit.nobs,
    })
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn default_max_lag(len: usize) -> Result<usize, AdfError> {
    let schwert = (12.0 * (len as f64 / 100.0).powf(0.25)).ceil() as usize;
    // one trend term (the constant)
    let cap = (len / 2)
        .checked_sub(2)
        .ok_or(AdfError::InsufficientSamples { len })?;
    Ok(schwert.min(cap))
}

fn select_lag(values: &[f64], diff: &[f64], max_lag: usize) -> Result<usize, AdfError> {
    let rows = diff.len() - max_lag;
    let (full_x, y) = design(values, diff, max_lag, rows);

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let x = full_x.columns(0, 2 + lag).into_owned();
        let Some(fit) = OlsFit::fit(&x, &y) else {
            continue;
        };
        let aic = fit.aic();
        if best.is_none_or(|(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    best.map(|(_, lag)| lag).ok_or(AdfError::SingularDesign)
}

/// Builds `[y_{t-1}, 1, Δy_{t-1}, …, Δy_{t-lag}]` regressors for the last `rows` differences.
fn design(values: &[f64], diff: &[f64], lag: usize, rows: usize) -> (DMatrix<f64>, DVector<f64>) {
    let offset = diff.len() - rows;
    let x = DMatrix::from_fn(rows, 2 + lag, |row, col| {
        let j = offset + row;
        match col {
            0 => values[j],
            1 => 1.0,
            k => diff[j - (k - 1)],
        }
    });
    let y = DVector::from_fn(rows, |row, _| diff[offset + row]);
    (x, y)
}

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038_269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.932_02, -0.127_45, -0.010_368];

/// MacKinnon approximate p-value for the constant-only, single-series case.
///
/// # Examples
///
/// ```
/// use tnc_stats::adf::mackinnon_p_value;
///
/// // The 1% critical value of the constant-only test is about -3.43.
/// assert!((mackinnon_p_value(-3.43) - 0.01).abs() < 0.001);
/// assert_eq!(mackinnon_p_value(5.0), 1.0);
/// ```
#[must_use]
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    standard_normal_cdf(z)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / std::f64::consts::SQRT_2)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_distr::{Distribution as _, StandardNormal};
    use rand_pcg::Pcg64Mcg;

    use super::*;

    fn white_noise(seed: u64, len: usize) -> Vec<f64> {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        (0..len).map(|_| StandardNormal.sample(&mut rng)).collect()
    }

    fn random_walk(seed: u64, len: usize) -> Vec<f64> {
        let mut level = 0.0;
        white_noise(seed, len)
            .into_iter()
            .map(|step| {
                level += step;
                level
            })
            .collect()
    }

    #[test]
    fn test_white_noise_is_stationary() {
        let result = adf_test(&white_noise(3, 300)).unwrap();
        assert!(result.statistic < -3.5);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn test_random_walk_mostly_not_rejected() {
        let rejected = (0..20)
            .filter(|&seed| adf_test(&random_walk(seed, 300)).unwrap().p_value < 0.01)
            .count();
        assert!(rejected <= 3, "rejected {rejected} of 20 random walks");
    }

    #[test]
    fn test_short_series_fails() {
        assert_eq!(
            adf_test(&[1.0, 2.0, 1.5]).unwrap_err(),
            AdfError::InsufficientSamples { len: 3 }
        );
    }

    #[test]
    fn test_constant_series_fails() {
        assert!(adf_test(&[4.0; 50]).is_err());
    }

    #[test]
    fn test_p_value_continuous_at_star() {
        let below = mackinnon_p_value(TAU_STAR - 1e-9);
        let above = mackinnon_p_value(TAU_STAR + 1e-9);
        assert!((below - above).abs() < 0.01);
    }

    #[test]
    fn test_p_value_monotone() {
        let ps = [-6.0, -4.0, -3.0, -2.0, -1.0, 0.0, 1.0]
            .map(mackinnon_p_value);
        assert!(ps.is_sorted());
    }
}
