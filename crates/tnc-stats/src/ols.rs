use nalgebra::{DMatrix, DVector};

/// Ordinary least squares fit of `y = X β + ε`.
#[derive(Debug, Clone)]
pub(crate) struct OlsFit {
    pub(crate) params: DVector<f64>,
    pub(crate) std_errors: DVector<f64>,
    pub(crate) ssr: f64,
    pub(crate) nobs: usize,
}

impl OlsFit {
    /// Fits the regression through the normal equations.
    ///
    /// Returns `None` when there are no residual degrees of freedom or `XᵀX` is singular.
    #[expect(clippy::cast_precision_loss)]
    pub(crate) fn fit(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<Self> {
        let (nobs, k) = x.shape();
        if nobs <= k || y.len() != nobs {
            return None;
        }

        let xt = x.transpose();
        let xtx_inv = (&xt * x).try_inverse()?;
        let params = &xtx_inv * (&xt * y);
        let residuals = y - x * &params;
        let ssr = residuals.dot(&residuals);
        let sigma2 = ssr / (nobs - k) as f64;
        let std_errors = DVector::from_fn(k, |i, _| (sigma2 * xtx_inv[(i, i)]).sqrt());

        Some(Self {
            params,
            std_errors,
            ssr,
            nobs,
        })
    }

    pub(crate) fn t_value(&self, index: usize) -> f64 {
        self.params[index] / self.std_errors[index]
    }

    /// Akaike information criterion of the Gaussian log-likelihood.
    #[expect(clippy::cast_precision_loss)]
    pub(crate) fn aic(&self) -> f64 {
        let n = self.nobs as f64;
        let k = self.params.len() as f64;
        let llf = -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0);
        -2.0 * llf + 2.0 * k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::cast_precision_loss)]
    fn test_recovers_exact_line() {
        let x = DMatrix::from_fn(6, 2, |i, j| if j == 0 { 1.0 } else { i as f64 });
        let y = DVector::from_fn(6, |i, _| 2.0 + 0.5 * i as f64);
        let fit = OlsFit::fit(&x, &y).unwrap();
        assert!((fit.params[0] - 2.0).abs() < 1e-9);
        assert!((fit.params[1] - 0.5).abs() < 1e-9);
        assert!(fit.ssr < 1e-12);
    }

    #[test]
    fn test_rejects_underdetermined() {
        let x = DMatrix::from_element(2, 2, 1.0);
        let y = DVector::from_element(2, 1.0);
        assert!(OlsFit::fit(&x, &y).is_none());
    }
}
