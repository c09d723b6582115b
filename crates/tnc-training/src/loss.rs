//! Binary cross-entropy on logits and the contrastive objective.

use candle_core::{DType, Result, Tensor};
use tnc_neighborhood::NeighborhoodPolicy;

/// Mean binary cross-entropy between `logits` and `targets` in `{0, 1}`.
///
/// Computed from the logits without forming `sigmoid(x)`, so large logits do not
/// overflow. `pos_weight` multiplies the loss of positive targets.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor, pos_weight: Option<f64>) -> Result<Tensor> {
    // softplus(-x) = -log(sigmoid(x)) = log(1 + e^-|x|) + max(-x, 0)
    let softplus_neg = logits
        .abs()?
        .neg()?
        .exp()?
        .affine(1.0, 1.0)?
        .log()?
        .add(&logits.neg()?.relu()?)?;
    // softplus(x) = -log(1 - sigmoid(x))
    let softplus_pos = logits.add(&softplus_neg)?;

    let positive = targets.mul(&softplus_neg)?;
    let positive = match pos_weight {
        Some(weight) => positive.affine(weight, 0.0)?,
        None => positive,
    };
    let negative = targets.affine(-1.0, 1.0)?.mul(&softplus_pos)?;
    positive.add(&negative)?.mean_all()
}

/// How the discriminator scores are turned into a training loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContrastiveObjective {
    /// Negatives are treated as unlabeled: a fraction `w` of them is scored as
    /// positive, compensating for negatives that share the anchor's state.
    Debiased { w: f64 },
    /// Negatives were already filtered by correlation and are scored as negative.
    Filtered,
}

impl ContrastiveObjective {
    /// The objective matching `policy`; correlation-filtered sampling ignores `w`.
    #[must_use]
    pub fn new(policy: &NeighborhoodPolicy, w: f64) -> Self {
        if policy.filters_negatives() {
            Self::Filtered
        } else {
            Self::Debiased { w }
        }
    }

    /// Loss of positive logits `d_p` and negative logits `d_n`.
    ///
    /// - Debiased: `(BCE(d_p, 1) + w·BCE(d_n, 1) + (1 - w)·BCE(d_n, 0)) / 2`
    /// - Filtered: `(BCE(d_p, 1) + BCE(d_n, 0)) / 2`
    pub fn loss(&self, d_p: &Tensor, d_n: &Tensor) -> Result<Tensor> {
        let p_loss = bce_with_logits(d_p, &d_p.ones_like()?, None)?;
        let n_loss = bce_with_logits(d_n, &d_n.zeros_like()?, None)?;
        match *self {
            Self::Filtered => p_loss.add(&n_loss)?.affine(0.5, 0.0),
            Self::Debiased { w } => {
                let n_loss_u = bce_with_logits(d_n, &d_n.ones_like()?, None)?;
                p_loss
                    .add(&n_loss_u.affine(w, 0.0)?)?
                    .add(&n_loss.affine(1.0 - w, 0.0)?)?
                    .affine(0.5, 0.0)
            }
        }
    }
}

/// Mean of the fraction of positives scored above 0.5 and the fraction of negatives
/// scored below 0.5.
pub fn discrimination_accuracy(d_p: &Tensor, d_n: &Tensor) -> Result<f64> {
    // sigmoid(x) > 0.5 exactly when x > 0
    let p_acc = d_p.gt(0.0)?.to_dtype(DType::F32)?.mean_all()?.to_scalar::<f32>()?;
    let n_acc = d_n.lt(0.0)?.to_dtype(DType::F32)?.mean_all()?.to_scalar::<f32>()?;
    Ok(f64::from(p_acc + n_acc) / 2.0)
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    fn tensor(values: &[f32]) -> Tensor {
        Tensor::new(values, &Device::Cpu).unwrap()
    }

    fn scalar(t: &Tensor) -> f64 {
        f64::from(t.to_scalar::<f32>().unwrap())
    }

    #[test]
    fn test_bce_at_zero_logit() {
        let loss = bce_with_logits(&tensor(&[0.0, 0.0]), &tensor(&[1.0, 0.0]), None).unwrap();
        assert!((scalar(&loss) - std::f64::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn test_bce_is_stable_for_large_logits() {
        let loss = bce_with_logits(&tensor(&[200.0, -200.0]), &tensor(&[1.0, 0.0]), None).unwrap();
        assert!(scalar(&loss).abs() < 1e-6);
        let loss = bce_with_logits(&tensor(&[-200.0]), &tensor(&[1.0]), None).unwrap();
        assert!((scalar(&loss) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_pos_weight_scales_positive_terms_only() {
        let logits = tensor(&[0.3, -0.7]);
        let plain_pos = bce_with_logits(&logits, &tensor(&[1.0, 1.0]), None).unwrap();
        let weighted_pos = bce_with_logits(&logits, &tensor(&[1.0, 1.0]), Some(3.0)).unwrap();
        assert!((scalar(&weighted_pos) - 3.0 * scalar(&plain_pos)).abs() < 1e-5);

        let plain_neg = bce_with_logits(&logits, &tensor(&[0.0, 0.0]), None).unwrap();
        let weighted_neg = bce_with_logits(&logits, &tensor(&[0.0, 0.0]), Some(3.0)).unwrap();
        assert!((scalar(&weighted_neg) - scalar(&plain_neg)).abs() < 1e-6);
    }

    #[test]
    fn test_debiased_without_weight_is_plain_bce() {
        let d_p = tensor(&[1.5, -0.2, 0.7]);
        let d_n = tensor(&[-1.0, 0.4, 2.0]);
        let debiased = ContrastiveObjective::Debiased { w: 0.0 }.loss(&d_p, &d_n).unwrap();
        let filtered = ContrastiveObjective::Filtered.loss(&d_p, &d_n).unwrap();
        assert!((scalar(&debiased) - scalar(&filtered)).abs() < 1e-6);
    }

    #[test]
    fn test_filtered_policy_ignores_weight() {
        let policy = NeighborhoodPolicy::AcfPlus {
            in_threshold: 0.4,
            out_threshold: 0.4,
        };
        let d_p = tensor(&[0.5, 0.1]);
        let d_n = tensor(&[-0.3, 0.9]);
        let losses = [0.0, 0.2, 0.9]
            .map(|w| scalar(&ContrastiveObjective::new(&policy, w).loss(&d_p, &d_n).unwrap()));
        assert!(losses.iter().all(|l| (l - losses[0]).abs() < 1e-6));
        assert_eq!(ContrastiveObjective::new(&policy, 0.5), ContrastiveObjective::Filtered);
    }

    #[test]
    fn test_weight_moves_loss_toward_unlabeled_term() {
        let d_p = tensor(&[2.0]);
        let d_n = tensor(&[3.0]);
        let low = scalar(&ContrastiveObjective::Debiased { w: 0.0 }.loss(&d_p, &d_n).unwrap());
        let high = scalar(&ContrastiveObjective::Debiased { w: 1.0 }.loss(&d_p, &d_n).unwrap());
        // a confidently "positive" negative is cheap when negatives count as unlabeled
        assert!(high < low);
    }

    #[test]
    fn test_accuracy() {
        let acc = discrimination_accuracy(&tensor(&[1.0, 2.0, -1.0, 3.0]), &tensor(&[-1.0, -2.0]))
            .unwrap();
        assert!((acc - 0.875).abs() < 1e-9);
    }
}
