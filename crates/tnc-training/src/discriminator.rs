use candle_core::{D, Result, Tensor};
use candle_nn::{Dropout, Init, Linear, Module as _, VarBuilder};

/// Scores whether two encodings come from the same temporal neighborhood.
///
/// `[z_a, z_b]` (length `2·E`) → `Linear(4·E)` → ReLU → Dropout(0.5) → `Linear(1)`,
/// with Xavier-uniform weights.
#[derive(Debug, Clone)]
pub struct Discriminator {
    hidden: Linear,
    output: Linear,
    dropout: Dropout,
}

impl Discriminator {
    pub fn new(encoding_size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            hidden: xavier_linear(2 * encoding_size, 4 * encoding_size, vb.pp("hidden"))?,
            output: xavier_linear(4 * encoding_size, 1, vb.pp("output"))?,
            dropout: Dropout::new(0.5),
        })
    }

    /// Logits for pairs of `[N, E]` encodings, shape `[N]`.
    pub fn forward(&self, z_a: &Tensor, z_b: &Tensor, train: bool) -> Result<Tensor> {
        let x = Tensor::cat(&[z_a, z_b], D::Minus1)?;
        let x = self.hidden.forward(&x)?.relu()?;
        let x = self.dropout.forward(&x, train)?;
        self.output.forward(&x)?.squeeze(D::Minus1)
    }
}

#[expect(clippy::cast_precision_loss)]
fn xavier_linear(in_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Linear> {
    let bound = (6.0 / (in_dim + out_dim) as f64).sqrt();
    let weight = vb.get_with_hints(
        (out_dim, in_dim),
        "weight",
        Init::Uniform {
            lo: -bound,
            up: bound,
        },
    )?;
    let bias = vb.get_with_hints(out_dim, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};
    use candle_nn::{AdamW, Optimizer as _, ParamsAdamW, VarMap};
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg64Mcg;

    use super::*;
    use crate::loss::{ContrastiveObjective, discrimination_accuracy};

    /// Pairs whose second encoding sits at `+3` (neighbors) or `-3` (non-neighbors)
    /// along its first axis.
    fn separable_pairs(rng: &mut Pcg64Mcg, n: usize, sign: f32) -> (Tensor, Tensor) {
        let anchors = (0..n * 2)
            .map(|_| rng.random_range(-1.0..1.0))
            .collect::<Vec<f32>>();
        let others = (0..n)
            .flat_map(|_| [sign * 3.0 + rng.random_range(-0.5..0.5), rng.random_range(-1.0..1.0)])
            .collect::<Vec<f32>>();
        (
            Tensor::from_vec(anchors, (n, 2), &Device::Cpu).unwrap(),
            Tensor::from_vec(others, (n, 2), &Device::Cpu).unwrap(),
        )
    }

    #[test]
    fn test_output_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let discriminator = Discriminator::new(3, vb).unwrap();
        let z = Tensor::zeros((5, 3), DType::F32, &Device::Cpu).unwrap();
        let logits = discriminator.forward(&z, &z, false).unwrap();
        assert_eq!(logits.dims(), &[5]);
        // bias starts at zero
        assert_eq!(logits.to_vec1::<f32>().unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn test_learns_separable_pairs() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let (a_p, b_p) = separable_pairs(&mut rng, 128, 1.0);
        let (a_n, b_n) = separable_pairs(&mut rng, 128, -1.0);

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let discriminator = Discriminator::new(2, vb).unwrap();
        let params = ParamsAdamW {
            lr: 0.01,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(varmap.all_vars(), params).unwrap();
        let objective = ContrastiveObjective::Filtered;

        for _ in 0..100 {
            let d_p = discriminator.forward(&a_p, &b_p, true).unwrap();
            let d_n = discriminator.forward(&a_n, &b_n, true).unwrap();
            let loss = objective.loss(&d_p, &d_n).unwrap();
            optimizer.backward_step(&loss).unwrap();
        }

        let d_p = discriminator.forward(&a_p, &b_p, false).unwrap();
        let d_n = discriminator.forward(&a_n, &b_n, false).unwrap();
        let accuracy = discrimination_accuracy(&d_p, &d_n).unwrap();
        assert!(accuracy > 0.95, "accuracy {accuracy}");
    }
}
