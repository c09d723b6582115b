use candle_core::{Device, Result, Tensor};
use ndarray::{ArrayBase, Data, Dimension};
use tnc_neighborhood::Batch;

/// Copies an `f32` array onto `device`, keeping its shape.
pub(crate) fn to_tensor<S, D>(array: &ArrayBase<S, D>, device: &Device) -> Result<Tensor>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    Tensor::from_vec(array.iter().copied().collect::<Vec<_>>(), array.shape(), device)
}

/// A sampled batch laid out for one discriminator pass.
///
/// Each anchor is repeated once per positive (and negative) so that the three
/// tensors line up row by row: `[batch · mc_sample_size, channel, feature, window_size]`.
#[derive(Debug, Clone)]
pub struct BatchTensors {
    pub anchors: Tensor,
    pub positives: Tensor,
    pub negatives: Tensor,
}

impl BatchTensors {
    pub fn new(batch: &Batch, device: &Device) -> Result<Self> {
        let (b, mc, c, f, w) = batch.positives.dim();
        let anchors = to_tensor(&batch.anchors, device)?
            .unsqueeze(1)?
            .broadcast_as((b, mc, c, f, w))?
            .reshape((b * mc, c, f, w))?;
        let positives = to_tensor(&batch.positives, device)?.reshape((b * mc, c, f, w))?;
        let negatives = to_tensor(&batch.negatives, device)?.reshape((b * mc, c, f, w))?;
        Ok(Self {
            anchors,
            positives,
            negatives,
        })
    }
}
