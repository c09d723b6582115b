//! Window encoders.
//!
//! An encoder maps `[batch, channel, feature, window_size]` windows to
//! `[batch, encoding_size]` encodings. Channels and features are flattened into the
//! encoder's input features, so a missingness mask is seen as extra inputs.
//!
//! The available architectures form a closed set selected by [`EncoderConfig`]:
//!
//! - **MLP** - flattened window → hidden layer → encoding
//! - **RNN** - LSTM over time steps, last hidden state → encoding
//! - **CNN** - two same-padded 1-d convolutions, mean over time → encoding

use candle_core::{D, Device, Result, Tensor};
use candle_nn::{
    Conv1d, Conv1dConfig, LSTM, LSTMConfig, Linear, Module as _, RNN as _, VarBuilder,
};
use derive_more::IsVariant;
use ndarray::{Array2, Array4, Axis, s};
use serde::{Deserialize, Serialize};
use tnc_series::{Cohort, TimeSeries};

use crate::batch::to_tensor;

/// Validity of a sequence encoding whose window has no observed value.
pub const IMPUTED: i8 = -1;
/// Validity of a sequence encoding whose window has at least one observed value.
pub const OBSERVED: i8 = 0;

/// Windows encoded per forward pass in sequence mode.
const SEQUENCE_CHUNK: usize = 256;

/// The capability shared by all window encoders.
pub trait Encoder {
    fn input_shape(&self) -> InputShape;

    fn encoding_size(&self) -> usize;

    /// Encodes `[batch, channel, feature, window_size]` windows into
    /// `[batch, encoding_size]`.
    fn encode(&self, windows: &Tensor) -> Result<Tensor>;
}

/// Shape of the windows an encoder accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub channels: usize,
    pub features: usize,
    pub window_size: usize,
}

impl InputShape {
    #[must_use]
    pub fn of(cohort: &Cohort, window_size: usize) -> Self {
        Self {
            channels: cohort.num_channels(),
            features: cohort.num_features(),
            window_size,
        }
    }

    /// Number of per-timestep inputs (`channels · features`).
    #[must_use]
    pub fn flat_features(&self) -> usize {
        self.channels * self.features
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IsVariant)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncoderConfig {
    Mlp {
        hidden_size: usize,
        encoding_size: usize,
    },
    Rnn {
        hidden_size: usize,
        encoding_size: usize,
    },
    Cnn {
        channels: usize,
        kernel_size: usize,
        encoding_size: usize,
    },
}

impl EncoderConfig {
    /// Short name used in run names.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mlp { .. } => "mlp",
            Self::Rnn { .. } => "rnn",
            Self::Cnn { .. } => "cnn",
        }
    }

    #[must_use]
    pub fn encoding_size(&self) -> usize {
        match *self {
            Self::Mlp { encoding_size, .. }
            | Self::Rnn { encoding_size, .. }
            | Self::Cnn { encoding_size, .. } => encoding_size,
        }
    }

    pub fn build(&self, input: InputShape, vb: VarBuilder) -> Result<WindowEncoder> {
        let encoder = match *self {
            Self::Mlp {
                hidden_size,
                encoding_size,
            } => WindowEncoder::Mlp(MlpEncoder::new(input, hidden_size, encoding_size, vb)?),
            Self::Rnn {
                hidden_size,
                encoding_size,
            } => WindowEncoder::Rnn(RnnEncoder::new(input, hidden_size, encoding_size, vb)?),
            Self::Cnn {
                channels,
                kernel_size,
                encoding_size,
            } => WindowEncoder::Cnn(CnnEncoder::new(
                input,
                channels,
                kernel_size,
                encoding_size,
                vb,
            )?),
        };
        Ok(encoder)
    }
}

#[derive(Debug, Clone)]
pub enum WindowEncoder {
    Mlp(MlpEncoder),
    Rnn(RnnEncoder),
    Cnn(CnnEncoder),
}

impl Encoder for WindowEncoder {
    fn input_shape(&self) -> InputShape {
        match self {
            Self::Mlp(e) => e.input_shape(),
            Self::Rnn(e) => e.input_shape(),
            Self::Cnn(e) => e.input_shape(),
        }
    }

    fn encoding_size(&self) -> usize {
        match self {
            Self::Mlp(e) => e.encoding_size(),
            Self::Rnn(e) => e.encoding_size(),
            Self::Cnn(e) => e.encoding_size(),
        }
    }

    fn encode(&self, windows: &Tensor) -> Result<Tensor> {
        match self {
            Self::Mlp(e) => e.encode(windows),
            Self::Rnn(e) => e.encode(windows),
            Self::Cnn(e) => e.encode(windows),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MlpEncoder {
    input: InputShape,
    encoding_size: usize,
    hidden: Linear,
    output: Linear,
}

impl MlpEncoder {
    pub fn new(
        input: InputShape,
        hidden_size: usize,
        encoding_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let in_dim = input.flat_features() * input.window_size;
        Ok(Self {
            input,
            encoding_size,
            hidden: candle_nn::linear(in_dim, hidden_size, vb.pp("hidden"))?,
            output: candle_nn::linear(hidden_size, encoding_size, vb.pp("output"))?,
        })
    }
}

impl Encoder for MlpEncoder {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn encoding_size(&self) -> usize {
        self.encoding_size
    }

    fn encode(&self, windows: &Tensor) -> Result<Tensor> {
        let x = windows.flatten_from(1)?;
        let x = self.hidden.forward(&x)?.relu()?;
        self.output.forward(&x)
    }
}

#[derive(Debug, Clone)]
pub struct RnnEncoder {
    input: InputShape,
    encoding_size: usize,
    lstm: LSTM,
    output: Linear,
}

impl RnnEncoder {
    pub fn new(
        input: InputShape,
        hidden_size: usize,
        encoding_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            input,
            encoding_size,
            lstm: candle_nn::lstm(
                input.flat_features(),
                hidden_size,
                LSTMConfig::default(),
                vb.pp("lstm"),
            )?,
            output: candle_nn::linear(hidden_size, encoding_size, vb.pp("output"))?,
        })
    }
}

impl Encoder for RnnEncoder {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn encoding_size(&self) -> usize {
        self.encoding_size
    }

    fn encode(&self, windows: &Tensor) -> Result<Tensor> {
        // [batch, time, inputs]
        let x = windows.flatten(1, 2)?.transpose(1, 2)?.contiguous()?;
        let last = last_hidden(&self.lstm, &x)?;
        self.output.forward(&last)
    }
}

/// Final hidden state of `lstm` run over `[batch, time, inputs]`.
pub(crate) fn last_hidden(lstm: &LSTM, sequence: &Tensor) -> Result<Tensor> {
    let states = lstm.seq(sequence)?;
    match states.last() {
        Some(state) => Ok(state.h().clone()),
        None => candle_core::bail!("cannot run an LSTM over an empty sequence"),
    }
}

#[derive(Debug, Clone)]
pub struct CnnEncoder {
    input: InputShape,
    encoding_size: usize,
    conv1: Conv1d,
    conv2: Conv1d,
    output: Linear,
}

impl CnnEncoder {
    pub fn new(
        input: InputShape,
        channels: usize,
        kernel_size: usize,
        encoding_size: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let conv = Conv1dConfig {
            padding: kernel_size / 2,
            ..Default::default()
        };
        Ok(Self {
            input,
            encoding_size,
            conv1: candle_nn::conv1d(
                input.flat_features(),
                channels,
                kernel_size,
                conv,
                vb.pp("conv1"),
            )?,
            conv2: candle_nn::conv1d(channels, channels, kernel_size, conv, vb.pp("conv2"))?,
            output: candle_nn::linear(channels, encoding_size, vb.pp("output"))?,
        })
    }
}

impl Encoder for CnnEncoder {
    fn input_shape(&self) -> InputShape {
        self.input
    }

    fn encoding_size(&self) -> usize {
        self.encoding_size
    }

    fn encode(&self, windows: &Tensor) -> Result<Tensor> {
        // [batch, inputs, time]
        let x = windows.flatten(1, 2)?;
        let x = self.conv1.forward(&x)?.relu()?;
        let x = self.conv2.forward(&x)?.relu()?;
        self.output.forward(&x.mean(D::Minus1)?)
    }
}

/// Encodings of consecutive windows of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceEncoding {
    /// `[num_windows, encoding_size]`
    pub encodings: Array2<f32>,
    /// [`IMPUTED`] or [`OBSERVED`] per window.
    pub validity: Vec<i8>,
}

impl SequenceEncoding {
    #[must_use]
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }
}

/// Encodes the windows of `sample` starting every `sliding_gap` timesteps.
///
/// Windows start at `0, gap, 2·gap, ...` as long as they fit. A window whose mask
/// channel is all zero is marked [`IMPUTED`].
pub fn encode_sequence<E>(
    encoder: &E,
    sample: &TimeSeries,
    sliding_gap: usize,
    device: &Device,
) -> Result<SequenceEncoding>
where
    E: Encoder + ?Sized,
{
    assert!(sliding_gap > 0, "sliding_gap must be positive");
    let window_size = encoder.input_shape().window_size;
    let encoding_size = encoder.encoding_size();
    let starts = (0..=sample.len().saturating_sub(window_size))
        .step_by(sliding_gap)
        .filter(|start| start + window_size <= sample.len())
        .collect::<Vec<_>>();

    let values = sample.values();
    let mut rows = Vec::with_capacity(starts.len() * encoding_size);
    for chunk in starts.chunks(SEQUENCE_CHUNK) {
        let (channels, features, _) = values.dim();
        let mut windows = Array4::zeros((chunk.len(), channels, features, window_size));
        for (mut window, &start) in windows.axis_iter_mut(Axis(0)).zip(chunk) {
            window.assign(&values.slice(s![.., .., start..start + window_size]));
        }
        let encodings = encoder.encode(&to_tensor(&windows, device)?)?;
        rows.extend(encodings.flatten_all()?.to_vec1::<f32>()?);
    }

    let validity = starts
        .iter()
        .map(|&start| {
            if sample.is_fully_imputed(start, start + window_size) {
                IMPUTED
            } else {
                OBSERVED
            }
        })
        .collect();
    let encodings = Array2::from_shape_vec((starts.len(), encoding_size), rows)
        .map_err(candle_core::Error::wrap)?;
    Ok(SequenceEncoding {
        encodings,
        validity,
    })
}
