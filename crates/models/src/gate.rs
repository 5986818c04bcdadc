//! Learnable per-channel gates.
//!
//! Each gated layer owns one `alpha` per output channel. A channel is alive
//! while `|alpha| > ALIVE_THRESHOLD`; the mask multiplied into the layer
//! output is the hard 0/1 indicator. During search the indicator is made
//! differentiable with a straight-through estimator, so the classification
//! loss and the complexity penalty both push on `alpha`.

use crate::error::{ModelError, ModelResult};
use burn::module::{Ignored, Module, Param};
use burn::tensor::{backend::Backend, Tensor, TensorData};

pub const ALIVE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Mask follows `alpha` and passes gradients to it.
    Search,
    /// Mask is frozen at the values `alpha` held when the mode was set.
    Fixed,
}

#[derive(Module, Debug)]
pub struct ChannelGate<B: Backend> {
    alpha: Param<Tensor<B, 1>>,
    mode: Ignored<GateMode>,
}

impl<B: Backend> ChannelGate<B> {
    pub fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            alpha: Param::from_tensor(Tensor::ones([channels], device)),
            mode: Ignored(GateMode::Search),
        }
    }

    pub fn channels(&self) -> usize {
        self.alpha.val().dims()[0]
    }

    pub fn mode(&self) -> GateMode {
        self.mode.0
    }

    pub fn fixed(self) -> Self {
        Self {
            alpha: self.alpha,
            mode: Ignored(GateMode::Fixed),
        }
    }

    pub fn alpha_values(&self) -> Vec<f32> {
        self.alpha.val().to_data().iter::<f32>().collect()
    }

    /// Replace every `alpha` with `values`, keeping the mode.
    pub fn with_values(self, layer: &str, values: &[f32]) -> ModelResult<Self> {
        let channels = self.channels();
        if values.len() != channels {
            return Err(ModelError::GateLength {
                layer: layer.to_string(),
                expected: channels,
                actual: values.len(),
            });
        }
        let device = self.alpha.val().device();
        let tensor = Tensor::from_data(TensorData::new(values.to_vec(), [channels]), &device);
        Ok(Self {
            alpha: Param::from_tensor(tensor),
            mode: self.mode,
        })
    }

    pub fn mask(&self) -> GateMask<B> {
        let alpha = self.alpha.val();
        let device = alpha.device();
        // Channel 0 never dies so a layer always feeds its successor.
        let hard: Vec<f32> = alpha
            .to_data()
            .iter::<f32>()
            .enumerate()
            .map(|(i, a)| {
                if i == 0 || a.abs() > ALIVE_THRESHOLD {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let channels = hard.len();
        let alive = hard.iter().filter(|v| **v > 0.0).count();
        let hard = Tensor::<B, 1>::from_data(TensorData::new(hard, [channels]), &device);
        let values = match self.mode() {
            GateMode::Search => {
                let soft = alpha.abs();
                hard + soft.clone() - soft.detach()
            }
            GateMode::Fixed => hard,
        };
        GateMask {
            values,
            alive,
            channels,
        }
    }
}

/// A channel mask evaluated for one forward pass.
#[derive(Debug, Clone)]
pub struct GateMask<B: Backend> {
    values: Tensor<B, 1>,
    alive: usize,
    channels: usize,
}

impl<B: Backend> GateMask<B> {
    /// All-ones mask for an ungated tensor (network input, classifier output).
    pub fn dense(channels: usize, device: &B::Device) -> Self {
        Self {
            values: Tensor::ones([channels], device),
            alive: channels,
            channels,
        }
    }

    pub fn values(&self) -> Tensor<B, 1> {
        self.values.clone()
    }

    pub fn alive(&self) -> usize {
        self.alive
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Differentiable alive-channel count, shape `[1]`.
    pub fn effective(&self) -> Tensor<B, 1> {
        self.values.clone().sum()
    }

    /// Scale `[B, C, H, W]` activations channel-wise.
    pub fn apply_spatial(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        x * self.values.clone().reshape([1, self.channels, 1, 1])
    }

    /// Scale `[B, F]` activations feature-wise.
    pub fn apply_features(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        x * self.values.clone().reshape([1, self.channels])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;
    type AD = Autodiff<NdArray<f32>>;

    fn host(t: Tensor<B, 1>) -> Vec<f32> {
        t.to_data().iter::<f32>().collect()
    }

    #[test]
    fn fresh_gate_keeps_everything() {
        let device = Default::default();
        let gate = ChannelGate::<B>::new(4, &device);
        let mask = gate.mask();
        assert_eq!(mask.alive(), 4);
        assert_eq!(host(mask.values()), vec![1.0; 4]);
    }

    #[test]
    fn threshold_and_first_channel() {
        let device = Default::default();
        let gate = ChannelGate::<B>::new(4, &device)
            .with_values("g", &[0.1, -0.9, 0.5, 0.2])
            .unwrap();
        let mask = gate.mask();
        assert_eq!(host(mask.values()), vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(mask.alive(), 2);
        assert_eq!(host(mask.effective()), vec![2.0]);
    }

    #[test]
    fn wrong_length_rejected() {
        let device = Default::default();
        let err = ChannelGate::<B>::new(3, &device)
            .with_values("conv1", &[1.0])
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::GateLength {
                expected: 3,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn search_mode_passes_gradient_to_alpha() {
        let device = Default::default();
        let gate = ChannelGate::<AD>::new(3, &device)
            .with_values("g", &[1.0, -2.0, 0.1])
            .unwrap();
        let loss = gate.mask().effective();
        let grads = loss.backward();
        let grad = gate.alpha.grad(&grads).expect("alpha has a gradient");
        let grad: Vec<f32> = grad.to_data().iter::<f32>().collect();
        assert_eq!(grad, vec![1.0, -1.0, 1.0]);
    }

    #[test]
    fn fixed_mode_blocks_gradient() {
        let device = Default::default();
        let gate = ChannelGate::<AD>::new(3, &device).fixed();
        assert_eq!(gate.mode(), GateMode::Fixed);
        let x = Tensor::<AD, 2>::ones([2, 3], &device).require_grad();
        let loss = gate.mask().apply_features(x.clone()).sum();
        let grads = loss.backward();
        assert!(gate.alpha.grad(&grads).is_none());
        assert!(x.grad(&grads).is_some());
    }
}
