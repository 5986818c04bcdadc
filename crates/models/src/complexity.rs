//! Differentiable size (parameter count) and ops (MAC count) bookkeeping.
//!
//! Counts cover weights only. Every count is a function of the effective
//! channel numbers, i.e. the sums of the gate masks, so it is differentiable
//! with respect to the gates and shrinks as channels die.

use crate::gate::GateMask;
use burn::tensor::{backend::Backend, ElementConversion, Tensor};
use std::collections::BTreeMap;

/// Output length of a convolution/pooling window along one axis, or `None`
/// when the padded input is shorter than the kernel.
pub fn conv_out(input: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

#[derive(Debug, Clone)]
pub struct ComplexityDescriptor<B: Backend> {
    /// Alive parameter count, shape `[1]`.
    pub size: Tensor<B, 1>,
    /// Multiply-accumulate count for one sample, shape `[1]`.
    pub ops: Tensor<B, 1>,
    pub alive_channels: usize,
    pub channels: usize,
}

impl<B: Backend> ComplexityDescriptor<B> {
    /// Dense convolution: `cin * cout * kh * kw` weights applied at every output position.
    pub fn conv(
        input: Tensor<B, 1>,
        output: &GateMask<B>,
        kernel: [usize; 2],
        out_hw: [usize; 2],
    ) -> Self {
        let size = input * output.effective() * (kernel[0] * kernel[1]) as f32;
        Self::spatial(size, output, out_hw)
    }

    /// Depthwise convolution over the channels `channels` keeps alive.
    pub fn depthwise(channels: &GateMask<B>, kernel: [usize; 2], out_hw: [usize; 2]) -> Self {
        let size = channels.effective() * (kernel[0] * kernel[1]) as f32;
        Self::spatial(size, channels, out_hw)
    }

    pub fn linear(input: Tensor<B, 1>, output: &GateMask<B>) -> Self {
        let size = input * output.effective();
        Self {
            ops: size.clone(),
            size,
            alive_channels: output.alive(),
            channels: output.channels(),
        }
    }

    fn spatial(size: Tensor<B, 1>, output: &GateMask<B>, out_hw: [usize; 2]) -> Self {
        let ops = size.clone() * (out_hw[0] * out_hw[1]) as f32;
        Self {
            size,
            ops,
            alive_channels: output.alive(),
            channels: output.channels(),
        }
    }

    pub fn size_value(&self) -> f64 {
        scalar(&self.size)
    }

    pub fn ops_value(&self) -> f64 {
        scalar(&self.ops)
    }
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

/// Per-layer descriptors in network order.
#[derive(Debug, Clone)]
pub struct ComplexityReport<B: Backend> {
    layers: Vec<(String, ComplexityDescriptor<B>)>,
    device: B::Device,
}

impl<B: Backend> ComplexityReport<B> {
    pub fn new(device: &B::Device) -> Self {
        Self {
            layers: Vec::new(),
            device: device.clone(),
        }
    }

    pub fn push(&mut self, layer: impl Into<String>, descriptor: ComplexityDescriptor<B>) {
        self.layers.push((layer.into(), descriptor));
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, layer: &str) -> Option<&ComplexityDescriptor<B>> {
        self.layers
            .iter()
            .find(|(name, _)| name == layer)
            .map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComplexityDescriptor<B>)> {
        self.layers.iter().map(|(name, d)| (name.as_str(), d))
    }

    pub fn total_size(&self) -> Tensor<B, 1> {
        self.layers
            .iter()
            .fold(Tensor::zeros([1], &self.device), |acc, (_, d)| {
                acc + d.size.clone()
            })
    }

    pub fn total_ops(&self) -> Tensor<B, 1> {
        self.layers
            .iter()
            .fold(Tensor::zeros([1], &self.device), |acc, (_, d)| {
                acc + d.ops.clone()
            })
    }

    pub fn size_value(&self) -> f64 {
        scalar(&self.total_size())
    }

    pub fn ops_value(&self) -> f64 {
        scalar(&self.total_ops())
    }

    pub fn alive_channels(&self) -> BTreeMap<String, usize> {
        self.layers
            .iter()
            .map(|(name, d)| (name.clone(), d.alive_channels))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ChannelGate;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn conv_out_matches_formula() {
        assert_eq!(conv_out(28, 3, 1, 0), Some(26));
        assert_eq!(conv_out(49, 10, 2, 5), Some(25));
        assert_eq!(conv_out(10, 4, 2, 1), Some(5));
        assert_eq!(conv_out(2, 3, 1, 0), None);
    }

    #[test]
    fn conv_counts_alive_channels_only() {
        let device = Default::default();
        let out = ChannelGate::<B>::new(4, &device)
            .with_values("g", &[1.0, 1.0, 0.0, 0.0])
            .unwrap()
            .mask();
        let input = Tensor::<B, 1>::from_floats([3.0], &device);
        let d = ComplexityDescriptor::conv(input, &out, [3, 3], [5, 5]);
        assert_eq!(d.size_value(), (3 * 2 * 9) as f64);
        assert_eq!(d.ops_value(), (3 * 2 * 9 * 25) as f64);
        assert_eq!(d.alive_channels, 2);
        assert_eq!(d.channels, 4);
    }

    #[test]
    fn report_sums_layers() {
        let device = Default::default();
        let dense = GateMask::<B>::dense(2, &device);
        let mut report = ComplexityReport::new(&device);
        assert_eq!(report.size_value(), 0.0);
        report.push(
            "a",
            ComplexityDescriptor::linear(Tensor::from_floats([4.0], &device), &dense),
        );
        report.push("b", ComplexityDescriptor::depthwise(&dense, [3, 3], [2, 2]));
        assert_eq!(report.size_value(), 8.0 + 18.0);
        assert_eq!(report.ops_value(), 8.0 + 72.0);
        assert_eq!(report.alive_channels().get("b"), Some(&2));
        assert!(report.get("c").is_none());
    }
}
