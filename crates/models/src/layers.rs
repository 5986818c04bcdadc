//! Layers that carry their own geometry so they can report complexity.

use crate::complexity::{conv_out, ComplexityDescriptor};
use crate::gate::{ChannelGate, GateMask};
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::{backend::Backend, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub channels: [usize; 2],
    pub kernel: [usize; 2],
    pub stride: [usize; 2],
    pub padding: [usize; 2],
    pub groups: usize,
}

impl ConvGeometry {
    pub fn new(channels: [usize; 2], kernel: [usize; 2]) -> Self {
        Self {
            channels,
            kernel,
            stride: [1, 1],
            padding: [0, 0],
            groups: 1,
        }
    }

    pub fn with_stride(mut self, stride: [usize; 2]) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: [usize; 2]) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn output_hw(&self, input_hw: [usize; 2]) -> Option<[usize; 2]> {
        Some([
            conv_out(input_hw[0], self.kernel[0], self.stride[0], self.padding[0])?,
            conv_out(input_hw[1], self.kernel[1], self.stride[1], self.padding[1])?,
        ])
    }

    fn init<B: Backend>(&self, device: &B::Device) -> Conv2d<B> {
        Conv2dConfig::new(self.channels, self.kernel)
            .with_stride(self.stride)
            .with_padding(PaddingConfig2d::Explicit(self.padding[0], self.padding[1]))
            .with_groups(self.groups)
            .init(device)
    }
}

/// Dense convolution whose output channels are gated.
#[derive(Module, Debug)]
pub struct GatedConv2d<B: Backend> {
    conv: Conv2d<B>,
    pub gate: ChannelGate<B>,
    geometry: Ignored<ConvGeometry>,
}

impl<B: Backend> GatedConv2d<B> {
    pub fn new(geometry: ConvGeometry, device: &B::Device) -> Self {
        Self {
            conv: geometry.init(device),
            gate: ChannelGate::new(geometry.channels[1], device),
            geometry: Ignored(geometry),
        }
    }

    pub fn geometry(&self) -> ConvGeometry {
        self.geometry.0
    }

    pub fn fixed(self) -> Self {
        Self {
            gate: self.gate.fixed(),
            ..self
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>, mask: &GateMask<B>) -> Tensor<B, 4> {
        mask.apply_spatial(self.conv.forward(x))
    }

    /// `input` is the effective input channel count.
    pub fn complexity(
        &self,
        input: Tensor<B, 1>,
        mask: &GateMask<B>,
        out_hw: [usize; 2],
    ) -> ComplexityDescriptor<B> {
        ComplexityDescriptor::conv(input, mask, self.geometry.0.kernel, out_hw)
    }
}

/// Depthwise convolution; its channels follow the gate of the layer feeding it.
#[derive(Module, Debug)]
pub struct DepthwiseConv2d<B: Backend> {
    conv: Conv2d<B>,
    geometry: Ignored<ConvGeometry>,
}

impl<B: Backend> DepthwiseConv2d<B> {
    pub fn new(channels: usize, kernel: [usize; 2], padding: [usize; 2], device: &B::Device) -> Self {
        let geometry = ConvGeometry::new([channels, channels], kernel)
            .with_padding(padding)
            .with_groups(channels);
        Self {
            conv: geometry.init(device),
            geometry: Ignored(geometry),
        }
    }

    pub fn geometry(&self) -> ConvGeometry {
        self.geometry.0
    }

    /// The upstream mask is reapplied so biases of pruned channels stay silent.
    pub fn forward(&self, x: Tensor<B, 4>, upstream: &GateMask<B>) -> Tensor<B, 4> {
        upstream.apply_spatial(self.conv.forward(x))
    }

    pub fn complexity(&self, upstream: &GateMask<B>, out_hw: [usize; 2]) -> ComplexityDescriptor<B> {
        ComplexityDescriptor::depthwise(upstream, self.geometry.0.kernel, out_hw)
    }
}

#[derive(Module, Debug)]
pub struct GatedLinear<B: Backend> {
    linear: Linear<B>,
    pub gate: ChannelGate<B>,
}

impl<B: Backend> GatedLinear<B> {
    pub fn new(d_input: usize, d_output: usize, device: &B::Device) -> Self {
        Self {
            linear: LinearConfig::new(d_input, d_output).init(device),
            gate: ChannelGate::new(d_output, device),
        }
    }

    pub fn fixed(self) -> Self {
        Self {
            gate: self.gate.fixed(),
            ..self
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>, mask: &GateMask<B>) -> Tensor<B, 2> {
        mask.apply_features(self.linear.forward(x))
    }

    pub fn complexity(&self, input: Tensor<B, 1>, mask: &GateMask<B>) -> ComplexityDescriptor<B> {
        ComplexityDescriptor::linear(input, mask)
    }
}
