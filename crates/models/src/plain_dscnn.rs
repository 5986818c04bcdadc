//! `plain_dscnn`: strided conv stem, four depthwise-separable blocks, global
//! average pool, linear classifier.
//!
//! Only the stem and the pointwise convolutions own gates. Each depthwise
//! convolution reuses the mask of the layer feeding it, since a depthwise
//! channel cannot outlive its input channel.

use crate::complexity::{ComplexityDescriptor, ComplexityReport};
use crate::error::{ModelError, ModelResult};
use crate::gate::{GateMask, GateMode};
use crate::layers::{ConvGeometry, DepthwiseConv2d, GatedConv2d};
use crate::registry::{
    check_options, unknown_layer, Architecture, ModelOptions, SearchOutput, SearchableModel,
};
use burn::module::{Ignored, Module};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::{backend::Backend, Tensor};

const CHANNELS: usize = 64;
const BLOCKS: usize = 4;
const STEM_KERNEL: [usize; 2] = [10, 4];
const STEM_STRIDE: [usize; 2] = [2, 2];
const STEM_PADDING: [usize; 2] = [5, 1];
const GATES: [&str; 5] = ["conv1", "pw1", "pw2", "pw3", "pw4"];
const DEPTHWISE: [&str; BLOCKS] = ["dw1", "dw2", "dw3", "dw4"];

#[derive(Module, Debug)]
pub struct SeparableBlock<B: Backend> {
    depthwise: DepthwiseConv2d<B>,
    pointwise: GatedConv2d<B>,
}

impl<B: Backend> SeparableBlock<B> {
    fn new(device: &B::Device) -> Self {
        Self {
            depthwise: DepthwiseConv2d::new(CHANNELS, [3, 3], [1, 1], device),
            pointwise: GatedConv2d::new(ConvGeometry::new([CHANNELS, CHANNELS], [1, 1]), device),
        }
    }

    fn fixed(self) -> Self {
        Self {
            pointwise: self.pointwise.fixed(),
            ..self
        }
    }
}

#[derive(Module, Debug)]
pub struct PlainDscnn<B: Backend> {
    conv1: GatedConv2d<B>,
    blocks: Vec<SeparableBlock<B>>,
    pool: AdaptiveAvgPool2d,
    fc: Linear<B>,
    options: Ignored<ModelOptions>,
    feature_hw: Ignored<[usize; 2]>,
}

impl<B: Backend> PlainDscnn<B> {
    /// Stem mask followed by one mask per pointwise layer.
    fn masks(&self) -> Vec<GateMask<B>> {
        std::iter::once(self.conv1.gate.mask())
            .chain(self.blocks.iter().map(|b| b.pointwise.gate.mask()))
            .collect()
    }

    fn report(&self, masks: &[GateMask<B>], device: &B::Device) -> ComplexityReport<B> {
        let options = self.options.0;
        let hw = self.feature_hw.0;
        let input = Tensor::<B, 1>::from_floats([options.input_shape[0] as f32], device);
        let classes = GateMask::dense(options.num_classes, device);

        let mut report = ComplexityReport::new(device);
        report.push("conv1", self.conv1.complexity(input, &masks[0], hw));
        for (i, block) in self.blocks.iter().enumerate() {
            let upstream = &masks[i];
            report.push(DEPTHWISE[i], block.depthwise.complexity(upstream, hw));
            report.push(
                GATES[i + 1],
                block
                    .pointwise
                    .complexity(upstream.effective(), &masks[i + 1], hw),
            );
        }
        report.push(
            "fc",
            ComplexityDescriptor::linear(masks[BLOCKS].effective(), &classes),
        );
        report
    }

    fn gate_index(layer: &str) -> ModelResult<usize> {
        GATES
            .iter()
            .position(|name| *name == layer)
            .ok_or_else(|| unknown_layer(Architecture::PlainDscnn, layer))
    }
}

fn stem_geometry(c_in: usize) -> ConvGeometry {
    ConvGeometry::new([c_in, CHANNELS], STEM_KERNEL)
        .with_stride(STEM_STRIDE)
        .with_padding(STEM_PADDING)
}

impl<B: Backend> SearchableModel<B> for PlainDscnn<B> {
    const ARCHITECTURE: Architecture = Architecture::PlainDscnn;

    fn build(options: &ModelOptions, device: &B::Device) -> ModelResult<Self> {
        check_options(Self::ARCHITECTURE, options)?;
        let stem = stem_geometry(options.input_shape[0]);
        // Depthwise and pointwise layers preserve the stem's spatial size.
        let feature_hw = stem
            .output_hw(options.input_hw())
            .ok_or(ModelError::InputTooSmall {
                arch: Self::ARCHITECTURE,
                layer: "conv1",
                input: options.input_shape,
            })?;
        Ok(Self {
            conv1: GatedConv2d::new(stem, device),
            blocks: (0..BLOCKS).map(|_| SeparableBlock::new(device)).collect(),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(CHANNELS, options.num_classes).init(device),
            options: Ignored(*options),
            feature_hw: Ignored(feature_hw),
        })
    }

    fn options(&self) -> ModelOptions {
        self.options.0
    }

    fn forward(&self, input: Tensor<B, 4>) -> SearchOutput<B> {
        let device = input.device();
        let masks = self.masks();
        let mut x = relu(self.conv1.forward(input, &masks[0]));
        for (i, block) in self.blocks.iter().enumerate() {
            x = relu(block.depthwise.forward(x, &masks[i]));
            x = relu(block.pointwise.forward(x, &masks[i + 1]));
        }
        let x = self.pool.forward(x).flatten::<2>(1, 3);
        SearchOutput {
            logits: self.fc.forward(x),
            complexity: self.report(&masks, &device),
        }
    }

    fn complexity(&self) -> ComplexityReport<B> {
        let device = self.fc.weight.val().device();
        self.report(&self.masks(), &device)
    }

    fn into_fine_tune(self) -> Self {
        Self {
            conv1: self.conv1.fixed(),
            blocks: self.blocks.into_iter().map(SeparableBlock::fixed).collect(),
            ..self
        }
    }

    fn is_fine_tune(&self) -> bool {
        self.conv1.gate.mode() == GateMode::Fixed
    }

    fn gate_names(&self) -> Vec<&'static str> {
        GATES.to_vec()
    }

    fn gate_values(&self, layer: &str) -> ModelResult<Vec<f32>> {
        Ok(match Self::gate_index(layer)? {
            0 => self.conv1.gate.alpha_values(),
            i => self.blocks[i - 1].pointwise.gate.alpha_values(),
        })
    }

    fn with_gate_values(mut self, layer: &str, values: &[f32]) -> ModelResult<Self> {
        match Self::gate_index(layer)? {
            0 => self.conv1.gate = self.conv1.gate.with_values(layer, values)?,
            i => {
                let block = &mut self.blocks[i - 1];
                let gate = block.pointwise.gate.clone().with_values(layer, values)?;
                block.pointwise.gate = gate;
            }
        }
        Ok(self)
    }
}
