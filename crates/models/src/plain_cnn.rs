//! `plain_cnn`: conv(32) → conv(64) → maxpool → fc(128) → fc(classes).

use crate::complexity::{ComplexityDescriptor, ComplexityReport};
use crate::error::{ModelError, ModelResult};
use crate::gate::{GateMask, GateMode};
use crate::layers::{ConvGeometry, GatedConv2d, GatedLinear};
use crate::registry::{
    check_options, unknown_layer, Architecture, ModelOptions, SearchOutput, SearchableModel,
};
use burn::module::{Ignored, Module};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::activation::relu;
use burn::tensor::{backend::Backend, Tensor};

const CONV1_CHANNELS: usize = 32;
const CONV2_CHANNELS: usize = 64;
const HIDDEN: usize = 128;
const GATES: [&str; 3] = ["conv1", "conv2", "fc1"];

/// Spatial sizes after each stage for the configured input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shapes {
    pub conv1_hw: [usize; 2],
    pub conv2_hw: [usize; 2],
    pub pooled_hw: [usize; 2],
}

#[derive(Module, Debug)]
pub struct PlainCnn<B: Backend> {
    conv1: GatedConv2d<B>,
    conv2: GatedConv2d<B>,
    pool: MaxPool2d,
    dropout1: Dropout,
    fc1: GatedLinear<B>,
    dropout2: Dropout,
    fc2: Linear<B>,
    options: Ignored<ModelOptions>,
    shapes: Ignored<Shapes>,
}

struct Masks<B: Backend> {
    conv1: GateMask<B>,
    conv2: GateMask<B>,
    fc1: GateMask<B>,
}

impl<B: Backend> PlainCnn<B> {
    fn masks(&self) -> Masks<B> {
        Masks {
            conv1: self.conv1.gate.mask(),
            conv2: self.conv2.gate.mask(),
            fc1: self.fc1.gate.mask(),
        }
    }

    fn report(&self, masks: &Masks<B>, device: &B::Device) -> ComplexityReport<B> {
        let shapes = self.shapes.0;
        let options = self.options.0;
        let [ph, pw] = shapes.pooled_hw;
        let input = Tensor::<B, 1>::from_floats([options.input_shape[0] as f32], device);
        let classes = GateMask::dense(options.num_classes, device);

        let mut report = ComplexityReport::new(device);
        report.push(
            "conv1",
            self.conv1.complexity(input, &masks.conv1, shapes.conv1_hw),
        );
        report.push(
            "conv2",
            self.conv2
                .complexity(masks.conv1.effective(), &masks.conv2, shapes.conv2_hw),
        );
        report.push(
            "fc1",
            self.fc1
                .complexity(masks.conv2.effective() * (ph * pw) as f32, &masks.fc1),
        );
        report.push(
            "fc2",
            ComplexityDescriptor::linear(masks.fc1.effective(), &classes),
        );
        report
    }
}

fn shapes_for(options: &ModelOptions) -> ModelResult<Shapes> {
    let too_small = |layer| ModelError::InputTooSmall {
        arch: Architecture::PlainCnn,
        layer,
        input: options.input_shape,
    };
    let conv1_hw = conv_geometry(options.input_shape[0], CONV1_CHANNELS)
        .output_hw(options.input_hw())
        .ok_or_else(|| too_small("conv1"))?;
    let conv2_hw = conv_geometry(CONV1_CHANNELS, CONV2_CHANNELS)
        .output_hw(conv1_hw)
        .ok_or_else(|| too_small("conv2"))?;
    let pooled_hw = [conv2_hw[0] / 2, conv2_hw[1] / 2];
    if pooled_hw.contains(&0) {
        return Err(too_small("pool"));
    }
    Ok(Shapes {
        conv1_hw,
        conv2_hw,
        pooled_hw,
    })
}

fn conv_geometry(c_in: usize, c_out: usize) -> ConvGeometry {
    ConvGeometry::new([c_in, c_out], [3, 3])
}

impl<B: Backend> SearchableModel<B> for PlainCnn<B> {
    const ARCHITECTURE: Architecture = Architecture::PlainCnn;

    fn build(options: &ModelOptions, device: &B::Device) -> ModelResult<Self> {
        check_options(Self::ARCHITECTURE, options)?;
        let shapes = shapes_for(options)?;
        let [ph, pw] = shapes.pooled_hw;
        Ok(Self {
            conv1: GatedConv2d::new(conv_geometry(options.input_shape[0], CONV1_CHANNELS), device),
            conv2: GatedConv2d::new(conv_geometry(CONV1_CHANNELS, CONV2_CHANNELS), device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout1: DropoutConfig::new(0.25).init(),
            fc1: GatedLinear::new(CONV2_CHANNELS * ph * pw, HIDDEN, device),
            dropout2: DropoutConfig::new(0.5).init(),
            fc2: LinearConfig::new(HIDDEN, options.num_classes).init(device),
            options: Ignored(*options),
            shapes: Ignored(shapes),
        })
    }

    fn options(&self) -> ModelOptions {
        self.options.0
    }

    fn forward(&self, input: Tensor<B, 4>) -> SearchOutput<B> {
        let device = input.device();
        let masks = self.masks();
        let x = relu(self.conv1.forward(input, &masks.conv1));
        let x = relu(self.conv2.forward(x, &masks.conv2));
        let x = self.dropout1.forward(self.pool.forward(x));
        let x = x.flatten::<2>(1, 3);
        let x = relu(self.fc1.forward(x, &masks.fc1));
        let logits = self.fc2.forward(self.dropout2.forward(x));
        SearchOutput {
            logits,
            complexity: self.report(&masks, &device),
        }
    }

    fn complexity(&self) -> ComplexityReport<B> {
        let device = self.fc2.weight.val().device();
        self.report(&self.masks(), &device)
    }

    fn into_fine_tune(self) -> Self {
        Self {
            conv1: self.conv1.fixed(),
            conv2: self.conv2.fixed(),
            fc1: self.fc1.fixed(),
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
        match layer {
            "conv1" => Ok(self.conv1.gate.alpha_values()),
            "conv2" => Ok(self.conv2.gate.alpha_values()),
            "fc1" => Ok(self.fc1.gate.alpha_values()),
            _ => Err(unknown_layer(Self::ARCHITECTURE, layer)),
        }
    }

    fn with_gate_values(mut self, layer: &str, values: &[f32]) -> ModelResult<Self> {
        match layer {
            "conv1" => self.conv1.gate = self.conv1.gate.with_values(layer, values)?,
            "conv2" => self.conv2.gate = self.conv2.gate.with_values(layer, values)?,
            "fc1" => self.fc1.gate = self.fc1.gate.with_values(layer, values)?,
            _ => return Err(unknown_layer(Self::ARCHITECTURE, layer)),
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn mnist_shapes() {
        let shapes = shapes_for(&Architecture::PlainCnn.default_options()).unwrap();
        assert_eq!(shapes.conv1_hw, [26, 26]);
        assert_eq!(shapes.conv2_hw, [24, 24]);
        assert_eq!(shapes.pooled_hw, [12, 12]);
    }

    #[test]
    fn full_model_size_matches_layer_formula() {
        let device = Default::default();
        let options = ModelOptions::new([1, 8, 8], 3);
        let model = PlainCnn::<B>::build(&options, &device).unwrap();
        // 8 -> 6 -> 4 -> pool 2
        let expected = 1 * 32 * 9 + 32 * 64 * 9 + 64 * 2 * 2 * 128 + 128 * 3;
        let report = model.complexity();
        assert_eq!(report.size_value(), expected as f64);
        let expected_ops = 1 * 32 * 9 * 36 + 32 * 64 * 9 * 16 + 64 * 4 * 128 + 128 * 3;
        assert_eq!(report.ops_value(), expected_ops as f64);
    }

    #[test]
    fn tiny_input_rejected() {
        let device = Default::default();
        let err = PlainCnn::<B>::build(&ModelOptions::new([1, 5, 5], 2), &device).unwrap_err();
        assert!(matches!(err, ModelError::InputTooSmall { layer: "pool", .. }));
    }

    #[test]
    fn pruning_shrinks_downstream_layers() {
        let device = Default::default();
        let options = ModelOptions::new([1, 8, 8], 2);
        let full = PlainCnn::<B>::build(&options, &device).unwrap();
        let before = full.complexity();
        let mut conv2 = vec![1.0; 64];
        conv2[32..].fill(0.0);
        let pruned = full.with_gate_values("conv2", &conv2).unwrap();
        let after = pruned.complexity();
        assert_eq!(after.alive_channels()["conv2"], 32);
        assert_eq!(
            after.get("fc1").unwrap().size_value(),
            before.get("fc1").unwrap().size_value() / 2.0
        );
        assert_eq!(
            after.get("conv1").unwrap().size_value(),
            before.get("conv1").unwrap().size_value()
        );
        assert!(after.ops_value() < before.ops_value());
    }

    #[test]
    fn unknown_gate_rejected() {
        let device = Default::default();
        let model = PlainCnn::<B>::build(&ModelOptions::new([1, 8, 8], 2), &device).unwrap();
        assert!(matches!(
            model.with_gate_values("fc2", &[1.0]),
            Err(ModelError::UnknownLayer { .. })
        ));
    }
}
