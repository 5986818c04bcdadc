//! Architecture table and the interface the training loops drive.

use crate::complexity::ComplexityReport;
use crate::error::{ModelError, ModelResult};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::{backend::Backend, Tensor};
use clap::ValueEnum;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Architecture {
    /// Two-conv MNIST classifier.
    #[value(name = "plain_cnn")]
    PlainCnn,
    /// Depthwise-separable keyword-spotting network.
    #[value(name = "plain_dscnn")]
    PlainDscnn,
}

impl Architecture {
    pub const ALL: [Architecture; 2] = [Architecture::PlainCnn, Architecture::PlainDscnn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::PlainCnn => "plain_cnn",
            Architecture::PlainDscnn => "plain_dscnn",
        }
    }

    /// Input shape and class count of the task the architecture was designed for.
    pub fn default_options(&self) -> ModelOptions {
        match self {
            Architecture::PlainCnn => ModelOptions {
                input_shape: [1, 28, 28],
                num_classes: 10,
            },
            Architecture::PlainDscnn => ModelOptions {
                input_shape: [1, 49, 10],
                num_classes: 12,
            },
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of one input sample `[C, H, W]` and number of output classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    pub input_shape: [usize; 3],
    pub num_classes: usize,
}

impl ModelOptions {
    pub fn new(input_shape: [usize; 3], num_classes: usize) -> Self {
        Self {
            input_shape,
            num_classes,
        }
    }

    pub fn input_hw(&self) -> [usize; 2] {
        [self.input_shape[1], self.input_shape[2]]
    }
}

/// What one forward pass produces.
#[derive(Debug, Clone)]
pub struct SearchOutput<B: Backend> {
    /// `[batch, num_classes]` unnormalised scores.
    pub logits: Tensor<B, 2>,
    pub complexity: ComplexityReport<B>,
}

pub trait SearchableModel<B: Backend>: Module<B> + Sized {
    const ARCHITECTURE: Architecture;

    fn build(options: &ModelOptions, device: &B::Device) -> ModelResult<Self>;

    fn options(&self) -> ModelOptions;

    /// Forward pass; complexity is recomputed from the current gates.
    fn forward(&self, input: Tensor<B, 4>) -> SearchOutput<B>;

    /// Complexity at the nominal input shape without running the network.
    fn complexity(&self) -> ComplexityReport<B>;

    /// Freeze every gate at its current mask.
    fn into_fine_tune(self) -> Self;

    fn is_fine_tune(&self) -> bool;

    /// Names of the gated layers, in network order.
    fn gate_names(&self) -> Vec<&'static str>;

    fn gate_values(&self, layer: &str) -> ModelResult<Vec<f32>>;

    fn with_gate_values(self, layer: &str, values: &[f32]) -> ModelResult<Self>;

    /// Rebuild a searched model from its checkpoint, with the mask frozen.
    fn load_searched(
        path: &Path,
        options: &ModelOptions,
        device: &B::Device,
    ) -> ModelResult<Self> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model = Self::build(options, device)?
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|source| ModelError::Record {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(model.into_fine_tune())
    }
}

pub(crate) fn unknown_layer(arch: Architecture, layer: &str) -> ModelError {
    ModelError::UnknownLayer {
        arch,
        layer: layer.to_string(),
    }
}

pub(crate) fn check_options(arch: Architecture, options: &ModelOptions) -> ModelResult<()> {
    if options.num_classes == 0 {
        return Err(ModelError::NoClasses);
    }
    if options.input_shape.contains(&0) {
        return Err(ModelError::InputTooSmall {
            arch,
            layer: "input",
            input: options.input_shape,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_as_cli_values() {
        for arch in Architecture::ALL {
            assert_eq!(Architecture::from_str(arch.as_str(), false), Ok(arch));
        }
        assert!(Architecture::from_str("resnet", false).is_err());
    }

    #[test]
    fn default_task_shapes() {
        assert_eq!(Architecture::PlainCnn.default_options().num_classes, 10);
        assert_eq!(Architecture::PlainDscnn.default_options().input_hw(), [49, 10]);
    }
}
