//! Channel-gated Burn models for complexity-aware architecture search.
//!
//! Every model here carries one learnable gate per prunable layer and reports
//! differentiable size/ops figures on each forward pass:
//! - `PlainCnn`: two-conv MNIST classifier.
//! - `PlainDscnn`: depthwise-separable keyword-spotting network.
//!
//! The `training` crate folds the reported complexity into its loss; models
//! themselves know nothing about optimizers or datasets.

pub mod complexity;
pub mod error;
pub mod gate;
pub mod layers;
pub mod plain_cnn;
pub mod plain_dscnn;
pub mod registry;

pub use complexity::{conv_out, ComplexityDescriptor, ComplexityReport};
pub use error::{ModelError, ModelResult};
pub use gate::{ChannelGate, GateMask, GateMode, ALIVE_THRESHOLD};
pub use plain_cnn::PlainCnn;
pub use plain_dscnn::PlainDscnn;
pub use registry::{Architecture, ModelOptions, SearchOutput, SearchableModel};

pub mod prelude {
    pub use super::{
        Architecture, ComplexityReport, ModelOptions, PlainCnn, PlainDscnn, SearchOutput,
        SearchableModel,
    };
}
