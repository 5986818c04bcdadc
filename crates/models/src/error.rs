use crate::registry::Architecture;
use burn::record::RecorderError;
use std::path::PathBuf;
use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{arch}: input {input:?} is too small for layer {layer}")]
    InputTooSmall {
        arch: Architecture,
        layer: &'static str,
        input: [usize; 3],
    },
    #[error("num_classes must be at least 1")]
    NoClasses,
    #[error("{arch} has no gated layer named {layer:?}")]
    UnknownLayer { arch: Architecture, layer: String },
    #[error("gate {layer} has {expected} channels, got {actual} values")]
    GateLength {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("failed to load searched model from {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },
}
