//! Core types and error definitions for burn_dataset.

use burn::tensor::{backend::Backend, Int, Tensor};
use data_contracts::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid split at {path}: {source}")]
    InvalidSplit {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("splits disagree on {what}: train has {train:?}, {split} has {other:?}")]
    IncompatibleSplits {
        what: &'static str,
        split: &'static str,
        train: Vec<usize>,
        other: Vec<usize>,
    },
    #[error("batch size must be at least 1")]
    EmptyBatchSize,
    #[error("{0}")]
    Other(String),
}

/// One assembled mini-batch.
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// `[batch, C, H, W]`
    pub inputs: Tensor<B, 4>,
    /// `[batch]` class indices.
    pub targets: Tensor<B, 1, Int>,
    /// Host copy of `targets`, used for accuracy counting without a device read.
    pub labels: Vec<i64>,
}

impl<B: Backend> ClassificationBatch<B> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
