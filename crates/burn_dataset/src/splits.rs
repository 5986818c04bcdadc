//! Loading the train/val/test array splits a data directory holds.

use crate::adapter::ArrayDataset;
use crate::types::{DatasetError, DatasetResult};
use data_contracts::{ArraySplit, SplitKind};
use std::fs;
use std::path::Path;

/// The three datasets a run works with.
#[derive(Debug, Clone)]
pub struct SplitSet {
    pub train: ArrayDataset,
    pub val: ArrayDataset,
    pub test: ArrayDataset,
}

impl SplitSet {
    pub fn sample_shape(&self) -> [usize; 3] {
        self.train.sample_shape()
    }

    pub fn num_classes(&self) -> usize {
        self.train.num_classes()
    }
}

pub fn read_split(path: &Path) -> DatasetResult<ArraySplit> {
    let raw = fs::read(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let split: ArraySplit = serde_json::from_slice(&raw).map_err(|e| DatasetError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    split.validate().map_err(|e| DatasetError::InvalidSplit {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(split)
}

/// Load and validate one split from `dir`.
pub fn load_split(dir: &Path, kind: SplitKind) -> DatasetResult<ArrayDataset> {
    let split = read_split(&dir.join(kind.file_name()))?;
    tracing::debug!(split = kind.scope(), samples = split.len(), "loaded split");
    ArrayDataset::from_split(split)
}

/// Load all three splits and check they describe the same problem.
pub fn load_split_set(dir: &Path) -> DatasetResult<SplitSet> {
    let train = load_split(dir, SplitKind::Train)?;
    let val = load_split(dir, SplitKind::Validation)?;
    let test = load_split(dir, SplitKind::Test)?;
    for (name, other) in [("val", &val), ("test", &test)] {
        if other.sample_shape() != train.sample_shape() {
            return Err(DatasetError::IncompatibleSplits {
                what: "sample shape",
                split: name,
                train: train.sample_shape().to_vec(),
                other: other.sample_shape().to_vec(),
            });
        }
        if other.num_classes() != train.num_classes() {
            return Err(DatasetError::IncompatibleSplits {
                what: "class count",
                split: name,
                train: vec![train.num_classes()],
                other: vec![other.num_classes()],
            });
        }
    }
    tracing::info!(
        train = train.len(),
        val = val.len(),
        test = test.len(),
        shape = ?train.sample_shape(),
        classes = train.num_classes(),
        "loaded dataset splits from {}",
        dir.display()
    );
    Ok(SplitSet { train, val, test })
}

/// Write one split as JSON; the counterpart of [`read_split`] used by data
/// preparation and tests.
pub fn write_split(dir: &Path, kind: SplitKind, split: &ArraySplit) -> DatasetResult<()> {
    fs::create_dir_all(dir).map_err(|e| DatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = dir.join(kind.file_name());
    let json = serde_json::to_vec(split).map_err(|e| DatasetError::Json {
        path: path.clone(),
        source: e,
    })?;
    fs::write(&path, json).map_err(|e| DatasetError::Io { path, source: e })
}
