//! Read-only in-memory dataset over a validated [`ArraySplit`].

use crate::types::DatasetResult;
use data_contracts::ArraySplit;
use std::sync::Arc;

/// Features and labels of one split, shared between clones.
///
/// Storage is immutable after construction; `clone` only bumps reference
/// counts, so train/eval loaders can hold the same data.
#[derive(Debug, Clone)]
pub struct ArrayDataset {
    features: Arc<[f32]>,
    labels: Arc<[i64]>,
    sample_shape: [usize; 3],
    num_classes: usize,
}

impl ArrayDataset {
    /// Validates the arrays (aligned lengths, label range, finite values)
    /// before taking ownership.
    pub fn new(
        features: Vec<f32>,
        sample_shape: [usize; 3],
        labels: Vec<i64>,
        num_classes: usize,
    ) -> DatasetResult<Self> {
        let split = ArraySplit::new(sample_shape, num_classes, features, labels)?;
        Ok(Self::from_validated(split))
    }

    pub fn from_split(split: ArraySplit) -> DatasetResult<Self> {
        split.validate()?;
        Ok(Self::from_validated(split))
    }

    fn from_validated(split: ArraySplit) -> Self {
        Self {
            features: split.features.into(),
            labels: split.labels.into(),
            sample_shape: split.sample_shape,
            num_classes: split.num_classes,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn sample_shape(&self) -> [usize; 3] {
        self.sample_shape
    }

    pub fn sample_len(&self) -> usize {
        self.sample_shape.iter().product()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Borrow sample `index` as its flat `[C*H*W]` feature slice and label.
    pub fn sample(&self, index: usize) -> Option<(&[f32], i64)> {
        let label = *self.labels.get(index)?;
        let stride = self.sample_len();
        let start = index * stride;
        Some((&self.features[start..start + stride], label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DatasetError;
    use data_contracts::ValidationError;

    #[test]
    fn sample_borrows_rows_in_order() {
        let ds = ArrayDataset::new((0..12).map(|v| v as f32).collect(), [1, 2, 2], vec![0, 2, 1], 3)
            .unwrap();
        let (row, label) = ds.sample(1).unwrap();
        assert_eq!(row, &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(label, 2);
        assert!(ds.sample(3).is_none());
    }

    #[test]
    fn clones_share_storage() {
        let ds = ArrayDataset::new(vec![1.0; 4], [1, 1, 2], vec![0, 1], 2).unwrap();
        let copy = ds.clone();
        let (a, _) = ds.sample(0).unwrap();
        let (b, _) = copy.sample(0).unwrap();
        assert!(std::ptr::eq(a.as_ptr(), b.as_ptr()));
    }

    #[test]
    fn misaligned_lengths_rejected() {
        let err = ArrayDataset::new(vec![0.0; 5], [1, 1, 2], vec![0, 1], 2).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Validation(ValidationError::LengthMismatch { .. })
        ));
    }
}
