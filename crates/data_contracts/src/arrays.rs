use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File names the dataset-preparation step writes into a data directory.
pub const TRAIN_FILE: &str = "train.json";
pub const VALIDATION_FILE: &str = "val.json";
pub const TEST_FILE: &str = "test.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Train,
    Validation,
    Test,
}

impl SplitKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            SplitKind::Train => TRAIN_FILE,
            SplitKind::Validation => VALIDATION_FILE,
            SplitKind::Test => TEST_FILE,
        }
    }

    /// Human-facing scope used in evaluation reports.
    pub fn scope(&self) -> &'static str {
        match self {
            SplitKind::Train => "Train",
            SplitKind::Validation => "Validation",
            SplitKind::Test => "Test",
        }
    }
}

/// One pre-shuffled, pre-vectorized split: `labels.len()` samples, each
/// `sample_shape` (`[C, H, W]`) floats laid out contiguously in `features`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArraySplit {
    pub sample_shape: [usize; 3],
    pub num_classes: usize,
    pub features: Vec<f32>,
    pub labels: Vec<i64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("sample shape has a zero dimension: {0:?}")]
    EmptyShape([usize; 3]),
    #[error("num_classes must be at least 1")]
    NoClasses,
    #[error("features hold {features} values but {samples} samples of {per_sample} need {expected}")]
    LengthMismatch {
        features: usize,
        samples: usize,
        per_sample: usize,
        expected: usize,
    },
    #[error("label {label} at index {index} outside 0..{num_classes}")]
    LabelOutOfRange {
        index: usize,
        label: i64,
        num_classes: usize,
    },
    #[error("{samples} samples of shape {shape:?} exceed the addressable size")]
    SizeOverflow { shape: [usize; 3], samples: usize },
    #[error("non-finite feature value at flat index {0}")]
    NonFiniteFeature(usize),
}

impl ArraySplit {
    pub fn new(
        sample_shape: [usize; 3],
        num_classes: usize,
        features: Vec<f32>,
        labels: Vec<i64>,
    ) -> Result<Self, ValidationError> {
        let split = Self {
            sample_shape,
            num_classes,
            features,
            labels,
        };
        split.validate()?;
        Ok(split)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Floats per sample; `None` if the shape overflows `usize`.
    pub fn sample_len(&self) -> Option<usize> {
        self.sample_shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sample_shape.contains(&0) {
            return Err(ValidationError::EmptyShape(self.sample_shape));
        }
        if self.num_classes == 0 {
            return Err(ValidationError::NoClasses);
        }
        let overflow = || ValidationError::SizeOverflow {
            shape: self.sample_shape,
            samples: self.labels.len(),
        };
        let per_sample = self.sample_len().ok_or_else(overflow)?;
        let expected = per_sample
            .checked_mul(self.labels.len())
            .ok_or_else(overflow)?;
        if self.features.len() != expected {
            return Err(ValidationError::LengthMismatch {
                features: self.features.len(),
                samples: self.labels.len(),
                per_sample,
                expected,
            });
        }
        for (index, label) in self.labels.iter().enumerate() {
            if *label < 0 || *label as usize >= self.num_classes {
                return Err(ValidationError::LabelOutOfRange {
                    index,
                    label: *label,
                    num_classes: self.num_classes,
                });
            }
        }
        if let Some(index) = self.features.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteFeature(index));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ArraySplit {
        ArraySplit {
            sample_shape: [1, 2, 2],
            num_classes: 2,
            features: vec![0.0; 8],
            labels: vec![0, 1],
        }
    }

    #[test]
    fn valid_split_passes() {
        assert!(tiny().validate().is_ok());
        assert_eq!(tiny().len(), 2);
        assert_eq!(tiny().sample_len(), Some(4));
    }

    #[test]
    fn short_features_rejected() {
        let mut split = tiny();
        split.features.pop();
        assert!(matches!(
            split.validate(),
            Err(ValidationError::LengthMismatch { expected: 8, .. })
        ));
    }

    #[test]
    fn label_range_checked() {
        let mut split = tiny();
        split.labels[1] = 2;
        assert_eq!(
            split.validate(),
            Err(ValidationError::LabelOutOfRange {
                index: 1,
                label: 2,
                num_classes: 2
            })
        );
        split.labels[1] = -1;
        assert!(split.validate().is_err());
    }

    #[test]
    fn oversized_shape_is_an_error() {
        let mut split = tiny();
        split.sample_shape = [usize::MAX / 2; 3];
        assert_eq!(split.sample_len(), None);
        assert!(matches!(
            split.validate(),
            Err(ValidationError::SizeOverflow { samples: 2, .. })
        ));

        let mut split = tiny();
        split.sample_shape = [1, 1, usize::MAX / 2];
        split.labels = vec![0, 1, 0];
        assert!(matches!(
            split.validate(),
            Err(ValidationError::SizeOverflow { samples: 3, .. })
        ));
    }

    #[test]
    fn nan_feature_rejected() {
        let mut split = tiny();
        split.features[5] = f32::NAN;
        assert_eq!(split.validate(), Err(ValidationError::NonFiniteFeature(5)));
    }

    #[test]
    fn split_file_names() {
        assert_eq!(SplitKind::Validation.file_name(), "val.json");
        assert_eq!(SplitKind::Test.scope(), "Test");
    }
}
