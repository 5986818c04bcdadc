use crate::adapter::ArrayDataset;
use crate::types::{ClassificationBatch, DatasetError, DatasetResult};
use burn::tensor::{backend::Backend, Int, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    pub batch_size: usize,
    pub shuffle: bool,
    /// Seed for the shuffle RNG; `None` draws one from the OS.
    pub seed: Option<u64>,
    pub drop_last: bool,
}

impl LoaderConfig {
    pub fn train(batch_size: usize, seed: u64) -> Self {
        Self {
            batch_size,
            shuffle: true,
            seed: Some(seed),
            drop_last: false,
        }
    }

    pub fn eval(batch_size: usize) -> Self {
        Self {
            batch_size,
            shuffle: false,
            seed: None,
            drop_last: false,
        }
    }
}

/// Owns a dataset and hands out one [`BatchIter`] per epoch.
///
/// The shuffle RNG lives across epochs: with a fixed seed the sequence of
/// epoch orders is reproducible, while each epoch still sees a new order.
#[derive(Debug)]
pub struct DataLoader {
    dataset: ArrayDataset,
    cfg: LoaderConfig,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: ArrayDataset, cfg: LoaderConfig) -> DatasetResult<Self> {
        if cfg.batch_size == 0 {
            return Err(DatasetError::EmptyBatchSize);
        }
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { dataset, cfg, rng })
    }

    pub fn num_items(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.cfg.drop_last {
            n / self.cfg.batch_size
        } else {
            n.div_ceil(self.cfg.batch_size)
        }
    }

    /// Iterator for one epoch, shuffled when the config asks for it.
    pub fn iter(&mut self) -> BatchIter {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.cfg.shuffle {
            indices.shuffle(&mut self.rng);
        }
        BatchIter::from_indices(self.dataset.clone(), indices, self.cfg)
    }

    /// Iterator in storage order regardless of `shuffle`; used by evaluation so
    /// repeated passes see identical batches.
    pub fn sequential_iter(&self) -> BatchIter {
        let indices: Vec<usize> = (0..self.dataset.len()).collect();
        BatchIter::from_indices(self.dataset.clone(), indices, self.cfg)
    }
}

pub struct BatchIter {
    dataset: ArrayDataset,
    indices: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    drop_last: bool,
    processed_samples: usize,
    processed_batches: usize,
    features_buf: Vec<f32>,
}

impl BatchIter {
    pub fn from_indices(dataset: ArrayDataset, indices: Vec<usize>, cfg: LoaderConfig) -> Self {
        let capacity = cfg.batch_size.min(indices.len()) * dataset.sample_len();
        Self {
            dataset,
            indices,
            cursor: 0,
            batch_size: cfg.batch_size,
            drop_last: cfg.drop_last,
            processed_samples: 0,
            processed_batches: 0,
            features_buf: Vec::with_capacity(capacity),
        }
    }

    pub fn processed_samples(&self) -> usize {
        self.processed_samples
    }

    pub fn processed_batches(&self) -> usize {
        self.processed_batches
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<ClassificationBatch<B>>> {
        if self.batch_size == 0 {
            return Err(DatasetError::EmptyBatchSize);
        }
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.indices.len());
        if self.drop_last && end - self.cursor < self.batch_size {
            self.cursor = self.indices.len();
            return Ok(None);
        }
        let slice = &self.indices[self.cursor..end];
        self.cursor = end;

        self.features_buf.clear();
        let mut labels = Vec::with_capacity(slice.len());
        for &idx in slice {
            let (row, label) = self.dataset.sample(idx).ok_or_else(|| {
                DatasetError::Other(format!(
                    "index {idx} out of range for dataset of {}",
                    self.dataset.len()
                ))
            })?;
            self.features_buf.extend_from_slice(row);
            labels.push(label);
        }

        let batch_len = labels.len();
        let [c, h, w] = self.dataset.sample_shape();
        let inputs = Tensor::<B, 1>::from_floats(self.features_buf.as_slice(), device)
            .reshape([batch_len, c, h, w]);
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(labels.clone(), [batch_len]), device);

        self.processed_samples += batch_len;
        self.processed_batches += 1;
        if self.cursor >= self.indices.len() {
            tracing::debug!(
                batches = self.processed_batches,
                samples = self.processed_samples,
                "epoch iteration finished"
            );
        }

        Ok(Some(ClassificationBatch {
            inputs,
            targets,
            labels,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(n: usize) -> ArrayDataset {
        let features = (0..n).map(|i| i as f32).collect();
        let labels = (0..n).map(|i| (i % 2) as i64).collect();
        ArrayDataset::new(features, [1, 1, 1], labels, 2).unwrap()
    }

    #[test]
    fn batch_count_respects_drop_last() {
        let mut cfg = LoaderConfig::eval(4);
        let loader = DataLoader::new(dataset(10), cfg).unwrap();
        assert_eq!(loader.num_batches(), 3);
        cfg.drop_last = true;
        let loader = DataLoader::new(dataset(10), cfg).unwrap();
        assert_eq!(loader.num_batches(), 2);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = DataLoader::new(dataset(3), LoaderConfig::eval(0)).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyBatchSize));
    }
}
