//! One epoch of gradient descent, with the optional complexity penalty.

use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use burn_dataset::DataLoader;
use models::{ComplexityReport, SearchableModel};
use std::fmt;
use tracing::{info, warn};

/// Coefficients of the search-time complexity loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexityPenalty {
    pub cd_size: f64,
    pub cd_ops: f64,
    pub size_target: f64,
}

impl ComplexityPenalty {
    /// `(cd_size * |size - target|, cd_ops * ops)`.
    pub fn losses<B: Backend>(&self, report: &ComplexityReport<B>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let size = (report.total_size() - self.size_target).abs() * self.cd_size;
        let ops = report.total_ops() * self.cd_ops;
        (size, ops)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub log_interval: usize,
    pub dry_run: bool,
    /// `None` trains on classification loss alone.
    pub penalty: Option<ComplexityPenalty>,
}

/// A logged training step.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchProgress {
    pub epoch: usize,
    pub batch: usize,
    /// Samples consumed before this batch.
    pub seen: usize,
    pub total: usize,
    pub percent: f64,
    pub loss: f64,
    pub size_loss: Option<f64>,
    pub ops_loss: Option<f64>,
}

impl fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
            self.epoch, self.seen, self.total, self.percent, self.loss
        )?;
        if let (Some(size), Some(ops)) = (self.size_loss, self.ops_loss) {
            write!(f, "\tSize-Loss: {size:.6}\tOps-Loss: {ops:.6}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainReport {
    pub steps: usize,
    pub progress: Vec<BatchProgress>,
    /// Mean total loss over the steps taken; NaN if any step was non-finite.
    pub mean_loss: f64,
}

pub(crate) fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

pub fn train_epoch<B, M, O>(
    mut model: M,
    optim: &mut O,
    loader: &mut DataLoader,
    epoch: usize,
    lr: f64,
    opts: &TrainOptions,
    device: &B::Device,
) -> anyhow::Result<(M, TrainReport)>
where
    B: AutodiffBackend,
    M: SearchableModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let log_interval = opts.log_interval.max(1);
    let total = loader.num_items();
    let num_batches = loader.num_batches().max(1);
    let loss_fn = CrossEntropyLossConfig::new().init(device);

    let mut report = TrainReport::default();
    let mut loss_sum = 0.0;
    let mut seen = 0usize;
    let mut iter = loader.iter();
    while let Some(batch) = iter.next_batch::<B>(device)? {
        let batch_idx = report.steps;
        let batch_len = batch.len();
        let out = model.forward(batch.inputs);
        let ce = loss_fn.forward(out.logits, batch.targets);

        let (loss, size_loss, ops_loss) = match &opts.penalty {
            Some(penalty) => {
                let (size, ops) = penalty.losses(&out.complexity);
                let size_val = scalar(size.clone().detach());
                let ops_val = scalar(ops.clone().detach());
                (ce + size + ops, Some(size_val), Some(ops_val))
            }
            None => (ce, None, None),
        };
        let loss_val = scalar(loss.clone().detach());
        if !loss_val.is_finite() {
            warn!(epoch, batch = batch_idx, loss = loss_val, "non-finite training loss");
        }

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(lr, model, grads);
        loss_sum += loss_val;
        report.steps += 1;

        if batch_idx % log_interval == 0 {
            let progress = BatchProgress {
                epoch,
                batch: batch_idx,
                seen,
                total,
                percent: 100.0 * batch_idx as f64 / num_batches as f64,
                loss: loss_val,
                size_loss,
                ops_loss,
            };
            info!("{progress}");
            report.progress.push(progress);
            if opts.dry_run {
                break;
            }
        }
        seen += batch_len;
    }

    report.mean_loss = if report.steps == 0 {
        0.0
    } else {
        loss_sum / report.steps as f64
    };
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;
    use models::{ModelOptions, PlainCnn};

    type B = Autodiff<NdArray<f32>>;

    #[test]
    fn zero_target_size_loss_equals_total_size() {
        let device = Default::default();
        let model = PlainCnn::<B>::build(&ModelOptions::new([1, 8, 8], 3), &device).unwrap();
        let report = model.complexity();
        let penalty = ComplexityPenalty {
            cd_size: 1.0,
            cd_ops: 0.0,
            size_target: 0.0,
        };
        let (size, ops) = penalty.losses(&report);
        let expected = (32 * 9 + 32 * 64 * 9 + 64 * 2 * 2 * 128 + 128 * 3) as f64;
        assert_eq!(scalar(size), expected);
        assert_eq!(scalar(ops), 0.0);
    }

    #[test]
    fn size_loss_is_absolute_distance() {
        let device = Default::default();
        let model = PlainCnn::<B>::build(&ModelOptions::new([1, 8, 8], 3), &device).unwrap();
        let report = model.complexity();
        let size = report.size_value();
        let over = ComplexityPenalty {
            cd_size: 0.5,
            cd_ops: 2.0,
            size_target: size + 1000.0,
        };
        let (size_loss, ops_loss) = over.losses(&report);
        assert_eq!(scalar(size_loss), 500.0);
        assert_eq!(scalar(ops_loss), 2.0 * report.ops_value());
    }

    #[test]
    fn progress_line_format() {
        let progress = BatchProgress {
            epoch: 2,
            batch: 10,
            seen: 640,
            total: 60000,
            percent: 1.07,
            loss: 0.25,
            size_loss: Some(0.0),
            ops_loss: Some(1.5),
        };
        assert_eq!(
            progress.to_string(),
            "Train Epoch: 2 [640/60000 (1%)]\tLoss: 0.250000\tSize-Loss: 0.000000\tOps-Loss: 1.500000"
        );
    }
}
