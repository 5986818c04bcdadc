//! Epoch loop shared by the search and fine-tune drivers.

use crate::checkpoint::{save_checkpoint, CheckpointSelector, EpochRecord, SelectionSummary};
use crate::eval::evaluate;
use crate::report::ComplexitySnapshot;
use crate::schedule::LrPolicy;
use crate::train::{train_epoch, TrainOptions};
use anyhow::Context;
use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use burn_dataset::{DataLoader, DatasetResult, LoaderConfig, SplitSet};
use models::SearchableModel;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct Loaders {
    pub train: DataLoader,
    pub val: DataLoader,
    pub test: DataLoader,
}

impl Loaders {
    /// Shuffled training loader seeded with `seed`; evaluation loaders in order.
    pub fn new(
        splits: SplitSet,
        batch_size: usize,
        test_batch_size: usize,
        seed: u64,
    ) -> DatasetResult<Self> {
        Ok(Self {
            train: DataLoader::new(splits.train, LoaderConfig::train(batch_size, seed))?,
            val: DataLoader::new(splits.val, LoaderConfig::eval(test_batch_size))?,
            test: DataLoader::new(splits.test, LoaderConfig::eval(test_batch_size))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub epochs: usize,
    pub policy: LrPolicy,
    pub train: TrainOptions,
    pub checkpoint: PathBuf,
    /// Stop after the initial complexity report.
    pub eval_complexity: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub initial: ComplexitySnapshot,
    /// `None` when the run stopped after the initial report.
    pub final_complexity: Option<ComplexitySnapshot>,
    pub history: Vec<EpochRecord>,
    pub best: Option<SelectionSummary>,
    /// Written checkpoint, if any epoch was selected.
    pub checkpoint: Option<PathBuf>,
}

pub fn run<B, M, O>(
    mut model: M,
    mut optim: O,
    loaders: &mut Loaders,
    plan: &RunPlan,
    device: &B::Device,
) -> anyhow::Result<RunOutcome>
where
    B: AutodiffBackend,
    M: SearchableModel<B> + AutodiffModule<B>,
    M::InnerModule: SearchableModel<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    // One evaluation pass before training, as a sanity check of the data and model.
    evaluate::<B::InnerBackend, _>(&model.valid(), &loaders.test, "Test", device)?;
    let initial = ComplexitySnapshot::capture(&model.complexity());
    initial.log_initial();
    if plan.eval_complexity {
        info!("Exit...");
        return Ok(RunOutcome {
            initial,
            final_complexity: None,
            history: Vec::new(),
            best: None,
            checkpoint: None,
        });
    }

    let mut selector = CheckpointSelector::new();
    let mut saved = false;
    for epoch in 1..=plan.epochs {
        let lr = plan.policy.lr(epoch);
        let (trained, report) =
            train_epoch(model, &mut optim, &mut loaders.train, epoch, lr, &plan.train, device)?;
        model = trained;

        let inference = model.valid();
        let val = evaluate::<B::InnerBackend, _>(&inference, &loaders.val, "Validation", device)?;
        let test = evaluate::<B::InnerBackend, _>(&inference, &loaders.test, "Test", device)?;
        let record = EpochRecord {
            epoch,
            lr,
            train_loss: report.mean_loss,
            val_acc: val.accuracy,
            test_acc: test.accuracy,
        };
        if selector.observe(record) {
            save::<B, M>(&plan.checkpoint, &model)?;
            saved = true;
            info!(epoch, val_acc = val.accuracy, "saved checkpoint to {}", plan.checkpoint.display());
        }
    }

    let final_complexity = ComplexitySnapshot::capture(&model.complexity());
    final_complexity.log_final(&initial);
    let best = selector.summary();
    if let Some(best) = &best {
        for line in best.lines() {
            info!("{line}");
        }
    }
    Ok(RunOutcome {
        initial,
        final_complexity: Some(final_complexity),
        history: selector.history().to_vec(),
        best,
        checkpoint: saved.then(|| plan.checkpoint.clone()),
    })
}

fn save<B: AutodiffBackend, M: AutodiffModule<B>>(path: &Path, model: &M) -> anyhow::Result<()> {
    save_checkpoint::<B, M>(path, model)
        .with_context(|| format!("checkpoint write failed for {}", path.display()))
}

/// Option checks common to both drivers, run before any data is read.
pub(crate) struct RunLimits {
    pub batch_size: usize,
    pub test_batch_size: usize,
    pub epochs: usize,
    pub log_interval: usize,
    pub lr: f64,
    pub cd_size: f64,
    pub cd_ops: f64,
    pub size_target: f64,
    pub gamma: f64,
}

impl RunLimits {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("--batch-size", self.batch_size),
            ("--test-batch-size", self.test_batch_size),
            ("--epochs", self.epochs),
            ("--log-interval", self.log_interval),
        ] {
            if value == 0 {
                anyhow::bail!("{name} must be at least 1");
            }
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            anyhow::bail!("--lr must be a positive number, got {}", self.lr);
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            anyhow::bail!("--gamma must be a positive number, got {}", self.gamma);
        }
        for (name, value) in [
            ("--cd-size", self.cd_size),
            ("--cd-ops", self.cd_ops),
            ("--size-target", self.size_target),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                anyhow::bail!("{name} must be finite and non-negative, got {value}");
            }
        }
        Ok(())
    }
}
