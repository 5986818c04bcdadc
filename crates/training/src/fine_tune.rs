//! Fine-tune driver: retrain a searched model with its channel mask frozen.

use crate::checkpoint::checkpoint_path;
use crate::config::ToolConfig;
use crate::device::{resolve_backend, BackendChoice};
use crate::runner::{run, Loaders, RunLimits, RunOutcome, RunPlan};
use crate::schedule::LrPolicy;
use crate::train::TrainOptions;
use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::AdamConfig;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn_dataset::load_split_set;
use clap::Parser;
use models::{Architecture, ModelOptions, PlainCnn, PlainDscnn, SearchableModel};
use std::path::{Path, PathBuf};
use tracing::info;

const WEIGHT_DECAY: f32 = 1e-4;

#[derive(Parser, Debug, Clone)]
#[command(name = "fine_tune", about = "Fine-tune a searched architecture with its mask frozen")]
pub struct FineTuneArgs {
    /// Model architecture; must match the searched checkpoint.
    #[arg(short = 'a', long, value_enum, default_value_t = Architecture::PlainDscnn)]
    pub arch: Architecture,
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,
    #[arg(long, default_value_t = 1000)]
    pub test_batch_size: usize,
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,
    /// Learning rate for the first epoch; later epochs follow the fixed stages.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.01)]
    pub lr: f64,
    /// Only used to name the checkpoint.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub cd_size: f64,
    /// Only used to name the checkpoint.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub cd_ops: f64,
    /// Only used to name the checkpoint.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub size_target: f64,
    /// Accepted for command-line compatibility with `search`; the schedule is stepwise.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.7)]
    pub gamma: f64,
    #[arg(long)]
    pub no_cuda: bool,
    #[arg(long)]
    pub eval_complexity: bool,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    #[arg(long, default_value_t = 100)]
    pub log_interval: usize,
    /// Checkpoint written by `search`.
    #[arg(long)]
    pub found_model: PathBuf,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub saved_models_dir: Option<PathBuf>,
}

impl FineTuneArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        RunLimits {
            batch_size: self.batch_size,
            test_batch_size: self.test_batch_size,
            epochs: self.epochs,
            log_interval: self.log_interval,
            lr: self.lr,
            cd_size: self.cd_size,
            cd_ops: self.cd_ops,
            size_target: self.size_target,
            gamma: self.gamma,
        }
        .validate()?;
        if !self.found_model.is_file() {
            anyhow::bail!(
                "--found-model {} does not exist",
                self.found_model.display()
            );
        }
        Ok(())
    }

    fn plan(&self, saved_models_dir: &Path) -> RunPlan {
        RunPlan {
            epochs: self.epochs,
            policy: LrPolicy::FineTune { initial: self.lr },
            train: TrainOptions {
                log_interval: self.log_interval,
                dry_run: self.dry_run,
                penalty: None,
            },
            checkpoint: checkpoint_path(
                saved_models_dir,
                "ft",
                self.arch,
                self.size_target,
                self.cd_ops,
            ),
            eval_complexity: self.eval_complexity,
        }
    }
}

pub fn run_fine_tune(args: FineTuneArgs) -> anyhow::Result<RunOutcome> {
    args.validate()?;
    let (data_dir, models_dir) = ToolConfig::load()
        .resolve(args.data_dir.as_deref(), args.saved_models_dir.as_deref());
    match resolve_backend(args.no_cuda) {
        BackendChoice::Cpu => {
            fine_tune_on::<Autodiff<crate::CpuBackend>>(&args, &data_dir, &models_dir)
        }
        #[cfg(feature = "backend-wgpu")]
        BackendChoice::Accelerator => {
            fine_tune_on::<Autodiff<crate::AccelBackend>>(&args, &data_dir, &models_dir)
        }
    }
}

fn fine_tune_on<B: AutodiffBackend>(
    args: &FineTuneArgs,
    data_dir: &Path,
    models_dir: &Path,
) -> anyhow::Result<RunOutcome> {
    match args.arch {
        Architecture::PlainCnn => fine_tune_with::<B, PlainCnn<B>>(args, data_dir, models_dir),
        Architecture::PlainDscnn => {
            fine_tune_with::<B, PlainDscnn<B>>(args, data_dir, models_dir)
        }
    }
}

fn fine_tune_with<B, M>(
    args: &FineTuneArgs,
    data_dir: &Path,
    models_dir: &Path,
) -> anyhow::Result<RunOutcome>
where
    B: AutodiffBackend,
    M: SearchableModel<B> + AutodiffModule<B>,
    M::InnerModule: SearchableModel<B::InnerBackend>,
{
    B::seed(args.seed);
    let device = <B as Backend>::Device::default();
    let splits = load_split_set(data_dir)
        .with_context(|| format!("failed to load dataset from {}", data_dir.display()))?;
    let options = ModelOptions::new(splits.sample_shape(), splits.num_classes());

    info!(
        "=> loading searched model '{}' from {}",
        args.arch,
        args.found_model.display()
    );
    let model = M::load_searched(&args.found_model, &options, &device)?;
    let optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(WEIGHT_DECAY)))
        .init::<B, M>();
    let mut loaders = Loaders::new(splits, args.batch_size, args.test_batch_size, args.seed)?;
    run(model, optim, &mut loaders, &args.plan(models_dir), &device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_model_is_required() {
        assert!(FineTuneArgs::try_parse_from(["fine_tune"]).is_err());
        let args = FineTuneArgs::try_parse_from(["fine_tune", "--found-model", "m.bin"])
            .expect("valid flags");
        assert_eq!(args.arch, Architecture::PlainDscnn);
        assert_eq!(args.batch_size, 128);
        assert_eq!(args.epochs, 200);
        assert_eq!(args.lr, 0.01);
        assert_eq!(args.log_interval, 100);
    }

    #[test]
    fn missing_found_model_rejected() {
        let args = FineTuneArgs::try_parse_from([
            "fine_tune",
            "--found-model",
            "/nonexistent/srch_plain_dscnn.bin",
        ])
        .expect("valid flags");
        let err = args.validate().unwrap_err().to_string();
        assert!(err.contains("/nonexistent/srch_plain_dscnn.bin"), "{err}");
    }

    #[test]
    fn plan_is_stepwise_without_penalty() {
        let args = FineTuneArgs::try_parse_from([
            "fine_tune",
            "--found-model",
            "m.bin",
            "--size-target",
            "5000",
            "--cd-ops",
            "1e-5",
        ])
        .expect("valid flags");
        let plan = args.plan(Path::new("out"));
        assert!(plan.train.penalty.is_none());
        assert_eq!(plan.policy.lr(1), 0.01);
        assert_eq!(plan.policy.lr(50), 5e-3);
        assert_eq!(
            plan.checkpoint,
            PathBuf::from("out/ft_plain_dscnn_target-5.0e+03_cdops-1.0e-05.bin")
        );
    }
}
