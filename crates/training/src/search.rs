//! Search driver: joint training of weights and channel gates under a
//! size/ops penalty.

use crate::checkpoint::checkpoint_path;
use crate::config::ToolConfig;
use crate::device::{resolve_backend, BackendChoice};
use crate::optim::AdadeltaConfig;
use crate::runner::{run, Loaders, RunLimits, RunOutcome, RunPlan};
use crate::schedule::{GeometricDecay, LrPolicy};
use crate::train::{ComplexityPenalty, TrainOptions};
use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn_dataset::load_split_set;
use clap::Parser;
use models::{Architecture, ModelOptions, PlainCnn, PlainDscnn, SearchableModel};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug, Clone)]
#[command(name = "search", about = "Search a channel-pruned architecture under a size/ops budget")]
pub struct SearchArgs {
    /// Model architecture.
    #[arg(short = 'a', long, value_enum, default_value_t = Architecture::PlainCnn)]
    pub arch: Architecture,
    /// Input batch size for training.
    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,
    /// Input batch size for validation and test.
    #[arg(long, default_value_t = 1000)]
    pub test_batch_size: usize,
    /// Number of epochs to train.
    #[arg(long, default_value_t = 14)]
    pub epochs: usize,
    /// Initial learning rate.
    #[arg(long, allow_negative_numbers = true, default_value_t = 1.0)]
    pub lr: f64,
    /// Complexity decay applied to the size penalty.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub cd_size: f64,
    /// Complexity decay applied to the ops penalty.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub cd_ops: f64,
    /// Target parameter count for the size penalty.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
    pub size_target: f64,
    /// Learning-rate decay applied after every epoch.
    #[arg(long, allow_negative_numbers = true, default_value_t = 0.7)]
    pub gamma: f64,
    /// Disable the accelerator backend.
    #[arg(long)]
    pub no_cuda: bool,
    /// Report the complexity of the freshly built model and exit.
    #[arg(long)]
    pub eval_complexity: bool,
    /// Run a single batch per epoch.
    #[arg(long)]
    pub dry_run: bool,
    /// Random seed.
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
    /// Batches between training status lines.
    #[arg(long, default_value_t = 10)]
    pub log_interval: usize,
    /// Directory holding train.json / val.json / test.json.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Directory checkpoints are written to.
    #[arg(long)]
    pub saved_models_dir: Option<PathBuf>,
}

impl SearchArgs {
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
        .validate()
    }

    fn plan(&self, saved_models_dir: &Path) -> RunPlan {
        RunPlan {
            epochs: self.epochs,
            policy: LrPolicy::Geometric(GeometricDecay {
                initial: self.lr,
                gamma: self.gamma,
            }),
            train: TrainOptions {
                log_interval: self.log_interval,
                dry_run: self.dry_run,
                penalty: Some(ComplexityPenalty {
                    cd_size: self.cd_size,
                    cd_ops: self.cd_ops,
                    size_target: self.size_target,
                }),
            },
            checkpoint: checkpoint_path(
                saved_models_dir,
                "srch",
                self.arch,
                self.size_target,
                self.cd_ops,
            ),
            eval_complexity: self.eval_complexity,
        }
    }
}

pub fn run_search(args: SearchArgs) -> anyhow::Result<RunOutcome> {
    args.validate()?;
    let (data_dir, models_dir) = ToolConfig::load()
        .resolve(args.data_dir.as_deref(), args.saved_models_dir.as_deref());
    match resolve_backend(args.no_cuda) {
        BackendChoice::Cpu => {
            search_on::<Autodiff<crate::CpuBackend>>(&args, &data_dir, &models_dir)
        }
        #[cfg(feature = "backend-wgpu")]
        BackendChoice::Accelerator => {
            search_on::<Autodiff<crate::AccelBackend>>(&args, &data_dir, &models_dir)
        }
    }
}

fn search_on<B: AutodiffBackend>(
    args: &SearchArgs,
    data_dir: &Path,
    models_dir: &Path,
) -> anyhow::Result<RunOutcome> {
    match args.arch {
        Architecture::PlainCnn => search_with::<B, PlainCnn<B>>(args, data_dir, models_dir),
        Architecture::PlainDscnn => search_with::<B, PlainDscnn<B>>(args, data_dir, models_dir),
    }
}

fn search_with<B, M>(args: &SearchArgs, data_dir: &Path, models_dir: &Path) -> anyhow::Result<RunOutcome>
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

    info!("=> creating model '{}'", args.arch);
    let model = M::build(&options, &device)?;
    let optim = AdadeltaConfig::new().init::<B, M>();
    let mut loaders = Loaders::new(splits, args.batch_size, args.test_batch_size, args.seed)?;
    run(model, optim, &mut loaders, &args.plan(models_dir), &device)
}
