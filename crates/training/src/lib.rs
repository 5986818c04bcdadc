#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod device;
pub mod eval;
pub mod fine_tune;
pub mod logging;
pub mod optim;
pub mod report;
pub mod runner;
pub mod schedule;
pub mod search;
pub mod train;

pub use checkpoint::{
    checkpoint_path, format_sci, save_checkpoint, CheckpointSelector, EpochRecord,
    SelectionSummary, SelectorState,
};
pub use config::ToolConfig;
pub use device::{resolve_backend, BackendChoice};
pub use eval::{argmax, evaluate, EvalReport};
pub use fine_tune::{run_fine_tune, FineTuneArgs};
pub use optim::{Adadelta, AdadeltaConfig};
pub use report::ComplexitySnapshot;
pub use runner::{run, Loaders, RunOutcome, RunPlan};
pub use schedule::{fine_tune_lr, GeometricDecay, LrPolicy};
pub use search::{run_search, SearchArgs};
pub use train::{train_epoch, BatchProgress, ComplexityPenalty, TrainOptions, TrainReport};

/// CPU backend, always available.
pub type CpuBackend = burn_ndarray::NdArray<f32>;
/// Accelerator backend (WGPU), compiled in with `backend-wgpu`.
#[cfg(feature = "backend-wgpu")]
pub type AccelBackend = burn_wgpu::Wgpu<f32>;
