//! Best-validation checkpoint selection and naming.

use anyhow::Context;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use models::Architecture;
use std::path::{Path, PathBuf};

/// One finished epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub lr: f64,
    pub train_loss: f64,
    pub val_acc: f64,
    pub test_acc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectorState {
    NoCheckpoint,
    HasCheckpoint { epoch: usize, val_acc: f64 },
}

/// Best epoch and the accuracies recorded for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionSummary {
    pub epoch: usize,
    pub val_acc: f64,
    pub test_acc: f64,
}

impl SelectionSummary {
    pub fn lines(&self) -> [String; 2] {
        [
            format!("Best Val Acc: {:.2}% @ Epoch {}", self.val_acc, self.epoch),
            format!("Test Acc: {:.2}% @ Epoch {}", self.test_acc, self.epoch),
        ]
    }
}

/// Tracks the epoch with the highest validation accuracy.
///
/// The comparison starts from a virtual epoch 0 at 0% and uses `>=`, so a
/// later epoch that ties the best replaces it.
#[derive(Debug, Clone)]
pub struct CheckpointSelector {
    state: SelectorState,
    best_val: f64,
    history: Vec<EpochRecord>,
}

impl Default for CheckpointSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckpointSelector {
    pub fn new() -> Self {
        Self {
            state: SelectorState::NoCheckpoint,
            best_val: 0.0,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }

    /// Record an epoch; returns `true` when it becomes the checkpoint.
    pub fn observe(&mut self, record: EpochRecord) -> bool {
        self.history.push(record);
        // NaN compares false and never moves the selection.
        if record.val_acc >= self.best_val {
            self.best_val = record.val_acc;
            self.state = SelectorState::HasCheckpoint {
                epoch: record.epoch,
                val_acc: record.val_acc,
            };
            true
        } else {
            false
        }
    }

    pub fn summary(&self) -> Option<SelectionSummary> {
        let SelectorState::HasCheckpoint { epoch, val_acc } = self.state else {
            return None;
        };
        let test_acc = self
            .history
            .iter()
            .rev()
            .find(|r| r.epoch == epoch)
            .map(|r| r.test_acc)
            .unwrap_or(f64::NAN);
        Some(SelectionSummary {
            epoch,
            val_acc,
            test_acc,
        })
    }
}

/// `{dir}/{prefix}_{arch}_target-{size_target}_cdops-{cd_ops}.bin`, numbers
/// in one-decimal scientific notation with a signed two-digit exponent.
pub fn checkpoint_path(
    dir: &Path,
    prefix: &str,
    arch: Architecture,
    size_target: f64,
    cd_ops: f64,
) -> PathBuf {
    dir.join(format!(
        "{prefix}_{arch}_target-{}_cdops-{}.bin",
        format_sci(size_target, 1),
        format_sci(cd_ops, 1)
    ))
}

/// Scientific notation as `5.0e+03` / `1.0e-05` rather than Rust's `5.0e3`.
pub fn format_sci(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{value:.precision$e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

pub fn save_checkpoint<B: Backend, M: Module<B>>(path: &Path, model: &M) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, val_acc: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            lr: 1.0,
            train_loss: 0.5,
            val_acc,
            test_acc: val_acc - 1.0,
        }
    }

    #[test]
    fn sci_format_matches_printf_style() {
        assert_eq!(format_sci(0.0, 1), "0.0e+00");
        assert_eq!(format_sci(5000.0, 1), "5.0e+03");
        assert_eq!(format_sci(1e-5, 1), "1.0e-05");
        assert_eq!(format_sci(123456.0, 3), "1.235e+05");
        assert_eq!(format_sci(-2.5e-12, 1), "-2.5e-12");
        assert_eq!(format_sci(1e100, 1), "1.0e+100");
    }

    #[test]
    fn path_carries_run_key() {
        let path = checkpoint_path(
            Path::new("saved_models"),
            "srch",
            Architecture::PlainCnn,
            5000.0,
            1e-5,
        );
        assert_eq!(
            path,
            PathBuf::from("saved_models/srch_plain_cnn_target-5.0e+03_cdops-1.0e-05.bin")
        );
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("bin"));
    }

    #[test]
    fn ties_move_to_latest_epoch() {
        let mut sel = CheckpointSelector::new();
        assert!(sel.observe(record(1, 80.0)));
        assert!(!sel.observe(record(2, 79.0)));
        assert!(sel.observe(record(3, 80.0)));
        assert_eq!(
            sel.state(),
            SelectorState::HasCheckpoint {
                epoch: 3,
                val_acc: 80.0
            }
        );
        let summary = sel.summary().unwrap();
        assert_eq!(summary.test_acc, 79.0);
        assert_eq!(summary.lines()[0], "Best Val Acc: 80.00% @ Epoch 3");
        assert_eq!(summary.lines()[1], "Test Acc: 79.00% @ Epoch 3");
    }

    #[test]
    fn zero_accuracy_still_checkpoints() {
        let mut sel = CheckpointSelector::new();
        assert!(sel.observe(record(1, 0.0)));
    }

    #[test]
    fn nan_never_selected() {
        let mut sel = CheckpointSelector::new();
        assert!(!sel.observe(record(1, f64::NAN)));
        assert_eq!(sel.state(), SelectorState::NoCheckpoint);
        assert!(sel.summary().is_none());
        assert_eq!(sel.history().len(), 1);
    }

    #[test]
    fn best_is_last_maximum() {
        let accs = [10.0, 55.5, 30.0, 55.5, 42.0, 12.0, 55.4];
        let mut sel = CheckpointSelector::new();
        for (i, acc) in accs.iter().enumerate() {
            sel.observe(record(i + 1, *acc));
        }
        let max = accs.iter().cloned().fold(f64::MIN, f64::max);
        let last_max = accs.iter().rposition(|a| *a == max).unwrap() + 1;
        assert_eq!(sel.summary().unwrap().epoch, last_max);
    }
}
