//! Learning-rate policies. Both are pure functions of the 1-based epoch that
//! is about to run.

/// Staged fine-tuning rate for `epoch`: 1e-2 below epoch 50, then 5e-3,
/// 2.5e-3, and 1e-3 from epoch 150 on.
pub fn fine_tune_lr(epoch: usize) -> f64 {
    match epoch {
        0..50 => 1e-2,
        50..100 => 5e-3,
        100..150 => 2.5e-3,
        _ => 1e-3,
    }
}

/// `initial * gamma^(epoch - 1)`: one multiplicative step after every epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricDecay {
    pub initial: f64,
    pub gamma: f64,
}

impl GeometricDecay {
    pub fn lr(&self, epoch: usize) -> f64 {
        let steps = epoch.saturating_sub(1).min(i32::MAX as usize) as i32;
        self.initial * self.gamma.powi(steps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LrPolicy {
    Geometric(GeometricDecay),
    /// `initial` trains epoch 1; every later epoch uses [`fine_tune_lr`].
    FineTune { initial: f64 },
}

impl LrPolicy {
    pub fn lr(&self, epoch: usize) -> f64 {
        match self {
            LrPolicy::Geometric(decay) => decay.lr(epoch),
            LrPolicy::FineTune { initial } if epoch <= 1 => *initial,
            LrPolicy::FineTune { .. } => fine_tune_lr(epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fine_tune_stage_boundaries() {
        assert_eq!(fine_tune_lr(1), 1e-2);
        assert_eq!(fine_tune_lr(49), 1e-2);
        assert_eq!(fine_tune_lr(50), 5e-3);
        assert_eq!(fine_tune_lr(99), 5e-3);
        assert_eq!(fine_tune_lr(100), 2.5e-3);
        assert_eq!(fine_tune_lr(149), 2.5e-3);
        assert_eq!(fine_tune_lr(150), 1e-3);
        assert_eq!(fine_tune_lr(10_000), 1e-3);
    }

    #[test]
    fn fine_tune_policy_rate_applied_per_epoch() {
        let policy = LrPolicy::FineTune { initial: 1e-2 };
        assert_eq!(policy.lr(1), 1e-2);
        assert_eq!(policy.lr(49), 1e-2);
        assert_eq!(policy.lr(50), 5e-3);
        assert_eq!(policy.lr(100), 2.5e-3);
        assert_eq!(policy.lr(150), 1e-3);
    }

    #[test]
    fn fine_tune_initial_rate_only_covers_first_epoch() {
        let policy = LrPolicy::FineTune { initial: 0.05 };
        assert_eq!(policy.lr(1), 0.05);
        assert_eq!(policy.lr(2), 1e-2);
        assert_eq!(policy.lr(50), 5e-3);
    }

    #[test]
    fn geometric_decay_per_epoch() {
        let decay = GeometricDecay {
            initial: 1.0,
            gamma: 0.7,
        };
        assert_eq!(decay.lr(1), 1.0);
        assert!((decay.lr(2) - 0.7).abs() < 1e-12);
        assert!((decay.lr(3) - 0.49).abs() < 1e-12);
        let policy = LrPolicy::Geometric(decay);
        assert!(policy.lr(14) < policy.lr(13));
    }
}
