//! Adadelta, used by the search driver.
//!
//! Per parameter, with gradient `g`:
//! `s = rho*s + (1-rho)*g²`, `d = sqrt(u+eps)/sqrt(s+eps) * g`,
//! `u = rho*u + (1-rho)*d²`, `p -= lr*d`.

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::SimpleOptimizer;
use burn::LearningRate;
use burn::record::Record;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdadeltaConfig {
    pub rho: f32,
    pub epsilon: f32,
}

impl Default for AdadeltaConfig {
    fn default() -> Self {
        Self {
            rho: 0.9,
            epsilon: 1e-6,
        }
    }
}

impl AdadeltaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(
        &self,
    ) -> OptimizerAdaptor<Adadelta, M, B> {
        OptimizerAdaptor::from(Adadelta {
            rho: self.rho,
            epsilon: self.epsilon,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Adadelta {
    rho: f32,
    epsilon: f32,
}

#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub square_avg: Tensor<B, D>,
    pub acc_delta: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr: LearningRate,
        tensor: Tensor<B, D>,
        grad: Tensor<B, D>,
        state: Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (square_avg, acc_delta) = match state {
            Some(state) => (state.square_avg, state.acc_delta),
            None => (grad.zeros_like(), grad.zeros_like()),
        };
        let keep = 1.0 - self.rho;

        let square_avg = square_avg.mul_scalar(self.rho)
            + grad.clone().mul(grad.clone()).mul_scalar(keep);
        let delta = acc_delta
            .clone()
            .add_scalar(self.epsilon)
            .sqrt()
            .div(square_avg.clone().add_scalar(self.epsilon).sqrt())
            .mul(grad);
        let acc_delta =
            acc_delta.mul_scalar(self.rho) + delta.clone().mul(delta.clone()).mul_scalar(keep);
        let tensor = tensor - delta.mul_scalar(lr);

        (
            tensor,
            Some(AdadeltaState {
                square_avg,
                acc_delta,
            }),
        )
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.square_avg = state.square_avg.to_device(device);
        state.acc_delta = state.acc_delta.to_device(device);
        state
    }
}
