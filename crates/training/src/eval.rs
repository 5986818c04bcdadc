use burn::nn::loss::CrossEntropyLossConfig;
use burn::tensor::backend::Backend;
use burn_dataset::DataLoader;
use models::SearchableModel;
use tracing::info;

use crate::train::scalar;

#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub scope: String,
    /// Summed cross-entropy divided by the number of samples.
    pub avg_loss: f64,
    pub correct: usize,
    pub total: usize,
    /// Percentage in `[0, 100]`; 0 for an empty split.
    pub accuracy: f64,
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in row.iter().enumerate().skip(1) {
        if *v > row[best] {
            best = i;
        }
    }
    best
}

/// Score `model` on every sample of `loader`, in storage order.
///
/// Call it with the inference copy (`model.valid()`) so no graph is built.
pub fn evaluate<B, M>(
    model: &M,
    loader: &DataLoader,
    scope: &str,
    device: &B::Device,
) -> anyhow::Result<EvalReport>
where
    B: Backend,
    M: SearchableModel<B>,
{
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut loss_sum = 0.0;
    let mut correct = 0usize;
    let mut total = 0usize;

    let mut iter = loader.sequential_iter();
    while let Some(batch) = iter.next_batch::<B>(device)? {
        let batch_len = batch.len();
        let logits = model.forward(batch.inputs).logits;
        let [_, classes] = logits.dims();
        let mean = scalar(loss_fn.forward(logits.clone(), batch.targets));
        loss_sum += mean * batch_len as f64;

        let scores = logits
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("failed to read logits: {e:?}"))?;
        correct += scores
            .chunks(classes)
            .zip(&batch.labels)
            .filter(|(row, label)| argmax(row) as i64 == **label)
            .count();
        total += batch_len;
    }

    let (avg_loss, accuracy) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            loss_sum / total as f64,
            100.0 * correct as f64 / total as f64,
        )
    };
    info!(
        "{scope} set: Average loss: {avg_loss:.4}, Accuracy: {correct}/{total} ({accuracy:.2}%)"
    );
    Ok(EvalReport {
        scope: scope.to_string(),
        avg_loss,
        correct,
        total,
        accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_first_maximum_wins() {
        assert_eq!(argmax(&[0.1, 0.9, 0.9, 0.2]), 1);
        assert_eq!(argmax(&[3.0]), 0);
        assert_eq!(argmax(&[-1.0, -0.5, -2.0]), 1);
    }
}
