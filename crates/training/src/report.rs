//! Host-side complexity summaries printed before and after a run.

use crate::checkpoint::format_sci;
use burn::tensor::backend::Backend;
use models::ComplexityReport;
use tracing::info;

/// Detached copy of a [`ComplexityReport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexitySnapshot {
    pub size: f64,
    pub ops: f64,
    /// `(layer, alive, channels)` in network order.
    pub layers: Vec<(String, usize, usize)>,
}

impl ComplexitySnapshot {
    pub fn capture<B: Backend>(report: &ComplexityReport<B>) -> Self {
        Self {
            size: report.size_value(),
            ops: report.ops_value(),
            layers: report
                .iter()
                .map(|(name, d)| (name.to_string(), d.alive_channels, d.channels))
                .collect(),
        }
    }

    pub fn alive(&self, layer: &str) -> Option<usize> {
        self.layers
            .iter()
            .find(|(name, _, _)| name == layer)
            .map(|(_, alive, _)| *alive)
    }

    pub fn log_initial(&self) {
        info!(
            "Initial size: {} params\tInitial ops: {} OPs",
            format_sci(self.size, 3),
            format_sci(self.ops, 3)
        );
        for (layer, alive, _) in &self.layers {
            info!("{layer}:\t{alive} channels");
        }
    }

    /// Report `self` relative to the `initial` snapshot.
    pub fn log_final(&self, initial: &ComplexitySnapshot) {
        info!(
            "Final size: {}/{} parameters\tFinal ops: {}/{} OPs",
            format_sci(self.size, 3),
            format_sci(initial.size, 3),
            format_sci(self.ops, 3),
            format_sci(initial.ops, 3)
        );
        for (layer, alive, channels) in &self.layers {
            let before = initial.alive(layer).unwrap_or(*channels);
            info!("{layer}:\t{alive}/{before} channels");
        }
    }
}
