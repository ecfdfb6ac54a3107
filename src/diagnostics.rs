//! Timing diagnostics reported by the engine.

use serde::{Deserialize, Serialize};

/// Per-iteration stage timings, summed across batch elements.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationTiming {
    pub iteration: usize,
    pub bilateral_ms: f64,
    pub gaussian_ms: f64,
    pub update_ms: f64,
}

impl IterationTiming {
    pub fn total_ms(&self) -> f64 {
        self.bilateral_ms + self.gaussian_ms + self.update_ms
    }
}

/// Aggregated trace of one inference call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceReport {
    /// Wall-clock time of the whole call, including lattice planning.
    pub total_ms: f64,
    /// Time spent building the per-batch lattice plans.
    pub planning_ms: f64,
    pub batches: usize,
    pub classes: usize,
    pub sites: usize,
    pub iterations: Vec<IterationTiming>,
}

impl InferenceReport {
    /// Merge a per-batch iteration trace into the aggregate.
    pub(crate) fn absorb(&mut self, timings: &[IterationTiming]) {
        if self.iterations.len() < timings.len() {
            self.iterations.resize_with(timings.len(), Default::default);
        }
        for (slot, timing) in self.iterations.iter_mut().zip(timings) {
            slot.iteration = timing.iteration;
            slot.bilateral_ms += timing.bilateral_ms;
            slot.gaussian_ms += timing.gaussian_ms;
            slot.update_ms += timing.update_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_sums_per_iteration() {
        let mut report = InferenceReport::default();
        let batch0 = vec![IterationTiming {
            iteration: 0,
            bilateral_ms: 1.0,
            gaussian_ms: 0.5,
            update_ms: 0.25,
        }];
        let batch1 = vec![IterationTiming {
            iteration: 0,
            bilateral_ms: 2.0,
            gaussian_ms: 1.5,
            update_ms: 0.75,
        }];
        report.absorb(&batch0);
        report.absorb(&batch1);
        assert_eq!(report.iterations.len(), 1);
        assert!((report.iterations[0].bilateral_ms - 3.0).abs() < 1e-9);
        assert!((report.iterations[0].total_ms() - 6.0).abs() < 1e-9);
    }
}
