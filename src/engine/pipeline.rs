//! The mean-field update loop.

use crate::compat::apply_compatibility;
use crate::diagnostics::{InferenceReport, IterationTiming};
use crate::error::CrfError;
use crate::features::{bilateral_embedding, spatial_embedding};
use crate::lattice::LatticePlan;
use crate::params::CrfParams;
use crate::volume::{check_pair, softmax_sites, VolumeLayout};
use log::debug;
use ndarray::ArrayD;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::options::ExecutionOptions;

/// Cooperative cancellation flag shared between the caller and a running
/// inference.
///
/// Consulted once per iteration boundary; iterations are not individually
/// resumable, so there is no sub-iteration check. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the next iteration boundary observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Mean-field CRF inference engine.
///
/// Configuration is validated and bound at construction and never mutated
/// by inference; volumes are caller-supplied per invocation and not
/// retained.
pub struct CrfEngine {
    params: CrfParams,
    execution: ExecutionOptions,
}

impl CrfEngine {
    /// Build an engine with the default execution strategy.
    pub fn new(params: CrfParams) -> Result<Self, CrfError> {
        Self::with_execution(params, ExecutionOptions::default())
    }

    /// Build an engine with an explicit execution strategy.
    pub fn with_execution(
        params: CrfParams,
        execution: ExecutionOptions,
    ) -> Result<Self, CrfError> {
        params.validate()?;
        Ok(Self { params, execution })
    }

    pub fn params(&self) -> &CrfParams {
        &self.params
    }

    /// Refine `unary` (batch, classes, *spatial) guided by `features`
    /// (batch, channels, *spatial).
    ///
    /// Returns a volume of the same shape as `unary` whose class vectors are
    /// non-negative and sum to 1 at every site.
    pub fn infer(
        &self,
        unary: &ArrayD<f32>,
        features: &ArrayD<f32>,
    ) -> Result<ArrayD<f32>, CrfError> {
        self.run(unary, features, None).map(|(volume, _)| volume)
    }

    /// [`CrfEngine::infer`] with a cooperative cancellation token.
    pub fn infer_cancellable(
        &self,
        unary: &ArrayD<f32>,
        features: &ArrayD<f32>,
        cancel: &CancelToken,
    ) -> Result<ArrayD<f32>, CrfError> {
        self.run(unary, features, Some(cancel))
            .map(|(volume, _)| volume)
    }

    /// [`CrfEngine::infer`] plus a timing report.
    pub fn infer_with_diagnostics(
        &self,
        unary: &ArrayD<f32>,
        features: &ArrayD<f32>,
    ) -> Result<(ArrayD<f32>, InferenceReport), CrfError> {
        self.run(unary, features, None)
    }

    fn run(
        &self,
        unary: &ArrayD<f32>,
        features: &ArrayD<f32>,
        cancel: Option<&CancelToken>,
    ) -> Result<(ArrayD<f32>, InferenceReport), CrfError> {
        let started = Instant::now();
        let layout = check_pair(unary, features)?;
        self.params.validate_classes(layout.classes)?;

        let sites = layout.sites();
        let stride = layout.classes * sites;
        let feature_stride = layout.channels * sites;

        let unary_data = unary.as_standard_layout();
        let unary_slice = unary_data.as_slice().expect("standard layout is contiguous");
        let feature_data = features.as_standard_layout();
        let feature_slice = feature_data
            .as_slice()
            .expect("standard layout is contiguous");

        let mut out = vec![0.0f32; unary_slice.len()];
        let mut report = InferenceReport {
            batches: layout.batch,
            classes: layout.classes,
            sites,
            ..Default::default()
        };

        let traces = self.run_batches(
            unary_slice,
            feature_slice,
            &layout,
            stride,
            feature_stride,
            &mut out,
            cancel,
        )?;

        for trace in &traces {
            report.planning_ms += trace.planning_ms;
            report.absorb(&trace.iterations);
        }
        report.total_ms = started.elapsed().as_secs_f64() * 1e3;

        let volume = ArrayD::from_shape_vec(unary.shape().to_vec(), out)
            .expect("output buffer matches input shape");
        Ok((volume, report))
    }

    /// Dispatch the per-batch workers.
    ///
    /// The parallel path needs both the `parallel` feature and a volume
    /// above the configured threshold; everything else runs sequentially.
    #[allow(clippy::too_many_arguments)]
    fn run_batches(
        &self,
        unary: &[f32],
        features: &[f32],
        layout: &VolumeLayout,
        stride: usize,
        feature_stride: usize,
        out: &mut [f32],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<BatchTrace>, CrfError> {
        if self
            .execution
            .should_parallelize(layout.batch * layout.sites())
        {
            #[cfg(feature = "parallel")]
            {
                return self.run_batches_parallel(
                    unary,
                    features,
                    layout,
                    stride,
                    feature_stride,
                    out,
                    cancel,
                );
            }
        }

        self.run_batches_sequential(
            unary,
            features,
            layout,
            stride,
            feature_stride,
            out,
            cancel,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_batches_sequential(
        &self,
        unary: &[f32],
        features: &[f32],
        layout: &VolumeLayout,
        stride: usize,
        feature_stride: usize,
        out: &mut [f32],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<BatchTrace>, CrfError> {
        out.chunks_mut(stride)
            .enumerate()
            .map(|(batch, out_block)| {
                self.run_batch(
                    batch,
                    &unary[batch * stride..(batch + 1) * stride],
                    &features[batch * feature_stride..(batch + 1) * feature_stride],
                    layout,
                    out_block,
                    cancel,
                    false,
                )
            })
            .collect()
    }

    #[cfg(feature = "parallel")]
    #[allow(clippy::too_many_arguments)]
    fn run_batches_parallel(
        &self,
        unary: &[f32],
        features: &[f32],
        layout: &VolumeLayout,
        stride: usize,
        feature_stride: usize,
        out: &mut [f32],
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<BatchTrace>, CrfError> {
        use rayon::prelude::*;

        out.par_chunks_mut(stride)
            .enumerate()
            .map(|(batch, out_block)| {
                self.run_batch(
                    batch,
                    &unary[batch * stride..(batch + 1) * stride],
                    &features[batch * feature_stride..(batch + 1) * feature_stride],
                    layout,
                    out_block,
                    cancel,
                    true,
                )
            })
            .collect()
    }

    /// One batch element: plan the two lattices, then iterate.
    #[allow(clippy::too_many_arguments)]
    fn run_batch(
        &self,
        batch: usize,
        unary: &[f32],
        features: &[f32],
        layout: &VolumeLayout,
        out: &mut [f32],
        cancel: Option<&CancelToken>,
        parallel_filters: bool,
    ) -> Result<BatchTrace, CrfError> {
        let params = &self.params;
        let sites = layout.sites();
        let classes = layout.classes;
        let stride = classes * sites;

        let planning_start = Instant::now();
        let bilateral_plan = LatticePlan::new(&bilateral_embedding(
            &layout.spatial,
            params.bilateral_spatial_sigma,
            features,
            layout.channels,
            params.bilateral_color_sigma,
        ));
        let gaussian_plan = LatticePlan::new(&spatial_embedding(
            &layout.spatial,
            params.gaussian_spatial_sigma,
        ));
        let planning_ms = planning_start.elapsed().as_secs_f64() * 1e3;

        // Double-buffered running estimate, swapped at iteration end.
        let mut q = vec![0.0f32; stride];
        softmax_sites(unary, classes, sites, &mut q);
        let mut q_next = vec![0.0f32; stride];

        let mut bilateral_out = vec![0.0f32; stride];
        let mut gaussian_out = vec![0.0f32; stride];
        let mut combined = vec![0.0f32; stride];
        let mut iterations = Vec::with_capacity(params.iterations);

        for iteration in 0..params.iterations {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(CrfError::Cancelled);
                }
            }

            let (bilateral_ms, gaussian_ms) = run_filter_pair(
                &bilateral_plan,
                &gaussian_plan,
                &q,
                classes,
                &mut bilateral_out,
                &mut gaussian_out,
                parallel_filters,
            );

            let update_start = Instant::now();
            for i in 0..stride {
                combined[i] = params.bilateral_weight * bilateral_out[i]
                    + params.gaussian_weight * gaussian_out[i];
            }
            if let Some(matrix) = &params.compatibility_matrix {
                apply_compatibility(&mut combined, classes, sites, matrix);
            }
            // blend against the original unary volume and renormalize
            for i in 0..stride {
                combined[i] = unary[i] + params.update_factor * combined[i];
            }
            softmax_sites(&combined, classes, sites, &mut q_next);
            std::mem::swap(&mut q, &mut q_next);
            let update_ms = update_start.elapsed().as_secs_f64() * 1e3;

            debug!(
                "batch {batch} iteration {iteration}: bilateral {bilateral_ms:.3} ms, \
                 gaussian {gaussian_ms:.3} ms, update {update_ms:.3} ms"
            );
            iterations.push(IterationTiming {
                iteration,
                bilateral_ms,
                gaussian_ms,
                update_ms,
            });
        }

        out.copy_from_slice(&q);
        Ok(BatchTrace {
            planning_ms,
            iterations,
        })
    }
}

struct BatchTrace {
    planning_ms: f64,
    iterations: Vec<IterationTiming>,
}

fn run_filter_pair(
    bilateral_plan: &LatticePlan,
    gaussian_plan: &LatticePlan,
    q: &[f32],
    classes: usize,
    bilateral_out: &mut [f32],
    gaussian_out: &mut [f32],
    parallel: bool,
) -> (f64, f64) {
    #[cfg(feature = "parallel")]
    if parallel {
        return rayon::join(
            || timed_filter(bilateral_plan, q, classes, bilateral_out),
            || timed_filter(gaussian_plan, q, classes, gaussian_out),
        );
    }
    let _ = parallel;
    (
        timed_filter(bilateral_plan, q, classes, bilateral_out),
        timed_filter(gaussian_plan, q, classes, gaussian_out),
    )
}

fn timed_filter(plan: &LatticePlan, q: &[f32], classes: usize, out: &mut [f32]) -> f64 {
    let start = Instant::now();
    plan.filter(q, classes, out);
    start.elapsed().as_secs_f64() * 1e3
}
