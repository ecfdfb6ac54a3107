#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod engine;
pub mod error;
pub mod filters;
pub mod params;
pub mod volume;

// Building blocks – still public, but considered unstable internals.
pub mod compat;
pub mod config;
pub mod diagnostics;
pub mod features;
pub mod lattice;

// --- High-level re-exports -------------------------------------------------

// Main entry points: engine + configuration.
pub use crate::engine::{CancelToken, CrfEngine, ExecutionOptions};
pub use crate::error::CrfError;
pub use crate::params::CrfParams;

// Diagnostics returned by `infer_with_diagnostics`.
pub use crate::diagnostics::{InferenceReport, IterationTiming};

// Standalone filter passes, generally useful on their own.
pub use crate::filters::{bilateral_filter, spatial_filter};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use dense_crf::prelude::*;
/// use ndarray::ArrayD;
///
/// # fn main() -> Result<(), CrfError> {
/// let unary = ArrayD::<f32>::zeros(vec![1, 2, 32, 32]);
/// let features = ArrayD::<f32>::zeros(vec![1, 1, 32, 32]);
///
/// let engine = CrfEngine::new(CrfParams::default())?;
/// let refined = engine.infer(&unary, &features)?;
/// assert_eq!(refined.shape(), unary.shape());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::{CrfEngine, CrfError, CrfParams, ExecutionOptions};
}
