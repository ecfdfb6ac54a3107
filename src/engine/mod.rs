//! Mean-field inference engine.
//!
//! Overview
//! - [`CrfEngine`] binds a validated [`crate::CrfParams`] once and refines
//!   probability volumes through a fixed number of mean-field iterations.
//! - Each iteration filters the running estimate through the bilateral and
//!   spatial lattice plans, combines the two messages, optionally applies
//!   the class-compatibility matrix, and renormalizes against the original
//!   unary volume with a class-axis softmax.
//! - Lattice plans are built once per call (the feature volume is immutable)
//!   and replayed across iterations; the probability estimate is
//!   double-buffered and swapped at iteration end.
//! - [`ExecutionOptions`] selects between the sequential path and the Rayon
//!   path at construction time. Work is partitioned per batch element (plus
//!   the two filter passes of an iteration), which keeps per-batch reduction
//!   order identical to the sequential path.
//! - [`CancelToken`] is consulted once per iteration boundary.
//!
//! Modules
//! - [`options`] – execution strategy configuration.
//! - `pipeline` – the [`CrfEngine`] implementation.

pub mod options;
mod pipeline;

pub use options::ExecutionOptions;
pub use pipeline::{CancelToken, CrfEngine};
