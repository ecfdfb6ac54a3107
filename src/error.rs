//! Error taxonomy for engine construction and inference.
//!
//! All variants are raised synchronously before any iteration runs; a failed
//! call performs no partial work and leaves the engine configuration
//! untouched.

/// Errors reported by [`crate::CrfEngine`] and the standalone filter entry
/// points.
#[derive(Clone, Debug, PartialEq)]
pub enum CrfError {
    /// A scalar hyperparameter is outside its valid range (non-positive
    /// sigma, zero iterations, non-finite weight).
    InvalidParameter { name: &'static str, value: f64 },
    /// Probability and feature volumes disagree on batch size or spatial
    /// extents, or a volume is missing the `(batch, channels, *spatial)`
    /// leading axes.
    ShapeMismatch {
        unary: Vec<usize>,
        features: Vec<usize>,
    },
    /// The compatibility matrix is not square with side `classes`.
    CompatibilityShape {
        rows: usize,
        cols: usize,
        classes: usize,
    },
    /// The cancellation token was set at an iteration boundary.
    Cancelled,
}

impl std::fmt::Display for CrfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrfError::InvalidParameter { name, value } => {
                write!(f, "invalid parameter {name} = {value}")
            }
            CrfError::ShapeMismatch { unary, features } => write!(
                f,
                "probability volume {unary:?} incompatible with feature volume {features:?}"
            ),
            CrfError::CompatibilityShape {
                rows,
                cols,
                classes,
            } => write!(
                f,
                "compatibility matrix is {rows}x{cols}, expected {classes}x{classes}"
            ),
            CrfError::Cancelled => write!(f, "inference cancelled"),
        }
    }
}

impl std::error::Error for CrfError {}
