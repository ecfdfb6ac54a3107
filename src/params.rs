//! Hyperparameters configuring a CRF inference engine.
//!
//! One struct with public fields and library defaults; bound once at engine
//! construction and never mutated during inference. Validation is fail-fast:
//! [`CrfParams::validate`] runs before any computation starts.

use crate::error::CrfError;
use nalgebra::DMatrix;
use serde::Deserialize;

/// Mean-field CRF hyperparameters.
///
/// Defaults favour mild edge-aware smoothing and match the conventional
/// dense-CRF settings for segmentation refinement. For tuning, start with
/// the two message weights and the colour sigma.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrfParams {
    /// Number of mean-field iterations (>= 1).
    pub iterations: usize,
    /// Weight applied to the bilateral (edge-aware) message.
    pub bilateral_weight: f32,
    /// Weight applied to the purely spatial Gaussian message.
    pub gaussian_weight: f32,
    /// Spatial standard deviation of the bilateral kernel (> 0).
    pub bilateral_spatial_sigma: f32,
    /// Feature-space standard deviation of the bilateral kernel (> 0).
    pub bilateral_color_sigma: f32,
    /// Spatial standard deviation of the Gaussian kernel (> 0).
    pub gaussian_spatial_sigma: f32,
    /// Blend rate applied to the combined message before renormalization.
    pub update_factor: f32,
    /// Optional `(classes, classes)` class-interaction matrix. When absent
    /// the combined message passes through unchanged.
    pub compatibility_matrix: Option<DMatrix<f32>>,
}

impl Default for CrfParams {
    fn default() -> Self {
        Self {
            iterations: 5,
            bilateral_weight: 3.0,
            gaussian_weight: 1.0,
            bilateral_spatial_sigma: 5.0,
            bilateral_color_sigma: 0.5,
            gaussian_spatial_sigma: 5.0,
            update_factor: 3.0,
            compatibility_matrix: None,
        }
    }
}

impl CrfParams {
    /// Check scalar ranges and compatibility-matrix squareness.
    ///
    /// The matrix side is checked against the class count separately at
    /// inference time, once the probability volume is known.
    pub fn validate(&self) -> Result<(), CrfError> {
        if self.iterations == 0 {
            return Err(CrfError::InvalidParameter {
                name: "iterations",
                value: 0.0,
            });
        }
        for (name, value) in [
            ("bilateral_spatial_sigma", self.bilateral_spatial_sigma),
            ("bilateral_color_sigma", self.bilateral_color_sigma),
            ("gaussian_spatial_sigma", self.gaussian_spatial_sigma),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(CrfError::InvalidParameter {
                    name,
                    value: value as f64,
                });
            }
        }
        for (name, value) in [
            ("bilateral_weight", self.bilateral_weight),
            ("gaussian_weight", self.gaussian_weight),
            ("update_factor", self.update_factor),
        ] {
            if !value.is_finite() {
                return Err(CrfError::InvalidParameter {
                    name,
                    value: value as f64,
                });
            }
        }
        if let Some(matrix) = &self.compatibility_matrix {
            if matrix.nrows() != matrix.ncols() {
                return Err(CrfError::CompatibilityShape {
                    rows: matrix.nrows(),
                    cols: matrix.ncols(),
                    classes: matrix.nrows(),
                });
            }
        }
        Ok(())
    }

    /// Check the compatibility matrix against the class count of an input.
    pub(crate) fn validate_classes(&self, classes: usize) -> Result<(), CrfError> {
        if let Some(matrix) = &self.compatibility_matrix {
            if matrix.nrows() != classes || matrix.ncols() != classes {
                return Err(CrfError::CompatibilityShape {
                    rows: matrix.nrows(),
                    cols: matrix.ncols(),
                    classes,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        assert!(CrfParams::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_rejected() {
        let params = CrfParams {
            iterations: 0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(CrfError::InvalidParameter {
                name: "iterations",
                value: 0.0
            })
        );
    }

    #[test]
    fn non_positive_sigma_rejected() {
        for sigma in [0.0, -1.5, f32::NAN] {
            let params = CrfParams {
                bilateral_spatial_sigma: sigma,
                ..Default::default()
            };
            assert!(
                matches!(
                    params.validate(),
                    Err(CrfError::InvalidParameter {
                        name: "bilateral_spatial_sigma",
                        ..
                    })
                ),
                "sigma {sigma} should be rejected"
            );
        }
    }

    #[test]
    fn rectangular_matrix_rejected() {
        let params = CrfParams {
            compatibility_matrix: Some(DMatrix::zeros(2, 3)),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(CrfError::CompatibilityShape { rows: 2, cols: 3, .. })
        ));
    }

    #[test]
    fn matrix_side_checked_against_classes() {
        let params = CrfParams {
            compatibility_matrix: Some(DMatrix::identity(2, 2)),
            ..Default::default()
        };
        assert!(params.validate_classes(2).is_ok());
        assert!(matches!(
            params.validate_classes(3),
            Err(CrfError::CompatibilityShape {
                rows: 2,
                cols: 2,
                classes: 3
            })
        ));
    }
}
