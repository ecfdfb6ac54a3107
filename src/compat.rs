//! Class-compatibility transform applied to combined messages.
//!
//! Maps each site's per-class message vector `m` to `m^T · M`, so entry `c`
//! of the result accumulates how strongly every incoming class supports
//! class `c`. Absent a matrix the update step skips this transform
//! entirely.

use nalgebra::DMatrix;

/// Apply the `(classes, classes)` interaction matrix to a class-major
/// message slice, in place.
///
/// The matrix side must equal `classes`; callers validate that before the
/// iteration loop starts.
pub fn apply_compatibility(
    message: &mut [f32],
    classes: usize,
    sites: usize,
    matrix: &DMatrix<f32>,
) {
    debug_assert_eq!(message.len(), classes * sites);
    debug_assert_eq!(matrix.nrows(), classes);
    debug_assert_eq!(matrix.ncols(), classes);

    let mut incoming = vec![0.0f32; classes];
    for site in 0..sites {
        for class in 0..classes {
            incoming[class] = message[class * sites + site];
        }
        for class in 0..classes {
            let mut acc = 0.0f32;
            for (k, &m) in incoming.iter().enumerate() {
                acc += m * matrix[(k, class)];
            }
            message[class * sites + site] = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_identity_scales_messages() {
        let mut message = vec![0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6];
        apply_compatibility(&mut message, 2, 3, &(DMatrix::identity(2, 2) * 2.0));
        assert_eq!(message, vec![0.2, 0.4, 0.6, 0.8, 1.0, 1.2]);
    }

    #[test]
    fn off_diagonal_mixes_classes() {
        // M = [[0, 1], [1, 0]] swaps the two class planes
        let matrix = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let mut message = vec![1.0f32, 2.0, 10.0, 20.0];
        apply_compatibility(&mut message, 2, 2, &matrix);
        assert_eq!(message, vec![10.0, 20.0, 1.0, 2.0]);
    }
}
