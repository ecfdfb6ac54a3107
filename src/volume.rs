//! Shape bookkeeping and class-axis numerics for dense volumes.
//!
//! Volumes follow the channel-first convention: probabilities are
//! `(batch, classes, *spatial)` and features `(batch, channels, *spatial)`
//! with 1-3 spatial axes. Per batch element the data is handled as a
//! class-major slice (`classes` blocks of `sites` contiguous values), which
//! is exactly the memory order of a standard-layout `ndarray` volume.

use crate::error::CrfError;
use ndarray::ArrayD;

/// Axis breakdown shared by a probability/feature volume pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeLayout {
    /// Leading batch extent (shared by both volumes).
    pub batch: usize,
    /// Class count of the probability volume.
    pub classes: usize,
    /// Channel count of the feature volume.
    pub channels: usize,
    /// Spatial extents (shared by both volumes).
    pub spatial: Vec<usize>,
}

impl VolumeLayout {
    /// Number of spatial locations per batch element.
    pub fn sites(&self) -> usize {
        self.spatial.iter().product()
    }
}

/// Validate a probability/feature pair and derive the common layout.
///
/// Both volumes need at least one spatial axis and must agree on batch size
/// and spatial extents. Runs before any filtering; no partial work happens
/// on failure.
pub fn check_pair(
    unary: &ArrayD<f32>,
    features: &ArrayD<f32>,
) -> Result<VolumeLayout, CrfError> {
    let us = unary.shape();
    let fs = features.shape();
    let mismatch = || CrfError::ShapeMismatch {
        unary: us.to_vec(),
        features: fs.to_vec(),
    };

    if us.len() < 3 || fs.len() != us.len() {
        return Err(mismatch());
    }
    if us[0] != fs[0] || us[2..] != fs[2..] {
        return Err(mismatch());
    }
    if us.iter().any(|&extent| extent == 0) || fs[1] == 0 {
        return Err(mismatch());
    }

    Ok(VolumeLayout {
        batch: us[0],
        classes: us[1],
        channels: fs[1],
        spatial: us[2..].to_vec(),
    })
}

/// Softmax over the class axis of one class-major batch slice.
///
/// `logits` and `out` hold `classes * sites` values; every spatial site gets
/// a non-negative class vector summing to 1. The subtracted per-site maximum
/// keeps the exponentials bounded.
pub fn softmax_sites(logits: &[f32], classes: usize, sites: usize, out: &mut [f32]) {
    debug_assert_eq!(logits.len(), classes * sites);
    debug_assert_eq!(out.len(), classes * sites);

    for site in 0..sites {
        let mut max = f32::NEG_INFINITY;
        for class in 0..classes {
            max = max.max(logits[class * sites + site]);
        }
        let mut sum = 0.0f32;
        for class in 0..classes {
            let e = (logits[class * sites + site] - max).exp();
            out[class * sites + site] = e;
            sum += e;
        }
        let inv = 1.0 / sum;
        for class in 0..classes {
            out[class * sites + site] *= inv;
        }
    }
}

/// Clamp-and-rescale an arbitrary volume into per-site distributions.
///
/// Negative entries clamp to zero; each site's class vector is divided by
/// its sum, falling back to the uniform distribution when the sum vanishes.
/// Idempotent on already-normalized input up to floating-point noise.
pub fn normalize_class_axis(volume: &mut ArrayD<f32>) -> Result<(), CrfError> {
    let shape = volume.shape().to_vec();
    if shape.len() < 3 {
        return Err(CrfError::ShapeMismatch {
            unary: shape,
            features: Vec::new(),
        });
    }
    let batch = shape[0];
    let classes = shape[1];
    let sites: usize = shape[2..].iter().product();

    if volume.as_slice_mut().is_none() {
        *volume = volume.as_standard_layout().to_owned();
    }
    let data = volume
        .as_slice_mut()
        .expect("standard layout after conversion");
    let uniform = 1.0 / classes as f32;
    for b in 0..batch {
        let block = &mut data[b * classes * sites..(b + 1) * classes * sites];
        for site in 0..sites {
            let mut sum = 0.0f32;
            for class in 0..classes {
                let v = block[class * sites + site].max(0.0);
                block[class * sites + site] = v;
                sum += v;
            }
            if sum > 0.0 {
                let inv = 1.0 / sum;
                for class in 0..classes {
                    block[class * sites + site] *= inv;
                }
            } else {
                for class in 0..classes {
                    block[class * sites + site] = uniform;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn pair_layout_derived() {
        let unary = ArrayD::<f32>::zeros(vec![2, 3, 4, 5]);
        let features = ArrayD::<f32>::zeros(vec![2, 1, 4, 5]);
        let layout = check_pair(&unary, &features).unwrap();
        assert_eq!(layout.batch, 2);
        assert_eq!(layout.classes, 3);
        assert_eq!(layout.channels, 1);
        assert_eq!(layout.spatial, vec![4, 5]);
        assert_eq!(layout.sites(), 20);
    }

    #[test]
    fn mismatched_spatial_rejected() {
        let unary = ArrayD::<f32>::zeros(vec![1, 2, 4, 4]);
        let features = ArrayD::<f32>::zeros(vec![1, 1, 4, 5]);
        assert!(matches!(
            check_pair(&unary, &features),
            Err(CrfError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn mismatched_batch_rejected() {
        let unary = ArrayD::<f32>::zeros(vec![2, 2, 4]);
        let features = ArrayD::<f32>::zeros(vec![1, 1, 4]);
        assert!(check_pair(&unary, &features).is_err());
    }

    #[test]
    fn softmax_sums_to_one() {
        let logits = [0.8f32, 0.9, 0.6, 0.1, 0.3, 0.5];
        let mut out = [0.0f32; 6];
        softmax_sites(&logits, 2, 3, &mut out);
        for site in 0..3 {
            let sum = out[site] + out[3 + site];
            assert!((sum - 1.0).abs() < 1e-6, "site {site} sums to {sum}");
        }
        // larger logit wins
        assert!(out[0] > out[3]);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut volume =
            ArrayD::from_shape_vec(vec![1, 2, 3], vec![0.8, 0.9, -0.1, 0.1, 0.3, 0.0]).unwrap();
        normalize_class_axis(&mut volume).unwrap();
        let first = volume.clone();
        normalize_class_axis(&mut volume).unwrap();
        for (a, b) in first.iter().zip(volume.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        // zero-sum site fell back to uniform
        assert!((volume[[0, 0, 2]] - 0.5).abs() < 1e-6);
    }
}
