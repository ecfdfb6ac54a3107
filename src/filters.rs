//! Standalone filter entry points.
//!
//! Both filters compute a normalized weighted average of class-probability
//! vectors over the full volume. [`bilateral_filter`] weights neighbours by
//! spatial and feature-space proximity; [`spatial_filter`] by spatial
//! proximity alone. The engine drives the same machinery through cached
//! lattice plans; these functions are the one-shot form.

use crate::error::CrfError;
use crate::features::{bilateral_embedding, spatial_embedding};
use crate::lattice::LatticePlan;
use crate::volume::check_pair;
use ndarray::ArrayD;

/// Edge-aware filtering of `probability` guided by `features`.
///
/// `weight(i, j) = exp(-||pos_i - pos_j||^2 / (2 spatial_sigma^2)
///                     - ||feat_i - feat_j||^2 / (2 color_sigma^2))`,
/// evaluated through the permutohedral lattice. Output shape equals the
/// probability shape.
pub fn bilateral_filter(
    probability: &ArrayD<f32>,
    features: &ArrayD<f32>,
    spatial_sigma: f32,
    color_sigma: f32,
) -> Result<ArrayD<f32>, CrfError> {
    check_sigma("spatial_sigma", spatial_sigma)?;
    check_sigma("color_sigma", color_sigma)?;
    let layout = check_pair(probability, features)?;
    let sites = layout.sites();
    let stride = layout.classes * sites;
    let feature_stride = layout.channels * sites;

    let prob_data = probability.as_standard_layout();
    let prob_slice = prob_data.as_slice().expect("standard layout is contiguous");
    let feature_data = features.as_standard_layout();
    let feature_slice = feature_data
        .as_slice()
        .expect("standard layout is contiguous");

    let mut out = vec![0.0f32; prob_slice.len()];
    for batch in 0..layout.batch {
        let embedding = bilateral_embedding(
            &layout.spatial,
            spatial_sigma,
            &feature_slice[batch * feature_stride..(batch + 1) * feature_stride],
            layout.channels,
            color_sigma,
        );
        LatticePlan::new(&embedding).filter(
            &prob_slice[batch * stride..(batch + 1) * stride],
            layout.classes,
            &mut out[batch * stride..(batch + 1) * stride],
        );
    }

    Ok(into_volume(probability.shape(), out))
}

/// Purely spatial Gaussian filtering of `probability`.
///
/// Independent of any feature volume; the kernel is
/// `exp(-||pos_i - pos_j||^2 / (2 spatial_sigma^2))`. The lattice plan only
/// depends on the spatial extents, so one plan serves every batch element.
pub fn spatial_filter(
    probability: &ArrayD<f32>,
    spatial_sigma: f32,
) -> Result<ArrayD<f32>, CrfError> {
    check_sigma("spatial_sigma", spatial_sigma)?;
    let shape = probability.shape();
    if shape.len() < 3 || shape.iter().any(|&extent| extent == 0) {
        return Err(CrfError::ShapeMismatch {
            unary: shape.to_vec(),
            features: Vec::new(),
        });
    }
    let (batch, classes) = (shape[0], shape[1]);
    let spatial = shape[2..].to_vec();
    let sites: usize = spatial.iter().product();
    let stride = classes * sites;

    let prob_data = probability.as_standard_layout();
    let prob_slice = prob_data.as_slice().expect("standard layout is contiguous");

    let plan = LatticePlan::new(&spatial_embedding(&spatial, spatial_sigma));
    let mut out = vec![0.0f32; prob_slice.len()];
    for b in 0..batch {
        plan.filter(
            &prob_slice[b * stride..(b + 1) * stride],
            classes,
            &mut out[b * stride..(b + 1) * stride],
        );
    }

    Ok(into_volume(shape, out))
}

fn into_volume(shape: &[usize], data: Vec<f32>) -> ArrayD<f32> {
    ArrayD::from_shape_vec(shape.to_vec(), data).expect("output buffer matches input shape")
}

fn check_sigma(name: &'static str, value: f32) -> Result<(), CrfError> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(CrfError::InvalidParameter {
            name,
            value: value as f64,
        });
    }
    Ok(())
}
