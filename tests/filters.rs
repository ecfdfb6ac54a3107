mod common;

use common::fixtures::volume;
use dense_crf::{bilateral_filter, spatial_filter, CrfError};

#[test]
fn filters_preserve_shape_and_constants() {
    let probability = volume(&[2, 3, 4, 4], &[0.5; 2 * 3 * 16]);
    let features = volume(&[2, 1, 4, 4], &[0.25; 2 * 16]);

    let bilateral = bilateral_filter(&probability, &features, 3.0, 0.5).unwrap();
    assert_eq!(bilateral.shape(), probability.shape());
    for v in bilateral.iter() {
        assert!((v - 0.5).abs() < 1e-5, "constant plane must pass through: {v}");
    }

    let spatial = spatial_filter(&probability, 3.0).unwrap();
    assert_eq!(spatial.shape(), probability.shape());
    for v in spatial.iter() {
        assert!((v - 0.5).abs() < 1e-5);
    }
}

#[test]
fn bilateral_respects_feature_edges_more_than_spatial() {
    // step in the probabilities aligned with a strong feature edge
    let mut prob = vec![0.0f32; 16];
    prob[8..].fill(1.0);
    let mut feat = vec![0.0f32; 16];
    feat[8..].fill(4.0);
    let probability = volume(&[1, 1, 16], &prob);
    let features = volume(&[1, 1, 16], &feat);

    let bilateral = bilateral_filter(&probability, &features, 4.0, 0.25).unwrap();
    let spatial = spatial_filter(&probability, 4.0).unwrap();

    // the spatial filter bleeds across the step, the bilateral filter holds it
    let bilateral_bleed = bilateral[[0, 0, 7]];
    let spatial_bleed = spatial[[0, 0, 7]];
    assert!(
        bilateral_bleed < spatial_bleed,
        "bilateral bleed {bilateral_bleed} should stay below spatial bleed {spatial_bleed}"
    );
    assert!(bilateral_bleed < 0.05);
    assert!(spatial_bleed > 0.2);
}

#[test]
fn filter_output_stays_within_input_range() {
    let probability = volume(
        &[1, 2, 5],
        &[0.8, 0.9, 0.6, 0.2, 0.3, 0.1, 0.3, 0.5, 0.8, 0.7],
    );
    let features = volume(&[1, 1, 5], &[1.0, 1.0, 1.0, 0.5, 0.0]);
    let filtered = bilateral_filter(&probability, &features, 5.0, 0.5).unwrap();
    // weighted averages cannot escape the per-class input range
    for class in 0..2 {
        let inputs: Vec<f32> = (0..5).map(|i| probability[[0, class, i]]).collect();
        let (lo, hi) = (
            inputs.iter().cloned().fold(f32::INFINITY, f32::min),
            inputs.iter().cloned().fold(f32::NEG_INFINITY, f32::max),
        );
        for site in 0..5 {
            let v = filtered[[0, class, site]];
            assert!(
                v >= lo - 1e-4 && v <= hi + 1e-4,
                "class {class} site {site}: {v} outside [{lo}, {hi}]"
            );
        }
    }
}

#[test]
fn invalid_sigma_rejected() {
    let probability = volume(&[1, 1, 4], &[0.0; 4]);
    let features = volume(&[1, 1, 4], &[0.0; 4]);
    assert!(matches!(
        bilateral_filter(&probability, &features, 0.0, 0.5),
        Err(CrfError::InvalidParameter {
            name: "spatial_sigma",
            ..
        })
    ));
    assert!(matches!(
        bilateral_filter(&probability, &features, 1.0, -1.0),
        Err(CrfError::InvalidParameter {
            name: "color_sigma",
            ..
        })
    ));
    assert!(spatial_filter(&probability, f32::NAN).is_err());
}

#[test]
fn mismatched_pair_rejected() {
    let probability = volume(&[1, 2, 8], &[0.0; 16]);
    let features = volume(&[1, 1, 9], &[0.0; 9]);
    assert!(matches!(
        bilateral_filter(&probability, &features, 1.0, 1.0),
        Err(CrfError::ShapeMismatch { .. })
    ));
}
