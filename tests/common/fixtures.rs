use ndarray::ArrayD;

/// Build a volume from a flat class-major buffer.
pub fn volume(shape: &[usize], data: &[f32]) -> ArrayD<f32> {
    assert_eq!(
        shape.iter().product::<usize>(),
        data.len(),
        "fixture shape must match data length"
    );
    ArrayD::from_shape_vec(shape.to_vec(), data.to_vec()).unwrap()
}

/// The 1-D two-class scenario shared by several tests: two identical unary
/// batches, per-batch feature rows with an edge at different positions.
pub fn two_batch_1d() -> (ArrayD<f32>, ArrayD<f32>) {
    let unary = volume(
        &[2, 2, 5],
        &[
            0.8, 0.9, 0.6, 0.2, 0.3, // batch 0, class 0
            0.1, 0.3, 0.5, 0.8, 0.7, // batch 0, class 1
            0.8, 0.9, 0.6, 0.2, 0.3, // batch 1, class 0
            0.1, 0.3, 0.5, 0.8, 0.7, // batch 1, class 1
        ],
    );
    let features = volume(
        &[2, 1, 5],
        &[
            1.0, 1.0, 1.0, 0.5, 0.0, // batch 0
            1.0, 1.0, 0.5, 0.0, 0.0, // batch 1
        ],
    );
    (unary, features)
}

/// Assert element-wise agreement within `atol`, with a located failure
/// message.
pub fn assert_volume_close(actual: &ArrayD<f32>, expected: &[f32], atol: f32) {
    assert_eq!(actual.len(), expected.len(), "element count mismatch");
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= atol,
            "element {index}: got {a}, expected {e} (atol {atol})"
        );
    }
}

/// Assert every site's class vector is non-negative and sums to 1.
pub fn assert_normalized(volume: &ArrayD<f32>, atol: f32) {
    let shape = volume.shape();
    let (batch, classes) = (shape[0], shape[1]);
    let sites: usize = shape[2..].iter().product();
    let data = volume.as_slice().unwrap();
    for b in 0..batch {
        let block = &data[b * classes * sites..(b + 1) * classes * sites];
        for site in 0..sites {
            let mut sum = 0.0f32;
            for class in 0..classes {
                let v = block[class * sites + site];
                assert!(v >= 0.0, "batch {b} site {site} class {class}: negative {v}");
                sum += v;
            }
            assert!(
                (sum - 1.0).abs() <= atol,
                "batch {b} site {site}: class sum {sum}"
            );
        }
    }
}
