use dense_crf::config::{load_config, DemoConfig};
use dense_crf::{CrfEngine, CrfError};
use ndarray::ArrayD;
use std::env;
use std::path::Path;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => load_config(Path::new(&path))?,
        None => DemoConfig::default(),
    };

    let (unary, features) = synthetic_scene(&config);
    let engine =
        CrfEngine::new(config.crf_params.clone()).map_err(|e: CrfError| e.to_string())?;
    let (refined, report) = engine
        .infer_with_diagnostics(&unary, &features)
        .map_err(|e| e.to_string())?;

    let noisy = misaligned_sites(&unary, &config);
    let remaining = misaligned_sites(&refined, &config);
    println!(
        "{}x{} sites, {} classes, {} iterations",
        config.width,
        config.height,
        config.classes,
        config.crf_params.iterations
    );
    println!(
        "sites disagreeing with the feature edge: {noisy} -> {remaining} \
         (total {:.3} ms, planning {:.3} ms)",
        report.total_ms, report.planning_ms
    );

    if let Some(path) = &config.output.report_out {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {e}"))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        println!("Timing report written to {}", path.display());
    }
    Ok(())
}

/// Two-region scene: the feature volume carries a clean vertical edge, the
/// unary volume the same edge corrupted by deterministic pseudo-noise.
fn synthetic_scene(config: &DemoConfig) -> (ArrayD<f32>, ArrayD<f32>) {
    let (w, h, classes) = (config.width, config.height, config.classes);
    let sites = w * h;
    let split = w / 2;

    let mut unary = vec![0.0f32; classes * sites];
    let mut features = vec![0.0f32; sites];
    let mut state = 0x2545_f491_4f6c_dd1du64;
    for y in 0..h {
        for x in 0..w {
            let site = y * w + x;
            let label = usize::from(x >= split) % classes;
            features[site] = if x >= split { 1.0 } else { 0.0 };
            for class in 0..classes {
                // xorshift noise in [-1, 1] scaled by the configured amplitude
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let noise = (state >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0;
                let signal = if class == label { 1.0 } else { 0.0 };
                unary[class * sites + site] = signal + config.noise_amplitude * noise;
            }
        }
    }

    let unary = ArrayD::from_shape_vec(vec![1, classes, h, w], unary)
        .expect("unary buffer matches shape");
    let features = ArrayD::from_shape_vec(vec![1, 1, h, w], features)
        .expect("feature buffer matches shape");
    (unary, features)
}

/// Count sites whose argmax class disagrees with the clean edge labeling.
fn misaligned_sites(volume: &ArrayD<f32>, config: &DemoConfig) -> usize {
    let (w, h, classes) = (config.width, config.height, config.classes);
    let split = w / 2;
    let mut count = 0usize;
    for y in 0..h {
        for x in 0..w {
            let expected = usize::from(x >= split) % classes;
            let mut best = 0usize;
            for class in 1..classes {
                if volume[[0, class, y, x]] > volume[[0, best, y, x]] {
                    best = class;
                }
            }
            if best != expected {
                count += 1;
            }
        }
    }
    count
}
