//! JSON-backed configuration for the demo binary.

use crate::params::CrfParams;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputConfig {
    /// Optional path for the JSON timing report.
    pub report_out: Option<PathBuf>,
}

/// Demo run description: synthetic volume extents plus engine parameters.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DemoConfig {
    pub width: usize,
    pub height: usize,
    pub classes: usize,
    pub noise_amplitude: f32,
    pub output: OutputConfig,
    pub crf_params: CrfParams,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            width: 96,
            height: 64,
            classes: 2,
            noise_amplitude: 0.35,
            output: OutputConfig::default(),
            crf_params: CrfParams::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<DemoConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: DemoConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}
