//! Run configuration, loaded from JSON and resolved once per run.

use std::path::{Path, PathBuf};

use constants::scanner::DEFAULT_LEG_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};

use crate::acquisition::ScanSimulator;
use crate::acquisition::helios::HeliosSimulator;
use crate::acquisition::surrogate::{SurrogateConfig, SurrogateSimulator};
use crate::error::ConfigError;
use crate::planner::PlannerConfig;
use crate::sampler::SamplerOverrides;
use crate::segmentation::SegmentationParams;

/// Parameter sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Draws attempted before a bridge fails with a constraint violation.
    pub max_attempts: u32,
    /// Parameters pinned for every bridge in the batch.
    pub overrides: SamplerOverrides,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            overrides: SamplerOverrides::default(),
        }
    }
}

/// Scan simulator used for acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SimulatorBackend {
    /// External HELIOS++ executable.
    Helios,
    /// Built-in surface sampler.
    Surrogate,
}

/// Scan simulator selection and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulator that produces the raw scans.
    pub backend: SimulatorBackend,
    /// HELIOS++ binary. A bare name is looked up on `PATH`.
    pub helios_executable: PathBuf,
    /// Wall-clock limit for one leg before it is recorded as missing.
    pub leg_timeout_secs: u64,
    /// Ask HELIOS++ for LAS output instead of ASCII.
    pub las_output: bool,
    /// Keep each ingested leg as `raw/leg{n}.las`.
    pub write_raw: bool,
    /// Settings of the built-in simulator.
    pub surrogate: SurrogateConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            backend: SimulatorBackend::Surrogate,
            helios_executable: PathBuf::from("helios"),
            leg_timeout_secs: DEFAULT_LEG_TIMEOUT_SECS,
            las_output: true,
            write_raw: true,
            surrogate: SurrogateConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Instantiate the selected backend.
    pub fn build(&self) -> Box<dyn ScanSimulator> {
        match self.backend {
            SimulatorBackend::Helios => Box::new(HeliosSimulator::new(
                self.helios_executable.clone(),
                self.las_output,
            )),
            SimulatorBackend::Surrogate => Box::new(SurrogateSimulator::new(self.surrogate)),
        }
    }
}

/// Batch size, seed, output location and stage toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Dataset root; one directory per bridge is created below it.
    pub output_dir: PathBuf,
    /// Bridges to generate.
    pub bridge_count: usize,
    /// Batch seed every bridge seed derives from.
    pub seed: u64,
    /// Export per-component OBJ meshes.
    pub export_components: bool,
    /// Run scan acquisition.
    pub simulate: bool,
    /// Label the raw scans.
    pub segment: bool,
    /// Write the fixed-size feature array.
    pub convert: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("bridge_dataset"),
            bridge_count: 10,
            seed: 42,
            export_components: true,
            simulate: true,
            segment: true,
            convert: true,
        }
    }
}

/// Complete run configuration. Missing JSON fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parameter sampling.
    pub sampler: SamplerConfig,
    /// Scanner placement.
    pub planner: PlannerConfig,
    /// Scan acquisition.
    pub simulator: SimulatorConfig,
    /// Labelling and feature array.
    pub segmentation: SegmentationParams,
    /// Batch and output layout.
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Check value ranges and that every enabled stage has its prerequisites enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.planner.validate().map_err(|e| ConfigError::Invalid {
            field: "planner",
            reason: e.to_string(),
        })?;
        self.segmentation.validate().map_err(|e| ConfigError::Invalid {
            field: "segmentation",
            reason: e.to_string(),
        })?;
        if self.sampler.max_attempts == 0 {
            return Err(invalid("sampler.max_attempts", "must be at least 1"));
        }
        if self.simulator.leg_timeout_secs == 0 {
            return Err(invalid("simulator.leg_timeout_secs", "must be at least 1"));
        }
        let surrogate = &self.simulator.surrogate;
        if surrogate.points_per_leg == 0 {
            return Err(invalid("simulator.surrogate.points_per_leg", "must be at least 1"));
        }
        if !(surrogate.max_range_m.is_finite() && surrogate.max_range_m > 0.0) {
            return Err(invalid("simulator.surrogate.max_range_m", "must be positive"));
        }
        if !(surrogate.range_noise_m.is_finite() && surrogate.range_noise_m >= 0.0) {
            return Err(invalid("simulator.surrogate.range_noise_m", "must be non-negative"));
        }
        if self.output.bridge_count == 0 {
            return Err(invalid("output.bridge_count", "must be at least 1"));
        }
        if self.output.segment && !self.output.simulate {
            return Err(invalid("output.segment", "segmentation needs simulated scans"));
        }
        if self.output.convert && !self.output.segment {
            return Err(invalid("output.convert", "feature arrays need segmentation"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
