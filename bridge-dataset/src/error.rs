//! Error taxonomy for the bridge dataset pipeline.
//!
//! Fatal conditions are errors; recoverable ones (`MissingLegScan`,
//! `Undersampled`) are flags on the bridge record, see [`crate::manifest::RecordFlag`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter sampling could not produce a configuration within bounds.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("constraint violation after {attempts} attempt(s): {reason}")]
    ConstraintViolation { attempts: u32, reason: String },
}

impl SamplingError {
    /// Retry budget exhausted after `attempts` draws.
    pub fn violation(attempts: u32, reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            attempts,
            reason: reason.into(),
        }
    }
}

/// Derived geometry would be negative or degenerate.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry for {component}: {reason}")]
    GeometryConstraint { component: String, reason: String },
}

impl GeometryError {
    /// Degenerate or out-of-range geometry in `component`.
    pub fn constraint(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GeometryConstraint {
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// Attribute a primitive-level failure to the component being built.
    pub fn for_component(self, name: &str) -> Self {
        let GeometryError::GeometryConstraint { component, reason } = self;
        Self::GeometryConstraint {
            component: name.to_string(),
            reason: format!("{component}: {reason}"),
        }
    }
}

/// Scanner placement failed or its settings are invalid.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("scanner leg {leg} at ({x:.2}, {y:.2}, {z:.2}) lies inside the bridge envelope")]
    ScannerInsideEnvelope { leg: usize, x: f64, y: f64, z: f64 },

    #[error("invalid planner offset {name}: {value}")]
    InvalidOffset { name: &'static str, value: f64 },

    #[error("cannot plan scans around an empty envelope")]
    EmptyEnvelope,
}

/// Simulator, scan file or scene document failure. Per-leg errors become missing legs.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("XML write error: {0}")]
    Xml(String),

    #[error("failed to launch simulator {executable}: {source}")]
    Launch {
        executable: String,
        source: std::io::Error,
    },

    #[error("leg {leg} timed out after {secs}s")]
    Timeout { leg: usize, secs: u64 },

    #[error("simulator exited with {status} on leg {leg}")]
    SimulatorFailed { leg: usize, status: String },

    #[error("no point output found for leg {leg}")]
    NoOutput { leg: usize },

    #[error("malformed point record in {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Labelling could not run or its settings are invalid.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("no scan points to segment")]
    EmptyPointCloud,

    #[error("no components to classify against")]
    NoComponents,

    #[error("invalid segmentation parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Configuration could not be read or is inconsistent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Per-bridge fatal error. One bridge failing never aborts the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LAS error: {0}")]
    Las(#[from] las::Error),

    #[error("cancelled before completion")]
    Cancelled,
}

/// Terminal failure category written to the dataset summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConstraintViolation,
    GeometryConstraintError,
    PlanningError,
    AcquisitionError,
    SegmentationError,
    OutputError,
    Cancelled,
}

impl PipelineError {
    /// Summary category for this failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Sampling(_) => FailureKind::ConstraintViolation,
            PipelineError::Geometry(_) => FailureKind::GeometryConstraintError,
            PipelineError::Planning(_) => FailureKind::PlanningError,
            PipelineError::Acquisition(_) => FailureKind::AcquisitionError,
            PipelineError::Segmentation(_) => FailureKind::SegmentationError,
            PipelineError::Io(_) | PipelineError::Json(_) | PipelineError::Las(_) => {
                FailureKind::OutputError
            }
            PipelineError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Result of one bridge stage.
pub type PipelineResult<T> = Result<T, PipelineError>;
