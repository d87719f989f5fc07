//! Dataset records: one `record.json` per bridge and a top-level `summary.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::acquisition::LegCount;
use crate::bounds::Envelope;
use crate::config::PipelineConfig;
use crate::error::{FailureKind, PipelineError};
use crate::planner::ScannerPosition;
use crate::resample::SamplingStrategy;
use crate::sampler::BridgeConfiguration;
use crate::seed::BridgeSeed;

/// Recoverable conditions attached to a bridge that still completed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum RecordFlag {
    /// Legs the simulator produced nothing for.
    MissingLegScan { legs: Vec<usize> },
    /// Fewer raw points than the array size, padded by drawing with replacement.
    Undersampled { available: usize, target: usize },
}

impl RecordFlag {
    /// True for a bridge that lost at least one scan leg.
    pub fn is_missing_leg_scan(&self) -> bool {
        matches!(self, RecordFlag::MissingLegScan { .. })
    }

    /// True for a bridge whose feature array had to be padded.
    pub fn is_undersampled(&self) -> bool {
        matches!(self, RecordFlag::Undersampled { .. })
    }
}

/// Terminal state of a bridge in the batch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    /// Every enabled stage finished and the directory was published.
    Complete,
    /// A stage failed or the run was cancelled.
    Failed,
}

/// Classified reason a bridge failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BridgeFailure {
    /// Failure category used for summary statistics.
    pub kind: FailureKind,
    /// Rendered error chain.
    pub message: String,
}

impl From<&PipelineError> for BridgeFailure {
    fn from(error: &PipelineError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// One synthesized component as stored in `record.json`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ComponentRecord {
    /// Class name from the shared class map.
    pub name: String,
    /// Segmentation label, equal to the component's position in class order.
    pub label: u8,
    /// Axis-aligned bounds of the component solid.
    pub envelope: Envelope,
    /// Sum of the solid's part volumes in cubic metres.
    pub volume_m3: f64,
    /// Exported OBJ mesh, relative to the bridge directory.
    pub mesh_file: Option<String>,
}

/// Acquisition outcome for one bridge.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AcquisitionRecord {
    /// Name of the simulator backend that produced the returns.
    pub simulator: String,
    /// Return counts for every leg that produced points.
    pub leg_counts: Vec<LegCount>,
    /// Legs that failed, timed out or came back empty.
    pub missing_legs: Vec<usize>,
    /// Raw per-leg LAS files, relative to the bridge directory.
    pub raw_files: Vec<String>,
    /// Per-leg scanner trajectories, relative to the bridge directory.
    #[serde(default)]
    pub trajectory_files: Vec<String>,
    /// Returns merged across all legs.
    pub total_points: usize,
}

/// Labelling and resampling outcome for one bridge.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SegmentationRecord {
    /// Number of labelled raw points.
    pub labeled_points: usize,
    /// Points per class name, including `unassigned`.
    pub class_counts: BTreeMap<String, usize>,
    /// Share of points that matched no component.
    pub unassigned_fraction: f64,
    /// Labelled LAS files, relative to the bridge directory.
    pub labeled_files: Vec<String>,
    /// Selection strategy used for the feature array.
    pub strategy: SamplingStrategy,
    /// Present when the feature array was written.
    pub features: Option<FeatureRecord>,
}

/// Layout and normalisation of `features.npy`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    /// Array file, relative to the bridge directory.
    pub file: String,
    /// Rows and columns of the array.
    pub shape: [usize; 2],
    /// Column names in storage order.
    pub columns: Vec<String>,
    /// Centroid subtracted from the coordinates before scaling.
    pub centroid: [f64; 3],
    /// Divisor applied to the centred coordinates, 1.0 when not normalised.
    pub scale: f64,
}

/// Everything known about one completed bridge. Written as `record.json`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BridgeDatasetRecord {
    /// Bridge identifier, also the directory name.
    pub bridge_id: String,
    /// Seed every stage stream of this bridge derives from.
    pub seed: BridgeSeed,
    /// Sampled design parameters.
    pub configuration: BridgeConfiguration,
    /// Bounds of the whole model.
    pub envelope: Envelope,
    /// Components in class order.
    pub components: Vec<ComponentRecord>,
    /// Planned scanner legs.
    pub scanner_positions: Vec<ScannerPosition>,
    /// Present when simulation ran.
    pub acquisition: Option<AcquisitionRecord>,
    /// Present when segmentation ran.
    pub segmentation: Option<SegmentationRecord>,
    /// Recoverable conditions met along the way.
    pub flags: Vec<RecordFlag>,
}

impl BridgeDatasetRecord {
    /// Raw returns gathered by acquisition, 0 when it did not run.
    pub fn raw_points(&self) -> usize {
        self.acquisition.as_ref().map_or(0, |a| a.total_points)
    }

    /// Labelled points, 0 when segmentation did not run.
    pub fn labeled_points(&self) -> usize {
        self.segmentation.as_ref().map_or(0, |s| s.labeled_points)
    }
}

/// Terminal status of one bridge within the batch.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BridgeSummaryEntry {
    /// Bridge identifier.
    pub bridge_id: String,
    /// Zero-based position in the batch.
    pub index: usize,
    /// Per-bridge seed.
    pub seed: BridgeSeed,
    /// Whether the bridge completed.
    pub status: BridgeStatus,
    /// Sampled parameters, absent when sampling itself failed.
    pub configuration: Option<BridgeConfiguration>,
    /// Failure details for failed bridges.
    pub failure: Option<BridgeFailure>,
    /// Flags copied from the bridge record.
    pub flags: Vec<RecordFlag>,
    /// Raw returns gathered.
    pub raw_points: usize,
    /// Points labelled.
    pub labeled_points: usize,
    /// Final bridge directory, relative to the dataset root.
    pub directory: Option<String>,
}

impl BridgeSummaryEntry {
    /// Entry for a bridge that completed and was published to `directory`.
    pub fn complete(index: usize, record: &BridgeDatasetRecord, directory: String) -> Self {
        Self {
            bridge_id: record.bridge_id.clone(),
            index,
            seed: record.seed,
            status: BridgeStatus::Complete,
            configuration: Some(record.configuration.clone()),
            failure: None,
            flags: record.flags.clone(),
            raw_points: record.raw_points(),
            labeled_points: record.labeled_points(),
            directory: Some(directory),
        }
    }

    /// Entry for a bridge that stopped with `error`.
    pub fn failed(
        index: usize,
        bridge_id: String,
        seed: BridgeSeed,
        configuration: Option<BridgeConfiguration>,
        error: &PipelineError,
    ) -> Self {
        Self {
            bridge_id,
            index,
            seed,
            status: BridgeStatus::Failed,
            configuration,
            failure: Some(error.into()),
            flags: Vec::new(),
            raw_points: 0,
            labeled_points: 0,
            directory: None,
        }
    }

    /// True when the bridge completed.
    pub fn is_complete(&self) -> bool {
        self.status == BridgeStatus::Complete
    }
}

/// Batch-level record aggregating every bridge's terminal status.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetSummary {
    /// UTC time the summary was assembled.
    pub generated_at: DateTime<Utc>,
    /// Seed the whole batch was generated from.
    pub batch_seed: u64,
    /// Effective configuration of the run.
    pub config: PipelineConfig,
    /// Bridges requested.
    pub requested: usize,
    /// Bridges that completed.
    pub completed: usize,
    /// Bridges that failed.
    pub failed: usize,
    /// One entry per bridge, in index order.
    pub bridges: Vec<BridgeSummaryEntry>,
}

impl DatasetSummary {
    /// Tally `bridges` against the configuration they were generated with.
    pub fn new(config: &PipelineConfig, bridges: Vec<BridgeSummaryEntry>) -> Self {
        let completed = bridges.iter().filter(|b| b.is_complete()).count();
        Self {
            generated_at: Utc::now(),
            batch_seed: config.output.seed,
            config: config.clone(),
            requested: bridges.len(),
            completed,
            failed: bridges.len() - completed,
            bridges,
        }
    }

    /// Ids of completed bridges carrying a flag that satisfies `predicate`.
    pub fn flagged(&self, predicate: impl Fn(&RecordFlag) -> bool) -> Vec<&str> {
        self.bridges
            .iter()
            .filter(|b| b.flags.iter().any(&predicate))
            .map(|b| b.bridge_id.as_str())
            .collect()
    }

    /// Read a summary written by `ManifestGenerator::write_summary`.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Writes dataset records under the output root.
pub struct ManifestGenerator {
    output_dir: PathBuf,
}

impl ManifestGenerator {
    /// Generator rooted at the dataset output directory.
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Write `record.json` into a bridge directory.
    pub fn write_record(bridge_dir: &Path, record: &BridgeDatasetRecord) -> Result<PathBuf, PipelineError> {
        let path = bridge_dir.join("record.json");
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        Ok(path)
    }

    /// Write `summary.json` to the dataset root.
    pub fn write_summary(&self, summary: &DatasetSummary) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join("summary.json");
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;

        info!(path = %path.display(), "generated dataset summary");
        self.log_summary(summary);
        Ok(path)
    }

    fn log_summary(&self, summary: &DatasetSummary) {
        info!(
            requested = summary.requested,
            completed = summary.completed,
            failed = summary.failed,
            "dataset summary"
        );
        for bridge in &summary.bridges {
            match &bridge.failure {
                Some(failure) => warn!(
                    bridge_id = %bridge.bridge_id,
                    kind = ?failure.kind,
                    "failed: {}",
                    failure.message
                ),
                None if !bridge.flags.is_empty() => info!(
                    bridge_id = %bridge.bridge_id,
                    flags = ?bridge.flags,
                    "completed with flags"
                ),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplingError;

    fn entry(id: &str, flags: Vec<RecordFlag>) -> BridgeSummaryEntry {
        BridgeSummaryEntry {
            bridge_id: id.to_string(),
            index: 0,
            seed: BridgeSeed(1),
            status: BridgeStatus::Complete,
            configuration: None,
            failure: None,
            flags,
            raw_points: 10,
            labeled_points: 10,
            directory: Some(id.to_string()),
        }
    }

    #[test]
    fn flags_serialise_with_a_tag() {
        let flag = RecordFlag::MissingLegScan { legs: vec![4] };
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["flag"], "missing_leg_scan");
        assert_eq!(json["legs"][0], 4);

        let flag = RecordFlag::Undersampled {
            available: 100,
            target: 8192,
        };
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["flag"], "undersampled");
    }

    #[test]
    fn summary_counts_and_flag_lookup() {
        let error: PipelineError = SamplingError::violation(32, "span too short").into();
        let bridges = vec![
            entry("bridge_1", vec![]),
            entry("bridge_2", vec![RecordFlag::MissingLegScan { legs: vec![4] }]),
            BridgeSummaryEntry::failed(2, "bridge_3".into(), BridgeSeed(3), None, &error),
        ];
        let summary = DatasetSummary::new(&PipelineConfig::default(), bridges);
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.flagged(RecordFlag::is_missing_leg_scan), vec!["bridge_2"]);
        assert!(summary.flagged(RecordFlag::is_undersampled).is_empty());
        assert_eq!(
            summary.bridges[2].failure.as_ref().unwrap().kind,
            FailureKind::ConstraintViolation
        );
    }

    #[test]
    fn summary_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ManifestGenerator::new(dir.path());
        let summary = DatasetSummary::new(&PipelineConfig::default(), vec![entry("bridge_1", vec![])]);
        let path = generator.write_summary(&summary).unwrap();
        assert_eq!(path, dir.path().join("summary.json"));

        let loaded = DatasetSummary::load(&path).unwrap();
        assert_eq!(loaded.completed, 1);
        assert_eq!(loaded.bridges[0].bridge_id, "bridge_1");
        assert_eq!(loaded.generated_at, summary.generated_at);
    }
}
