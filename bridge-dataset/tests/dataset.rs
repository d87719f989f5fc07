use std::path::Path;
use std::time::Duration;

use bridge_dataset::acquisition::surrogate::{SurrogateConfig, SurrogateSimulator};
use bridge_dataset::acquisition::{LegScan, ScanSimulator, SceneDescription};
use bridge_dataset::error::{AcquisitionError, FailureKind};
use bridge_dataset::manifest::{BridgeDatasetRecord, BridgeStatus, DatasetSummary, RecordFlag};
use bridge_dataset::planner::ScannerPosition;
use bridge_dataset::sampler::{BridgeFamily, PierType};
use bridge_dataset::{BridgePipeline, PipelineConfig};

/// Surface sampler that refuses one leg of one bridge.
struct DroppedLeg {
    inner: SurrogateSimulator,
    bridge_id: &'static str,
    leg: usize,
}

impl ScanSimulator for DroppedLeg {
    fn name(&self) -> &str {
        "dropped-leg"
    }

    fn scan_leg(
        &self,
        scene: &SceneDescription<'_>,
        position: &ScannerPosition,
        timeout: Duration,
    ) -> Result<LegScan, AcquisitionError> {
        if scene.bridge_id == self.bridge_id && position.leg == self.leg {
            return Err(AcquisitionError::Timeout {
                leg: position.leg,
                secs: timeout.as_secs(),
            });
        }
        self.inner.scan_leg(scene, position, timeout)
    }
}

fn surrogate(points_per_leg: usize) -> SurrogateSimulator {
    SurrogateSimulator::new(SurrogateConfig {
        points_per_leg,
        ..SurrogateConfig::default()
    })
}

fn config(dir: &Path, bridges: usize, seed: u64) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.output.output_dir = dir.to_path_buf();
    config.output.bridge_count = bridges;
    config.output.seed = seed;
    config
}

fn read_record(dir: &Path, bridge_id: &str) -> BridgeDatasetRecord {
    let text = std::fs::read_to_string(dir.join(bridge_id).join("record.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn failed_leg_flags_only_its_bridge() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 5, 7);
    let simulator = DroppedLeg {
        inner: surrogate(300),
        bridge_id: "bridge_3",
        leg: 4,
    };
    let pipeline = BridgePipeline::new(&config, &simulator).unwrap().with_progress(false);
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.flagged(RecordFlag::is_missing_leg_scan), vec!["bridge_3"]);

    let third = &summary.bridges[2];
    assert!(third.flags.contains(&RecordFlag::MissingLegScan { legs: vec![4] }));
    for bridge in summary.bridges.iter().filter(|b| b.bridge_id != "bridge_3") {
        assert!(!bridge.flags.iter().any(RecordFlag::is_missing_leg_scan));
    }

    let record = read_record(tmp.path(), "bridge_3");
    let acquisition = record.acquisition.unwrap();
    assert_eq!(acquisition.missing_legs, vec![4]);
    assert_eq!(acquisition.leg_counts.len(), 7);
    assert!(acquisition.leg_counts.iter().all(|c| c.leg != 4));
    assert!(!tmp.path().join("bridge_3").join("raw").join("leg4.las").exists());

    // 7 legs of 300 points cannot fill the array
    assert!(record.flags.iter().any(RecordFlag::is_undersampled));
}

#[test]
fn bridge_directories_hold_every_output() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 1, 3);
    let simulator = surrogate(1200);
    let pipeline = BridgePipeline::new(&config, &simulator).unwrap().with_progress(false);
    let summary = pipeline.run().unwrap();
    assert_eq!(summary.completed, 1);

    let dir = tmp.path().join("bridge_1");
    for file in [
        "configuration.json",
        "scanner_positions.json",
        "bridge.obj",
        "TLS_bridge_1_scene.xml",
        "TLS_bridge_1_survey.xml",
        "features.npy",
        "record.json",
        "components/deck.obj",
        "components/wing_walls.obj",
        "raw/leg0.las",
        "raw/leg7.las",
        "raw/leg0_trajectory.xyz",
        "labeled/deck.las",
    ] {
        assert!(dir.join(file).exists(), "missing {file}");
    }
    assert!(tmp.path().join("summary.json").exists());

    let positions: Vec<ScannerPosition> =
        serde_json::from_str(&std::fs::read_to_string(dir.join("scanner_positions.json")).unwrap())
            .unwrap();
    assert_eq!(positions.len(), 8);

    let record = read_record(tmp.path(), "bridge_1");
    assert_eq!(record.components.len(), 6);
    assert_eq!(record.components[0].name, "deck");
    assert!(record.components.iter().all(|c| c.volume_m3 > 0.0));
    let acquisition = record.acquisition.as_ref().unwrap();
    assert_eq!(acquisition.trajectory_files.len(), 8);
    assert_eq!(acquisition.trajectory_files[0], "raw/leg0_trajectory.xyz");
    assert!(record.flags.is_empty(), "{:?}", record.flags);

    let segmentation = record.segmentation.unwrap();
    let features = segmentation.features.unwrap();
    assert_eq!(features.shape, [8192, 5]);
    assert_eq!(features.columns, ["x", "y", "z", "intensity", "label"]);
    assert!(
        segmentation.unassigned_fraction < 0.02,
        "unassigned fraction {}",
        segmentation.unassigned_fraction
    );

    let npy = std::fs::read(dir.join("features.npy")).unwrap();
    let header_len = u16::from_le_bytes([npy[8], npy[9]]) as usize;
    let header = std::str::from_utf8(&npy[10..10 + header_len]).unwrap();
    assert!(header.contains("'shape': (8192, 5)"));
    assert_eq!(npy.len(), 10 + header_len + 8192 * 5 * 4);
}

#[test]
fn same_seed_reproduces_the_dataset() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let simulator = surrogate(1200);

    for dir in [first.path(), second.path()] {
        let config = config(dir, 2, 99);
        let pipeline = BridgePipeline::new(&config, &simulator).unwrap().with_progress(false);
        assert_eq!(pipeline.run().unwrap().completed, 2);
    }

    for bridge in ["bridge_1", "bridge_2"] {
        let a = std::fs::read(first.path().join(bridge).join("features.npy")).unwrap();
        let b = std::fs::read(second.path().join(bridge).join("features.npy")).unwrap();
        assert_eq!(a, b, "{bridge} feature arrays differ");

        let a = read_record(first.path(), bridge);
        let b = read_record(second.path(), bridge);
        assert_eq!(a.configuration, b.configuration);
        assert_eq!(a.scanner_positions, b.scanner_positions);
    }
}

#[test]
fn unsatisfiable_overrides_fail_every_bridge() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path(), 3, 1);
    config.sampler.overrides.family = Some(BridgeFamily::BeamSlab);
    config.sampler.overrides.span_count = Some(5);
    config.sampler.overrides.total_length_m = Some(36.0);
    config.sampler.overrides.pier_type = Some(PierType::HammerHead);

    let simulator = surrogate(100);
    let pipeline = BridgePipeline::new(&config, &simulator).unwrap().with_progress(false);
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 3);
    for bridge in &summary.bridges {
        assert_eq!(bridge.status, BridgeStatus::Failed);
        assert_eq!(
            bridge.failure.as_ref().map(|f| f.kind),
            Some(FailureKind::ConstraintViolation)
        );
        assert!(!tmp.path().join(&bridge.bridge_id).exists());
        assert!(!tmp.path().join(format!("{}.partial", bridge.bridge_id)).exists());
    }

    let reloaded = DatasetSummary::load(&tmp.path().join("summary.json")).unwrap();
    assert_eq!(reloaded.failed, 3);
}
