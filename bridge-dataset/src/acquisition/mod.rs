//! Scan acquisition: hands planned legs to a scan simulator and gathers the
//! per-leg returns into one raw cloud per bridge.
//!
//! A leg that fails, times out or comes back empty is recorded as missing and
//! the bridge continues with the remaining legs.

pub mod helios;
pub mod surrogate;
pub mod survey;

use std::path::{Path, PathBuf};
use std::time::Duration;

use constants::class::UNASSIGNED_LABEL;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AcquisitionError;
use crate::geometry::{ComponentKind, FullBridgeModel};
use crate::planner::ScannerPosition;
use crate::point_io;
use crate::seed::BridgeSeed;

/// One simulator return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScanPoint {
    /// World position of the return.
    pub position: Point3<f64>,
    /// Return intensity on the simulator's scale.
    pub intensity: f32,
    /// Leg that produced the return.
    pub leg: u8,
}

/// Returns of a single leg plus the scanner trajectory the simulator reported.
#[derive(Debug, Clone, Default)]
pub struct LegScan {
    /// Leg index this scan belongs to.
    pub leg: usize,
    /// Returns in simulator order.
    pub points: Vec<RawScanPoint>,
    /// Scanner positions sampled during the leg, possibly empty.
    pub trajectory: Vec<Point3<f64>>,
}

/// Everything a simulator needs to know about the bridge being scanned.
#[derive(Debug, Clone)]
pub struct SceneDescription<'a> {
    /// Bridge being scanned.
    pub bridge_id: &'a str,
    /// Synthesized model the scene was built from.
    pub model: &'a FullBridgeModel,
    /// Per-bridge seed, for simulators that draw randomness.
    pub seed: BridgeSeed,
    /// Per-bridge working directory.
    pub work_dir: PathBuf,
    /// Scene XML referencing the component meshes.
    pub scene_document: PathBuf,
    /// Survey XML listing every leg.
    pub survey_document: PathBuf,
    /// Exported OBJ mesh per component, in class order.
    pub component_meshes: Vec<(ComponentKind, PathBuf)>,
}

/// External scan simulator seam.
pub trait ScanSimulator: Send + Sync {
    /// Backend name recorded in the dataset.
    fn name(&self) -> &str;

    /// Scan one leg. Implementations must give up after `timeout`.
    fn scan_leg(
        &self,
        scene: &SceneDescription<'_>,
        position: &ScannerPosition,
        timeout: Duration,
    ) -> Result<LegScan, AcquisitionError>;
}

/// Returns gathered by one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegCount {
    /// Leg index.
    pub leg: usize,
    /// Returns the leg produced.
    pub points: usize,
}

/// Merged raw cloud for one bridge.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionOutcome {
    /// Returns from every successful leg, in leg order.
    pub points: Vec<RawScanPoint>,
    /// Return count per successful leg.
    pub leg_counts: Vec<LegCount>,
    /// Legs that failed, timed out or came back empty.
    pub missing_legs: Vec<usize>,
    /// Raw per-leg LAS files, when raw output is enabled.
    pub raw_files: Vec<PathBuf>,
    /// Scanner trajectories, one `x y z` file per leg that reported one.
    pub trajectory_files: Vec<PathBuf>,
}

/// Runs a simulator over every planned leg of a bridge.
pub struct AcquisitionAdapter<'a> {
    simulator: &'a dyn ScanSimulator,
    leg_timeout: Duration,
    write_raw: bool,
}

impl<'a> AcquisitionAdapter<'a> {
    /// Adapter giving each leg `leg_timeout` and optionally keeping raw leg files.
    pub fn new(simulator: &'a dyn ScanSimulator, leg_timeout: Duration, write_raw: bool) -> Self {
        Self {
            simulator,
            leg_timeout,
            write_raw,
        }
    }

    /// Write the scene and survey documents for a bridge into `work_dir`.
    /// Component meshes are exported first when they are not already present.
    pub fn describe<'m>(
        &self,
        model: &'m FullBridgeModel,
        positions: &[ScannerPosition],
        seed: BridgeSeed,
        work_dir: &Path,
    ) -> Result<SceneDescription<'m>, AcquisitionError> {
        let mesh_dir = work_dir.join("components");
        let component_meshes = model.export_components(&mesh_dir)?;

        let scene_document = work_dir.join(format!("TLS_{}_scene.xml", model.bridge_id));
        let survey_document = work_dir.join(format!("TLS_{}_survey.xml", model.bridge_id));
        survey::write_scene(&scene_document, &model.bridge_id, &component_meshes)?;
        survey::write_survey(&survey_document, &model.bridge_id, &scene_document, positions)?;
        debug!(bridge_id = %model.bridge_id, "wrote scene and survey documents");

        Ok(SceneDescription {
            bridge_id: &model.bridge_id,
            model,
            seed,
            work_dir: work_dir.to_path_buf(),
            scene_document,
            survey_document,
            component_meshes,
        })
    }

    /// Scan every leg in order. Leg failures are collected, never propagated.
    pub fn acquire(
        &self,
        scene: &SceneDescription<'_>,
        positions: &[ScannerPosition],
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let raw_dir = scene.work_dir.join("raw");
        if self.write_raw {
            std::fs::create_dir_all(&raw_dir)?;
        }

        let mut outcome = AcquisitionOutcome::default();
        for position in positions {
            let leg = position.leg;
            match self.simulator.scan_leg(scene, position, self.leg_timeout) {
                Ok(scan) if !scan.points.is_empty() => {
                    debug!(
                        bridge_id = scene.bridge_id,
                        leg,
                        points = scan.points.len(),
                        "leg scanned"
                    );
                    if self.write_raw {
                        let path = raw_dir.join(format!("leg{leg}.las"));
                        let unlabelled = scan.points.iter().map(|p| (p, UNASSIGNED_LABEL));
                        point_io::write_las(&path, unlabelled)?;
                        outcome.raw_files.push(path);
                        if !scan.trajectory.is_empty() {
                            let path = raw_dir.join(format!("leg{leg}_trajectory.xyz"));
                            point_io::write_xyz_positions(&path, &scan.trajectory)?;
                            outcome.trajectory_files.push(path);
                        }
                    }
                    outcome.leg_counts.push(LegCount {
                        leg,
                        points: scan.points.len(),
                    });
                    outcome.points.extend(scan.points);
                }
                Ok(_) => {
                    warn!(bridge_id = scene.bridge_id, leg, "simulator returned no points");
                    outcome.missing_legs.push(leg);
                }
                Err(e) => {
                    warn!(bridge_id = scene.bridge_id, leg, error = %e, "leg scan failed");
                    outcome.missing_legs.push(leg);
                }
            }
        }

        info!(
            bridge_id = scene.bridge_id,
            simulator = self.simulator.name(),
            points = outcome.points.len(),
            missing = outcome.missing_legs.len(),
            "acquisition finished"
        );
        Ok(outcome)
    }
}
