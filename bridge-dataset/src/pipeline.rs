//! Batch driver: carries every bridge through sampling, synthesis, planning,
//! acquisition and segmentation, then records the outcome.
//!
//! Bridges are independent and run in parallel. Each one is written into
//! `<id>.partial/` and only renamed to `<id>/` once every enabled stage has
//! finished, so an aborted run never leaves a directory that looks complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use constants::class::get_class_name;
use constants::dataset::FEATURES_PER_POINT;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::acquisition::{AcquisitionAdapter, AcquisitionOutcome, ScanSimulator};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, PipelineError, PipelineResult};
use crate::geometry::{self, FullBridgeModel, mesh};
use crate::manifest::{
    AcquisitionRecord, BridgeDatasetRecord, BridgeSummaryEntry, ComponentRecord, DatasetSummary,
    FeatureRecord, ManifestGenerator, RecordFlag, SegmentationRecord,
};
use crate::npy_writer::write_features_npy;
use crate::planner::{ScanPlanner, ScannerPosition};
use crate::point_io;
use crate::sampler::{BridgeConfiguration, ParameterSampler};
use crate::seed::{BridgeSeed, Stage};
use crate::segmentation::{SegmentationEngine, SegmentationOutput, split_by_label};

/// Column order of `features.npy`.
pub const FEATURE_COLUMNS: [&str; FEATURES_PER_POINT] = ["x", "y", "z", "intensity", "label"];

/// Directory name of the bridge at `index` within a batch.
pub fn bridge_id(index: usize) -> String {
    format!("bridge_{}", index + 1)
}

/// Runs every stage for a batch of bridges and writes the dataset.
pub struct BridgePipeline<'a> {
    config: &'a PipelineConfig,
    simulator: &'a dyn ScanSimulator,
    sampler: ParameterSampler,
    planner: ScanPlanner,
    engine: SegmentationEngine,
    cancel: Arc<AtomicBool>,
    show_progress: bool,
}

impl<'a> BridgePipeline<'a> {
    /// Validate the configuration once; it is read-only for the rest of the run.
    pub fn new(config: &'a PipelineConfig, simulator: &'a dyn ScanSimulator) -> Result<Self, ConfigError> {
        config.validate()?;
        let planner = ScanPlanner::new(config.planner).map_err(|e| ConfigError::Invalid {
            field: "planner",
            reason: e.to_string(),
        })?;
        let engine = SegmentationEngine::new(config.segmentation).map_err(|e| ConfigError::Invalid {
            field: "segmentation",
            reason: e.to_string(),
        })?;

        Ok(Self {
            config,
            simulator,
            sampler: ParameterSampler::new(config.sampler.max_attempts),
            planner,
            engine,
            cancel: Arc::new(AtomicBool::new(false)),
            show_progress: true,
        })
    }

    /// Show or hide the batch progress bar.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Shared cancellation flag. Bridges check it between stages and fail
    /// with `Cancelled` once it is set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn output_dir(&self) -> &Path {
        &self.config.output.output_dir
    }

    /// Process the whole batch and write `summary.json`.
    /// Per-bridge failures are recorded in the summary, never returned.
    pub fn run(&self) -> PipelineResult<DatasetSummary> {
        let count = self.config.output.bridge_count;
        fs::create_dir_all(self.output_dir())?;
        info!(
            count,
            seed = self.config.output.seed,
            simulator = self.simulator.name(),
            output = %self.output_dir().display(),
            "generating bridge dataset"
        );

        let pb = self.progress_bar(count as u64);
        let entries: Vec<BridgeSummaryEntry> = (0..count)
            .into_par_iter()
            .map(|index| {
                let entry = self.run_bridge(index);
                pb.inc(1);
                entry
            })
            .collect();
        pb.finish_with_message("Bridges processed");

        let summary = DatasetSummary::new(self.config, entries);
        ManifestGenerator::new(self.output_dir()).write_summary(&summary)?;
        Ok(summary)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{bar:40.green/blue}] {pos}/{len} bridges ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("▉▊▋▌▍▎▏ "));
        }
        pb
    }

    /// Run one bridge end to end and report its terminal status.
    pub fn run_bridge(&self, index: usize) -> BridgeSummaryEntry {
        let bridge_id = bridge_id(index);
        let seed = BridgeSeed::for_bridge(self.config.output.seed, index);

        let configuration = match self.sample(&bridge_id, seed) {
            Ok(configuration) => configuration,
            Err(e) => return self.failed(index, bridge_id, seed, None, e),
        };

        let partial_dir = self.output_dir().join(format!("{bridge_id}.partial"));
        let final_dir = self.output_dir().join(&bridge_id);
        let result = self
            .prepare_dirs(&partial_dir, &final_dir)
            .and_then(|()| self.build_bridge(&configuration, seed, &partial_dir))
            .and_then(|record| {
                self.check_cancel()?;
                fs::rename(&partial_dir, &final_dir)?;
                Ok(record)
            });

        match result {
            Ok(record) => {
                info!(
                    bridge_id = %bridge_id,
                    family = configuration.family.name(),
                    piers = configuration.pier_count(),
                    raw_points = record.raw_points(),
                    flags = record.flags.len(),
                    "bridge complete"
                );
                BridgeSummaryEntry::complete(index, &record, bridge_id)
            }
            Err(e) => self.failed(index, bridge_id, seed, Some(configuration), e),
        }
    }

    fn failed(
        &self,
        index: usize,
        bridge_id: String,
        seed: BridgeSeed,
        configuration: Option<BridgeConfiguration>,
        err: PipelineError,
    ) -> BridgeSummaryEntry {
        error!(bridge_id = %bridge_id, kind = ?err.kind(), "bridge failed: {err}");
        BridgeSummaryEntry::failed(index, bridge_id, seed, configuration, &err)
    }

    fn check_cancel(&self) -> PipelineResult<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn sample(&self, bridge_id: &str, seed: BridgeSeed) -> PipelineResult<BridgeConfiguration> {
        self.check_cancel()?;
        let mut rng = seed.rng(Stage::Sampling);
        Ok(self
            .sampler
            .sample(bridge_id, &self.config.sampler.overrides, &mut rng)?)
    }

    /// Clear leftovers of an earlier run of the same bridge.
    fn prepare_dirs(&self, partial_dir: &Path, final_dir: &Path) -> PipelineResult<()> {
        for dir in [partial_dir, final_dir] {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        fs::create_dir_all(partial_dir)?;
        Ok(())
    }

    fn build_bridge(
        &self,
        configuration: &BridgeConfiguration,
        seed: BridgeSeed,
        dir: &Path,
    ) -> PipelineResult<BridgeDatasetRecord> {
        let output = &self.config.output;

        self.check_cancel()?;
        let model = geometry::synthesize(configuration)?;
        write_json(&dir.join("configuration.json"), configuration)?;
        let meshes_exported = output.export_components || output.simulate;
        if output.export_components {
            let bridge_mesh = model.mesh();
            mesh::write_obj(&dir.join("bridge.obj"), &bridge_mesh)?;
            mesh::write_stl(&dir.join("bridge.stl"), &bridge_mesh)?;
            if !output.simulate {
                model.export_components(&dir.join("components"))?;
            }
        }

        self.check_cancel()?;
        let positions = self.planner.plan(&model.envelope)?;
        write_json(&dir.join("scanner_positions.json"), &positions)?;

        let mut flags = Vec::new();
        let acquisition = if output.simulate {
            self.check_cancel()?;
            Some(self.acquire(&model, &positions, seed, dir)?)
        } else {
            None
        };
        if let Some(outcome) = &acquisition {
            if !outcome.missing_legs.is_empty() {
                flags.push(RecordFlag::MissingLegScan {
                    legs: outcome.missing_legs.clone(),
                });
            }
        }

        let segmentation = match &acquisition {
            Some(outcome) if output.segment => {
                self.check_cancel()?;
                let mut rng = seed.rng(Stage::Resampling);
                let segmented = self.engine.run(
                    &outcome.points,
                    &model.components,
                    &mut rng,
                    &ProgressBar::hidden(),
                )?;
                if segmented.undersampled() {
                    flags.push(RecordFlag::Undersampled {
                        available: segmented.labeled.len(),
                        target: self.engine.params().target_points,
                    });
                }
                Some(self.persist_segmentation(&segmented, dir)?)
            }
            _ => None,
        };

        let record = BridgeDatasetRecord {
            bridge_id: model.bridge_id.clone(),
            seed,
            configuration: configuration.clone(),
            envelope: model.envelope,
            components: model
                .components
                .iter()
                .map(|c| ComponentRecord {
                    name: c.name().to_string(),
                    label: c.label(),
                    envelope: c.envelope,
                    volume_m3: c.solid.volume(),
                    mesh_file: meshes_exported.then(|| format!("components/{}.obj", c.name())),
                })
                .collect(),
            scanner_positions: positions,
            acquisition: acquisition.map(|outcome| AcquisitionRecord {
                simulator: self.simulator.name().to_string(),
                total_points: outcome.points.len(),
                raw_files: outcome.raw_files.iter().map(|p| relative(dir, p)).collect(),
                trajectory_files: outcome.trajectory_files.iter().map(|p| relative(dir, p)).collect(),
                leg_counts: outcome.leg_counts,
                missing_legs: outcome.missing_legs,
            }),
            segmentation,
            flags,
        };
        ManifestGenerator::write_record(dir, &record)?;
        Ok(record)
    }

    fn acquire(
        &self,
        model: &FullBridgeModel,
        positions: &[ScannerPosition],
        seed: BridgeSeed,
        dir: &Path,
    ) -> PipelineResult<AcquisitionOutcome> {
        let simulator = &self.config.simulator;
        let adapter = AcquisitionAdapter::new(
            self.simulator,
            Duration::from_secs(simulator.leg_timeout_secs),
            simulator.write_raw,
        );
        let scene = adapter.describe(model, positions, seed, dir)?;
        Ok(adapter.acquire(&scene, positions)?)
    }

    /// Write `labeled/<component>.las` and, when converting, `features.npy`.
    fn persist_segmentation(
        &self,
        segmented: &SegmentationOutput,
        dir: &Path,
    ) -> PipelineResult<SegmentationRecord> {
        let labeled_dir = dir.join("labeled");
        fs::create_dir_all(&labeled_dir)?;

        let mut labeled_files = Vec::new();
        for (label, points) in split_by_label(&segmented.labeled) {
            let path = labeled_dir.join(format!("{}.las", get_class_name(label)));
            point_io::write_las(&path, points.iter().map(|p| (&p.point, p.label)))?;
            labeled_files.push(relative(dir, &path));
        }

        let features = if self.config.output.convert {
            let path = dir.join("features.npy");
            write_features_npy(&path, &segmented.features)?;
            let (rows, columns) = segmented.features.shape();
            debug!(rows, columns, "wrote feature array");
            Some(FeatureRecord {
                file: relative(dir, &path),
                shape: [rows, columns],
                columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                centroid: segmented.features.centroid,
                scale: segmented.features.scale,
            })
        } else {
            None
        };

        Ok(SegmentationRecord {
            labeled_points: segmented.labeled.len(),
            class_counts: segmented.class_counts.clone(),
            unassigned_fraction: segmented.unassigned_fraction,
            labeled_files,
            strategy: segmented.strategy,
            features,
        })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PipelineResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Path inside the bridge directory, stable across the final rename.
fn relative(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}
