//! HELIOS++ command-line backend.
//!
//! Each leg is run as its own single-leg survey so a hung leg can be killed
//! without losing the others.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nalgebra::Point3;
use tracing::{debug, warn};

use super::{LegScan, SceneDescription, ScanSimulator, survey};
use crate::error::AcquisitionError;
use crate::planner::ScannerPosition;
use crate::point_io;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const POINT_FILE_STEM: &str = "leg000_points";
const TRAJECTORY_FILE: &str = "leg000_trajectory.txt";

/// Runs the HELIOS++ executable once per leg.
#[derive(Debug, Clone)]
pub struct HeliosSimulator {
    executable: PathBuf,
    las_output: bool,
}

impl HeliosSimulator {
    /// Backend invoking `executable`, asking for LAS output when `las_output` is set.
    pub fn new(executable: impl Into<PathBuf>, las_output: bool) -> Self {
        Self {
            executable: executable.into(),
            las_output,
        }
    }

    fn run(
        &self,
        survey_path: &Path,
        output_dir: &Path,
        log_path: &Path,
        leg: usize,
        timeout: Duration,
    ) -> Result<(), AcquisitionError> {
        let log = File::create(log_path)?;
        let mut command = Command::new(&self.executable);
        command
            .arg(survey_path)
            .arg("--output")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));
        if self.las_output {
            command.arg("--lasOutput");
        }
        debug!(leg, command = ?command, "launching simulator");

        let child = command.spawn().map_err(|source| AcquisitionError::Launch {
            executable: self.executable.display().to_string(),
            source,
        })?;
        let status = wait_with_timeout(child, timeout, leg)?;
        if !status.success() {
            return Err(AcquisitionError::SimulatorFailed {
                leg,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

impl ScanSimulator for HeliosSimulator {
    fn name(&self) -> &str {
        "helios"
    }

    fn scan_leg(
        &self,
        scene: &SceneDescription<'_>,
        position: &ScannerPosition,
        timeout: Duration,
    ) -> Result<LegScan, AcquisitionError> {
        let leg = position.leg;
        let helios_dir = scene.work_dir.join("helios");
        fs::create_dir_all(&helios_dir)?;

        let survey_name = format!("{}_leg{leg}", survey::scene_id(scene.bridge_id));
        let survey_path = helios_dir.join(format!("{survey_name}_survey.xml"));
        survey::write_survey_named(
            &survey_path,
            &survey_name,
            scene.bridge_id,
            &scene.scene_document,
            std::slice::from_ref(position),
        )?;

        let output_dir = helios_dir.join("output");
        let log_path = helios_dir.join(format!("{survey_name}.log"));
        self.run(&survey_path, &output_dir, &log_path, leg, timeout)?;

        let run_dir = latest_run_dir(&output_dir.join(&survey_name)).ok_or(AcquisitionError::NoOutput { leg })?;
        let points_path = find_point_file(&run_dir).ok_or(AcquisitionError::NoOutput { leg })?;
        let points = point_io::read_points(&points_path, leg)?;

        let trajectory = read_trajectory(&run_dir.join(TRAJECTORY_FILE), leg);

        Ok(LegScan {
            leg,
            points,
            trajectory,
        })
    }
}

/// Scanner positions from a trajectory file. A missing or unreadable file
/// yields an empty trajectory so the leg's points are still used.
pub fn read_trajectory(path: &Path, leg: usize) -> Vec<Point3<f64>> {
    if !path.exists() {
        return Vec::new();
    }
    match point_io::read_xyz_points(path, leg) {
        Ok(samples) => samples.into_iter().map(|p| p.position).collect(),
        Err(e) => {
            warn!(leg, path = %path.display(), error = %e, "ignoring unreadable scanner trajectory");
            Vec::new()
        }
    }
}

/// Poll the child until it exits or the timeout expires, killing it on expiry.
pub fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
    leg: usize,
) -> Result<ExitStatus, AcquisitionError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            if let Err(e) = child.kill() {
                warn!(leg, error = %e, "failed to kill timed out simulator");
            }
            // Reap the process so it does not linger as a zombie
            let _ = child.wait();
            return Err(AcquisitionError::Timeout {
                leg,
                secs: timeout.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL.min(timeout));
    }
}

/// Simulator runs are written to timestamped directories; take the newest.
fn latest_run_dir(survey_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(survey_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .max()
}

fn find_point_file(run_dir: &Path) -> Option<PathBuf> {
    ["las", "laz", "xyz"]
        .iter()
        .map(|ext| run_dir.join(format!("{POINT_FILE_STEM}.{ext}")))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_run_directory_wins() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["2024-01-01_10-00-00", "2024-03-01_09-00-00", "2024-02-01_23-59-59"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let latest = latest_run_dir(dir.path()).unwrap();
        assert!(latest.ends_with("2024-03-01_09-00-00"));
        assert!(latest_run_dir(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn unreadable_trajectory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRAJECTORY_FILE);
        assert!(read_trajectory(&path, 0).is_empty());

        fs::write(&path, "1.0 2.0 1.6 0.0\n1.5 2.0 1.6 3.0\n").unwrap();
        let trajectory = read_trajectory(&path, 0);
        assert_eq!(trajectory, vec![Point3::new(1.0, 2.0, 1.6), Point3::new(1.5, 2.0, 1.6)]);

        fs::write(&path, "1.0 2.0 1.6\nnot a number\n").unwrap();
        assert!(read_trajectory(&path, 0).is_empty());
    }

    #[test]
    fn point_files_prefer_las() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_point_file(dir.path()).is_none());
        fs::write(dir.path().join("leg000_points.xyz"), "0 0 0\n").unwrap();
        assert!(find_point_file(dir.path()).unwrap().ends_with("leg000_points.xyz"));
        fs::write(dir.path().join("leg000_points.las"), "").unwrap();
        assert!(find_point_file(dir.path()).unwrap().ends_with("leg000_points.las"));
    }

    #[cfg(unix)]
    #[test]
    fn hung_process_is_killed_at_timeout() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();
        let err = wait_with_timeout(child, Duration::from_millis(300), 4).unwrap_err();
        assert!(matches!(err, AcquisitionError::Timeout { leg: 4, .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let simulator = HeliosSimulator::new(dir.path().join("no-such-helios"), true);
        let err = simulator
            .run(
                &dir.path().join("survey.xml"),
                dir.path(),
                &dir.path().join("run.log"),
                0,
                Duration::from_secs(1),
            )
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Launch { .. }));
    }
}
