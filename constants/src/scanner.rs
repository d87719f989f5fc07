/// Number of scanner viewpoints planned per bridge.
pub const LEG_COUNT: usize = 8;

/// Distance added beyond the half-width for the side legs (metres).
pub const DEFAULT_LATERAL_OFFSET: f64 = 7.0;

/// Distance added beyond the half-length for the front and back legs (metres).
pub const DEFAULT_LONGITUDINAL_OFFSET: f64 = 25.0;

/// Vertical clearance of the below/above legs as a fraction of structure height.
pub const DEFAULT_VERTICAL_CLEARANCE_FRACTION: f64 = 0.25;

/// Longitudinal stagger of the below/above legs as a fraction of the half-length.
pub const VERTICAL_LEG_STAGGER_FRACTION: f64 = 1.0 / 3.0;

/// Terrestrial scanner profile written to every survey document.
pub const SCANNER_PROFILE_ID: &str = "profile1";
/// Pulse repetition rate.
pub const PULSE_FREQ_HZ: u32 = 100_000;
/// Mirror scan rate.
pub const SCAN_FREQ_HZ: u32 = 120;
/// Full vertical field of view.
pub const SCAN_ANGLE_DEG: f64 = 100.0;
/// Horizontal head rotation speed.
pub const HEAD_ROTATE_PER_SEC_DEG: f64 = 10.0;
/// Interval between reported trajectory samples.
pub const TRAJECTORY_TIME_INTERVAL_S: f64 = 3.0;

/// Full-waveform bin size.
pub const FWF_BIN_SIZE_NS: f64 = 0.2;
/// Beam subsampling quality for full-waveform simulation.
pub const FWF_BEAM_SAMPLE_QUALITY: u32 = 3;

/// Static tripod platform definition.
pub const PLATFORM_REF: &str = "data/platforms.xml#tripod";
/// Terrestrial scanner definition.
pub const SCANNER_REF: &str = "data/scanners_tls.xml#riegl_vz400";

/// Default per-leg simulator timeout (seconds).
pub const DEFAULT_LEG_TIMEOUT_SECS: u64 = 900;
