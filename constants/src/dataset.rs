/// Fixed number of points in every exported feature array.
pub const TARGET_POINT_COUNT: usize = 8192;

/// Features per point: x, y, z, intensity, label.
pub const FEATURES_PER_POINT: usize = 5;

/// Intensity written when the simulator reports none.
pub const INTENSITY_PLACEHOLDER: f32 = 0.0;

/// Default inclusion tolerance for point-in-component tests (metres).
pub const DEFAULT_CONTAINMENT_TOLERANCE: f64 = 0.05;

/// Default maximum distance for nearest-surface fallback labelling (metres).
pub const DEFAULT_NEAREST_DISTANCE_THRESHOLD: f64 = 0.5;

/// Default quota reserved for every present class before the proportional split.
pub const DEFAULT_MIN_POINTS_PER_CLASS: usize = 0;
