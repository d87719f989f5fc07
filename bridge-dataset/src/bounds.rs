//! Axis-aligned envelope tracking for components, bridges and point clouds.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds in world metres. An empty envelope has min above max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    /// Create new empty envelope initialised to infinity values.
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    /// Update envelope with a new point.
    pub fn update(&mut self, x: f64, y: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
    }

    /// Update envelope with a new point.
    pub fn update_point(&mut self, p: &Point3<f64>) {
        self.update(p.x, p.y, p.z);
    }

    /// Grow to cover another envelope.
    pub fn merge(&mut self, other: &Envelope) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
    }

    /// Smallest envelope covering all of `envelopes`.
    pub fn union_of<'a>(envelopes: impl IntoIterator<Item = &'a Envelope>) -> Self {
        let mut result = Self::new();
        for envelope in envelopes {
            result.merge(envelope);
        }
        result
    }

    /// True until at least one point or envelope has been added.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y || self.min_z > self.max_z
    }

    /// World space dimensions along x, y, z.
    pub fn dimensions(&self) -> (f64, f64, f64) {
        (
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        )
    }

    /// Midpoint of the envelope.
    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
            0.5 * (self.min_z + self.max_z),
        )
    }

    /// Half the dimensions along each axis.
    pub fn half_extents(&self) -> Vector3<f64> {
        let (dx, dy, dz) = self.dimensions();
        Vector3::new(0.5 * dx, 0.5 * dy, 0.5 * dz)
    }

    /// Inclusive containment with a tolerance added on every side.
    pub fn contains(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        p.x >= self.min_x - tolerance
            && p.x <= self.max_x + tolerance
            && p.y >= self.min_y - tolerance
            && p.y <= self.max_y + tolerance
            && p.z >= self.min_z - tolerance
            && p.z <= self.max_z + tolerance
    }

    /// True when the point lies outside the closed envelope.
    pub fn excludes(&self, p: &Point3<f64>) -> bool {
        !self.contains(p, 0.0)
    }

    /// Euclidean distance from the point to the envelope, zero inside.
    pub fn distance_to(&self, p: &Point3<f64>) -> f64 {
        let dx = (self.min_x - p.x).max(0.0).max(p.x - self.max_x);
        let dy = (self.min_y - p.y).max(0.0).max(p.y - self.max_y);
        let dz = (self.min_z - p.z).max(0.0).max(p.z - self.max_z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[cfg(test)]
impl Envelope {
    pub(crate) fn from_corners(min: Point3<f64>, max: Point3<f64>) -> Self {
        let mut envelope = Self::new();
        envelope.update_point(&min);
        envelope.update_point(&max);
        envelope
    }

    pub(crate) fn approx_eq(&self, other: &Envelope, tolerance: f64) -> bool {
        (self.min_x - other.min_x).abs() <= tolerance
            && (self.max_x - other.max_x).abs() <= tolerance
            && (self.min_y - other.min_y).abs() <= tolerance
            && (self.max_y - other.max_y).abs() <= tolerance
            && (self.min_z - other.min_z).abs() <= tolerance
            && (self.max_z - other.max_z).abs() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Envelope {
        Envelope::from_corners(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0))
    }

    #[test]
    fn new_envelope_is_empty_until_updated() {
        let mut envelope = Envelope::new();
        assert!(envelope.is_empty());
        envelope.update(1.0, 1.0, 1.0);
        assert!(!envelope.is_empty());
        assert_eq!(envelope.dimensions(), (0.0, 0.0, 0.0));
    }

    #[test]
    fn merge_covers_both() {
        let mut a = unit_box();
        let b = Envelope::from_corners(Point3::new(-1.0, 1.0, 1.0), Point3::new(0.5, 5.0, 2.0));
        a.merge(&b);
        assert_eq!(a.min_x, -1.0);
        assert_eq!(a.max_y, 5.0);
        assert_eq!(a.max_z, 3.0);
    }

    #[test]
    fn containment_and_distance() {
        let envelope = unit_box();
        assert!(envelope.contains(&Point3::new(0.5, 1.0, 1.5), 0.0));
        assert!(envelope.contains(&Point3::new(1.04, 1.0, 1.5), 0.05));
        assert!(envelope.excludes(&Point3::new(1.04, 1.0, 1.5)));
        assert!((envelope.distance_to(&Point3::new(4.0, 6.0, 3.0)) - 5.0).abs() < 1e-12);
        assert_eq!(envelope.distance_to(&Point3::new(0.2, 0.2, 0.2)), 0.0);
    }

    #[test]
    fn center_and_half_extents() {
        let envelope = unit_box();
        assert_eq!(envelope.center(), Point3::new(0.5, 1.0, 1.5));
        assert_eq!(envelope.half_extents(), Vector3::new(0.5, 1.0, 1.5));
    }
}
