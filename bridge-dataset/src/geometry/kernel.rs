//! Solid construction from convex prisms.
//!
//! A [`Solid`] is the union of convex prisms: a convex profile extruded along one
//! world axis. Subtraction is only needed for rectangular hollow sections, which
//! are emitted directly as their flange and web parts. Every primitive is
//! validated before it exists, so a degenerate dimension surfaces as an error at
//! construction time rather than as broken geometry later.

use nalgebra::Point3;

use crate::bounds::Envelope;
use crate::error::GeometryError;
use crate::geometry::mesh::TriMesh;

const EPSILON: f64 = 1e-9;

/// Extrusion axis. Profiles are given in the plane of the two remaining axes:
/// `X` uses (y, z), `Y` uses (x, z), `Z` uses (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Split a world point into (profile u, profile v, axis w).
    fn project(&self, p: &Point3<f64>) -> (f64, f64, f64) {
        match self {
            Axis::X => (p.y, p.z, p.x),
            Axis::Y => (p.x, p.z, p.y),
            Axis::Z => (p.x, p.y, p.z),
        }
    }

    fn lift(&self, u: f64, v: f64, w: f64) -> Point3<f64> {
        match self {
            Axis::X => Point3::new(w, u, v),
            Axis::Y => Point3::new(u, w, v),
            Axis::Z => Point3::new(u, v, w),
        }
    }

    /// (u, v, w) is a left-handed frame for Y, so triangle winding must flip.
    fn flips_winding(&self) -> bool {
        matches!(self, Axis::Y)
    }
}

/// Convex polygon profile extruded along a world axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPrism {
    axis: Axis,
    /// Counter-clockwise convex profile.
    profile: Vec<[f64; 2]>,
    start: f64,
    end: f64,
}

impl ConvexPrism {
    /// Validate and normalise a profile: at least three finite vertices, convex,
    /// non-zero area and a non-empty extrusion range. Clockwise input is reversed.
    pub fn new(
        axis: Axis,
        profile: Vec<[f64; 2]>,
        start: f64,
        end: f64,
    ) -> Result<Self, GeometryError> {
        if profile.len() < 3 {
            return Err(kernel_error("profile needs at least three vertices"));
        }
        if !start.is_finite() || !end.is_finite() || end - start <= EPSILON {
            return Err(kernel_error(format!(
                "extrusion range [{start}, {end}] is empty"
            )));
        }
        if profile.iter().flatten().any(|c| !c.is_finite()) {
            return Err(kernel_error("profile contains non-finite coordinates"));
        }

        let mut profile = profile;
        let area = signed_area(&profile);
        if area.abs() <= EPSILON {
            return Err(kernel_error(format!("profile area {area} is degenerate")));
        }
        if area < 0.0 {
            profile.reverse();
        }

        let n = profile.len();
        for i in 0..n {
            let a = profile[i];
            let b = profile[(i + 1) % n];
            let c = profile[(i + 2) % n];
            if ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt() <= EPSILON {
                return Err(kernel_error("profile has a zero-length edge"));
            }
            let cross = (b[0] - a[0]) * (c[1] - b[1]) - (b[1] - a[1]) * (c[0] - b[0]);
            if cross < -EPSILON {
                return Err(kernel_error("profile is not convex"));
            }
        }

        Ok(Self {
            axis,
            profile,
            start,
            end,
        })
    }

    /// Bounds of the prism's vertices.
    pub fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::new();
        for &[u, v] in &self.profile {
            envelope.update_point(&self.axis.lift(u, v, self.start));
            envelope.update_point(&self.axis.lift(u, v, self.end));
        }
        envelope
    }

    /// Inclusive containment, grown by `tolerance` on every face.
    pub fn contains(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        let (u, v, w) = self.axis.project(p);
        if w < self.start - tolerance || w > self.end + tolerance {
            return false;
        }
        self.edges()
            .all(|(a, b)| outward_distance(a, b, u, v) <= tolerance)
    }

    /// Distance from an exterior point to the prism; zero inside.
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        let (u, v, w) = self.axis.project(p);
        let axial = (self.start - w).max(0.0).max(w - self.end);
        let inside_profile = self.edges().all(|(a, b)| outward_distance(a, b, u, v) <= 0.0);
        let planar = if inside_profile {
            0.0
        } else {
            self.edges()
                .map(|(a, b)| segment_distance(a, b, u, v))
                .fold(f64::INFINITY, f64::min)
        };
        (axial * axial + planar * planar).sqrt()
    }

    /// Profile area times extrusion length.
    pub fn volume(&self) -> f64 {
        signed_area(&self.profile) * (self.end - self.start)
    }

    /// Closed mesh: fan-triangulated caps plus two triangles per side.
    pub fn to_mesh(&self) -> TriMesh {
        let n = self.profile.len();
        let mut mesh = TriMesh::default();
        for &[u, v] in &self.profile {
            mesh.vertices.push(self.axis.lift(u, v, self.start));
        }
        for &[u, v] in &self.profile {
            mesh.vertices.push(self.axis.lift(u, v, self.end));
        }

        let mut faces: Vec<[u32; 3]> = Vec::with_capacity(4 * n);
        let n32 = n as u32;
        for i in 0..n32 {
            let j = (i + 1) % n32;
            faces.push([i, j, j + n32]);
            faces.push([i, j + n32, i + n32]);
        }
        for i in 1..n32 - 1 {
            faces.push([n32, n32 + i, n32 + i + 1]);
            faces.push([0, i + 1, i]);
        }
        if self.axis.flips_winding() {
            for face in &mut faces {
                face.swap(1, 2);
            }
        }
        mesh.faces = faces;
        mesh
    }

    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        let n = self.profile.len();
        (0..n).map(move |i| (self.profile[i], self.profile[(i + 1) % n]))
    }
}

fn kernel_error(reason: impl Into<String>) -> GeometryError {
    GeometryError::constraint("primitive", reason)
}

fn signed_area(profile: &[[f64; 2]]) -> f64 {
    let n = profile.len();
    (0..n)
        .map(|i| {
            let a = profile[i];
            let b = profile[(i + 1) % n];
            a[0] * b[1] - b[0] * a[1]
        })
        .sum::<f64>()
        * 0.5
}

/// Signed distance to the edge line, positive on the outside of a CCW profile.
fn outward_distance(a: [f64; 2], b: [f64; 2], u: f64, v: f64) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = (dx * dx + dy * dy).sqrt();
    ((u - a[0]) * dy - (v - a[1]) * dx) / len
}

fn segment_distance(a: [f64; 2], b: [f64; 2], u: f64, v: f64) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let t = (((u - a[0]) * dx + (v - a[1]) * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
    let (px, py) = (a[0] + t * dx - u, a[1] + t * dy - v);
    (px * px + py * py).sqrt()
}

/// Union of convex prisms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solid {
    parts: Vec<ConvexPrism>,
}

impl Solid {
    /// Solid with no parts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convex parts in insertion order.
    pub fn parts(&self) -> &[ConvexPrism] {
        &self.parts
    }

    /// True when no part has been added.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Add a part. Overlap with existing parts is allowed.
    pub fn add(&mut self, part: ConvexPrism) {
        self.parts.push(part);
    }

    /// Parts of both solids.
    pub fn union(mut self, other: Solid) -> Solid {
        self.parts.extend(other.parts);
        self
    }

    /// Bounds covering every part.
    pub fn envelope(&self) -> Envelope {
        let mut envelope = Envelope::new();
        for part in &self.parts {
            envelope.merge(&part.envelope());
        }
        envelope
    }

    /// Sum of part volumes. Parts that touch or overlap are counted separately.
    pub fn volume(&self) -> f64 {
        self.parts.iter().map(ConvexPrism::volume).sum()
    }

    /// True when any part contains `p` within `tolerance`.
    pub fn contains(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        self.parts.iter().any(|part| part.contains(p, tolerance))
    }

    /// Distance to the nearest part surface from outside; zero when contained.
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        self.parts
            .iter()
            .map(|part| part.distance(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Concatenated part meshes, without welding shared faces.
    pub fn to_mesh(&self) -> TriMesh {
        let mut mesh = TriMesh::default();
        for part in &self.parts {
            mesh.append(&part.to_mesh());
        }
        mesh
    }
}

impl From<ConvexPrism> for Solid {
    fn from(part: ConvexPrism) -> Self {
        Self { parts: vec![part] }
    }
}

/// Extrude a convex profile along `axis` over `[start, end]`.
pub fn extrude(
    axis: Axis,
    profile: Vec<[f64; 2]>,
    start: f64,
    end: f64,
) -> Result<ConvexPrism, GeometryError> {
    ConvexPrism::new(axis, profile, start, end)
}

/// Axis-aligned box between two corners.
pub fn cuboid(min: Point3<f64>, max: Point3<f64>) -> Result<ConvexPrism, GeometryError> {
    ConvexPrism::new(
        Axis::Z,
        vec![
            [min.x, min.y],
            [max.x, min.y],
            [max.x, max.y],
            [min.x, max.y],
        ],
        min.z,
        max.z,
    )
}

/// Vertical cylinder approximated by a regular polygon.
pub fn cylinder(
    center_x: f64,
    center_y: f64,
    radius: f64,
    z0: f64,
    z1: f64,
    segments: usize,
) -> Result<ConvexPrism, GeometryError> {
    if radius.is_nan() || radius <= EPSILON {
        return Err(kernel_error(format!("cylinder radius {radius} must be positive")));
    }
    let profile = (0..segments.max(3))
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments.max(3) as f64;
            [center_x + radius * angle.cos(), center_y + radius * angle.sin()]
        })
        .collect();
    ConvexPrism::new(Axis::Z, profile, z0, z1)
}

/// Rectangular hollow section extruded along y: the outer rectangle minus the
/// void between flanges and webs, returned as its four solid walls.
#[derive(Debug, Clone, Copy)]
pub struct HollowSection {
    /// Section centre across the bridge.
    pub center_x: f64,
    /// Outer width, webs included.
    pub width: f64,
    /// Underside of the bottom flange.
    pub z_bottom: f64,
    /// Outer height, flanges included.
    pub height: f64,
    /// Top flange thickness.
    pub top_flange: f64,
    /// Bottom flange thickness.
    pub bottom_flange: f64,
    /// Web thickness on each side.
    pub web: f64,
}

/// Walls of `section` between `y0` and `y1`. Fails when the void would vanish.
pub fn subtract_hollow(section: &HollowSection, y0: f64, y1: f64) -> Result<Solid, GeometryError> {
    let HollowSection {
        center_x,
        width,
        z_bottom,
        height,
        top_flange,
        bottom_flange,
        web,
    } = *section;
    if width - 2.0 * web <= EPSILON {
        return Err(kernel_error(format!(
            "hollow section width {width} leaves no void between {web} m webs"
        )));
    }
    if height - top_flange - bottom_flange <= EPSILON {
        return Err(kernel_error(format!(
            "hollow section height {height} leaves no void between flanges"
        )));
    }
    let (x0, x1) = (center_x - 0.5 * width, center_x + 0.5 * width);
    let (z0, z1) = (z_bottom, z_bottom + height);
    let inner_z0 = z0 + bottom_flange;
    let inner_z1 = z1 - top_flange;

    let mut solid = Solid::new();
    solid.add(cuboid(Point3::new(x0, y0, z0), Point3::new(x1, y1, inner_z0))?);
    solid.add(cuboid(Point3::new(x0, y0, inner_z1), Point3::new(x1, y1, z1))?);
    solid.add(cuboid(Point3::new(x0, y0, inner_z0), Point3::new(x0 + web, y1, inner_z1))?);
    solid.add(cuboid(Point3::new(x1 - web, y0, inner_z0), Point3::new(x1, y1, inner_z1))?);
    Ok(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cube() -> ConvexPrism {
        cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn rejects_degenerate_primitives() {
        assert!(cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 1.0)).is_err());
        assert!(ConvexPrism::new(Axis::Z, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]], 2.0, 1.0).is_err());
        let dart = vec![[0.0, 0.0], [2.0, 0.0], [1.0, 0.5], [1.0, 2.0]];
        assert!(ConvexPrism::new(Axis::Z, dart, 0.0, 1.0).is_err());
        assert!(cylinder(0.0, 0.0, -1.0, 0.0, 1.0, 12).is_err());
    }

    #[test]
    fn clockwise_profiles_are_normalised() {
        let cw = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];
        let prism = ConvexPrism::new(Axis::Z, cw, 0.0, 2.0).unwrap();
        assert_relative_eq!(prism.volume(), 2.0);
        assert!(prism.contains(&Point3::new(0.5, 0.5, 1.0), 0.0));
    }

    #[test]
    fn containment_respects_tolerance() {
        let cube = unit_cube();
        assert!(cube.contains(&Point3::new(1.0, 0.5, 0.5), 0.0));
        assert!(!cube.contains(&Point3::new(1.02, 0.5, 0.5), 0.0));
        assert!(cube.contains(&Point3::new(1.02, 0.5, 0.5), 0.05));
    }

    #[test]
    fn exterior_distance_is_exact() {
        let cube = unit_cube();
        assert_relative_eq!(cube.distance(&Point3::new(2.0, 0.5, 0.5)), 1.0);
        assert_relative_eq!(cube.distance(&Point3::new(2.0, 2.0, 0.5)), 2f64.sqrt());
        assert_relative_eq!(cube.distance(&Point3::new(2.0, 2.0, 2.0)), 3f64.sqrt());
        assert_eq!(cube.distance(&Point3::new(0.5, 0.5, 0.5)), 0.0);
    }

    #[test]
    fn profiles_map_to_world_axes() {
        let along_y = extrude(
            Axis::Y,
            vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [0.0, 1.0]],
            -5.0,
            5.0,
        )
        .unwrap();
        let envelope = along_y.envelope();
        assert_eq!((envelope.min_x, envelope.max_x), (0.0, 2.0));
        assert_eq!((envelope.min_y, envelope.max_y), (-5.0, 5.0));
        assert_eq!((envelope.min_z, envelope.max_z), (0.0, 1.0));
    }

    #[test]
    fn mesh_encloses_positive_volume() {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let prism = extrude(
                axis,
                vec![[0.0, 0.0], [3.0, 0.0], [3.0, 2.0], [0.0, 2.0]],
                0.0,
                1.0,
            )
            .unwrap();
            let mesh = prism.to_mesh();
            assert_eq!(mesh.faces.len(), 12);
            assert_relative_eq!(mesh.signed_volume(), 6.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn hollow_section_is_four_walls() {
        let section = HollowSection {
            center_x: 0.0,
            width: 4.0,
            z_bottom: -2.0,
            height: 2.0,
            top_flange: 0.25,
            bottom_flange: 0.35,
            web: 0.5,
        };
        let solid = subtract_hollow(&section, 0.0, 10.0).unwrap();
        assert_eq!(solid.parts().len(), 4);
        let void = (4.0 - 2.0 * 0.5) * (2.0 - 0.25 - 0.35);
        assert_relative_eq!(solid.volume(), (4.0 * 2.0 - void) * 10.0, epsilon = 1e-9);
        assert!(!solid.contains(&Point3::new(0.0, 5.0, -1.0), 0.0));
        assert!(solid.contains(&Point3::new(-1.8, 5.0, -1.0), 0.0));

        let narrow = HollowSection { width: 0.8, ..section };
        assert!(subtract_hollow(&narrow, 0.0, 10.0).is_err());
    }
}
