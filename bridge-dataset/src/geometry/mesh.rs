//! Triangle meshes and their OBJ / binary STL exports.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

/// Indexed triangle mesh with counter-clockwise outward winding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    /// Vertex positions in world metres.
    pub vertices: Vec<Point3<f64>>,
    /// Vertex indices per triangle.
    pub faces: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Append another mesh, re-indexing its faces.
    pub fn append(&mut self, other: &TriMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
    }

    /// Corner positions of triangle `index`.
    pub fn triangle(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.faces[index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unnormalised face normal (length is twice the triangle area).
    pub fn face_normal(&self, index: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(index);
        (b - a).cross(&(c - a))
    }
}

#[cfg(test)]
impl TriMesh {
    /// Enclosed volume by the divergence theorem; positive for outward winding.
    pub(crate) fn signed_volume(&self) -> f64 {
        (0..self.faces.len())
            .map(|i| self.triangle(i))
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }
}

/// Write a Wavefront OBJ with 1-based face indices.
pub fn write_obj(path: &Path, mesh: &TriMesh) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "# bridge-dataset mesh")?;
    for v in &mesh.vertices {
        writeln!(writer, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    for f in &mesh.faces {
        // OBJ indices are 1-based
        writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }
    writer.flush()
}

/// Write a binary STL: 80-byte header, triangle count, then 50-byte facets.
pub fn write_stl(path: &Path, mesh: &TriMesh) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(84 + mesh.faces.len() * 50);
    let mut header = [0u8; 80];
    let label = b"bridge-dataset binary STL";
    header[..label.len()].copy_from_slice(label);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&(mesh.faces.len() as u32).to_le_bytes());

    for i in 0..mesh.faces.len() {
        let normal = mesh.face_normal(i);
        let normal = if normal.norm() > 0.0 {
            normal.normalize()
        } else {
            normal
        };
        for component in [normal.x, normal.y, normal.z] {
            bytes.extend_from_slice(&(component as f32).to_le_bytes());
        }
        for vertex in mesh.triangle(i) {
            for component in [vertex.x, vertex.y, vertex.z] {
                bytes.extend_from_slice(&(component as f32).to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }

    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> TriMesh {
        TriMesh {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            faces: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        }
    }

    #[test]
    fn append_offsets_indices() {
        let mut mesh = tetrahedron();
        mesh.append(&tetrahedron());
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.faces[4], [4, 6, 5]);
        assert_relative_eq!(mesh.signed_volume(), 2.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn obj_lists_one_based_faces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tet.obj");
        write_obj(&path, &tetrahedron()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 4);
        assert!(text.contains("f 1 3 2"));
    }

    #[test]
    fn stl_has_binary_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tet.stl");
        write_stl(&path, &tetrahedron()).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 84 + 4 * 50);
        assert_eq!(u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]), 4);
    }
}
