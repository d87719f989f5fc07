//! In-process scan surrogate for runs without an external simulator.
//!
//! Samples the surface of the bridge mesh as seen from each scanner: triangles
//! facing the scanner within range are drawn with probability proportional to
//! their projected solid angle. No occlusion is modelled.

use std::time::Duration;

use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LegScan, RawScanPoint, SceneDescription, ScanSimulator};
use crate::error::AcquisitionError;
use crate::planner::ScannerPosition;

/// Sampling density and noise of the built-in simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurrogateConfig {
    /// Returns drawn per leg before range filtering.
    pub points_per_leg: usize,
    /// Triangles whose centroid lies further than this from the scanner are skipped.
    pub max_range_m: f64,
    /// Uniform jitter along the surface normal.
    pub range_noise_m: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            points_per_leg: 20_000,
            max_range_m: 400.0,
            range_noise_m: 0.01,
        }
    }
}

/// Samples front-facing mesh triangles, weighted by projected area over squared range.
#[derive(Debug, Clone, Default)]
pub struct SurrogateSimulator {
    config: SurrogateConfig,
}

struct VisibleFace {
    vertices: [Point3<f64>; 3],
    normal: Vector3<f64>,
    cosine: f64,
}

impl SurrogateSimulator {
    /// Simulator with the given sampling settings.
    pub fn new(config: SurrogateConfig) -> Self {
        Self { config }
    }

    fn visible_faces(&self, scene: &SceneDescription<'_>, origin: &Point3<f64>) -> (Vec<VisibleFace>, Vec<f64>) {
        let mut faces = Vec::new();
        let mut weights = Vec::new();
        for component in &scene.model.components {
            let mesh = component.mesh();
            for index in 0..mesh.faces.len() {
                let vertices = mesh.triangle(index);
                let scaled = mesh.face_normal(index);
                let double_area = scaled.norm();
                if double_area <= f64::EPSILON {
                    continue;
                }
                let normal = scaled / double_area;
                let centroid = Point3::from(
                    (vertices[0].coords + vertices[1].coords + vertices[2].coords) / 3.0,
                );
                let to_scanner = origin - centroid;
                let distance = to_scanner.norm();
                if distance > self.config.max_range_m || distance <= f64::EPSILON {
                    continue;
                }
                let cosine = normal.dot(&to_scanner) / distance;
                if cosine <= 0.0 {
                    continue;
                }
                weights.push(0.5 * double_area * cosine / (distance * distance).max(1.0));
                faces.push(VisibleFace {
                    vertices,
                    normal,
                    cosine,
                });
            }
        }
        (faces, weights)
    }
}

impl ScanSimulator for SurrogateSimulator {
    fn name(&self) -> &str {
        "surrogate"
    }

    fn scan_leg(
        &self,
        scene: &SceneDescription<'_>,
        position: &ScannerPosition,
        _timeout: Duration,
    ) -> Result<LegScan, AcquisitionError> {
        let leg = position.leg;
        let (faces, weights) = self.visible_faces(scene, &position.position);
        let Ok(picker) = WeightedIndex::new(&weights) else {
            debug!(bridge_id = scene.bridge_id, leg, "no surface faces this scanner");
            return Ok(LegScan {
                leg,
                points: Vec::new(),
                trajectory: vec![position.position],
            });
        };

        let mut rng = scene.seed.leg_rng(leg);
        let noise = self.config.range_noise_m;
        let points = (0..self.config.points_per_leg)
            .map(|_| {
                let face = &faces[picker.sample(&mut rng)];
                let (mut r1, mut r2): (f64, f64) = (rng.r#gen(), rng.r#gen());
                if r1 + r2 > 1.0 {
                    r1 = 1.0 - r1;
                    r2 = 1.0 - r2;
                }
                let [a, b, c] = face.vertices;
                let jitter = if noise > 0.0 {
                    rng.gen_range(-noise..=noise)
                } else {
                    0.0
                };
                let surface = a + (b - a) * r1 + (c - a) * r2;
                RawScanPoint {
                    position: surface + face.normal * jitter,
                    intensity: (face.cosine * f64::from(u16::MAX)) as f32,
                    leg: leg as u8,
                }
            })
            .collect();

        Ok(LegScan {
            leg,
            points,
            trajectory: vec![position.position],
        })
    }
}
