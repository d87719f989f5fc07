//! Scanner viewpoint planning around a bridge envelope.

use constants::scanner::{
    DEFAULT_LATERAL_OFFSET, DEFAULT_LONGITUDINAL_OFFSET, DEFAULT_VERTICAL_CLEARANCE_FRACTION,
    LEG_COUNT, VERTICAL_LEG_STAGGER_FRACTION,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::bounds::Envelope;
use crate::error::PlanningError;

/// Where a leg sits relative to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanRole {
    SideLeft,
    SideRight,
    Front,
    Back,
    Below,
    Above,
}

impl ScanRole {
    /// Role of each leg index.
    pub const BY_LEG: [ScanRole; LEG_COUNT] = [
        ScanRole::SideLeft,
        ScanRole::SideRight,
        ScanRole::Front,
        ScanRole::Back,
        ScanRole::Below,
        ScanRole::Below,
        ScanRole::Above,
        ScanRole::Above,
    ];
}

/// Scanner head sweep for one leg, in the simulator's conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanOrientation {
    /// Lowest vertical beam angle.
    pub vertical_angle_min_deg: f64,
    /// Highest vertical beam angle.
    pub vertical_angle_max_deg: f64,
    /// Head rotation where the sweep starts.
    pub head_rotate_start_deg: f64,
    /// Head rotation where the sweep stops.
    pub head_rotate_stop_deg: f64,
}

impl ScanOrientation {
    const fn new(v_min: f64, v_max: f64, start: f64, stop: f64) -> Self {
        Self {
            vertical_angle_min_deg: v_min,
            vertical_angle_max_deg: v_max,
            head_rotate_start_deg: start,
            head_rotate_stop_deg: stop,
        }
    }

    /// Sweep for each leg; the second leg of a pair looks back at the first.
    pub fn for_leg(leg: usize) -> Self {
        const TABLE: [ScanOrientation; LEG_COUNT] = [
            ScanOrientation::new(-40.0, 60.0, 90.0, 270.0),
            ScanOrientation::new(-40.0, 60.0, -90.0, 90.0),
            ScanOrientation::new(-60.0, 60.0, 0.0, 180.0),
            ScanOrientation::new(-60.0, 60.0, 180.0, 360.0),
            ScanOrientation::new(-20.0, 120.0, 90.0, 270.0),
            ScanOrientation::new(-20.0, 120.0, -90.0, 90.0),
            ScanOrientation::new(-100.0, 0.0, 0.0, 180.0),
            ScanOrientation::new(-100.0, 0.0, 180.0, 360.0),
        ];
        TABLE[leg % LEG_COUNT]
    }
}

/// One planned scan leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerPosition {
    /// Leg index, 0 to 7.
    pub leg: usize,
    /// Scanner origin in world metres.
    pub position: Point3<f64>,
    /// Placement of the leg.
    pub role: ScanRole,
    /// Head sweep of the leg.
    pub orientation: ScanOrientation,
}

/// Distances that keep scanners clear of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Added beyond the half-width for the side legs.
    pub lateral_offset_m: f64,
    /// Added beyond the half-length for the front and back legs.
    pub longitudinal_offset_m: f64,
    /// Below/above clearance as a fraction of the envelope height.
    pub vertical_clearance_fraction: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            lateral_offset_m: DEFAULT_LATERAL_OFFSET,
            longitudinal_offset_m: DEFAULT_LONGITUDINAL_OFFSET,
            vertical_clearance_fraction: DEFAULT_VERTICAL_CLEARANCE_FRACTION,
        }
    }
}

impl PlannerConfig {
    /// Every distance must be finite and positive.
    pub fn validate(&self) -> Result<(), PlanningError> {
        for (name, value) in [
            ("lateral_offset_m", self.lateral_offset_m),
            ("longitudinal_offset_m", self.longitudinal_offset_m),
            ("vertical_clearance_fraction", self.vertical_clearance_fraction),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlanningError::InvalidOffset { name, value });
            }
        }
        Ok(())
    }
}

/// Stateless planner for the eight fixed scan legs.
#[derive(Debug, Clone, Copy)]
pub struct ScanPlanner {
    config: PlannerConfig,
}

impl ScanPlanner {
    /// Planner with validated distances.
    pub fn new(config: PlannerConfig) -> Result<Self, PlanningError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Eight legs around `envelope`, each pair mirrored across its reflection
    /// plane. Fails if a leg lands inside the envelope.
    pub fn plan(&self, envelope: &Envelope) -> Result<Vec<ScannerPosition>, PlanningError> {
        if envelope.is_empty() {
            return Err(PlanningError::EmptyEnvelope);
        }
        let c = envelope.center();
        let h = envelope.half_extents();
        let lateral = h.x + self.config.lateral_offset_m;
        let longitudinal = h.y + self.config.longitudinal_offset_m;
        let vertical = h.z + self.config.vertical_clearance_fraction * 2.0 * h.z;
        let stagger = VERTICAL_LEG_STAGGER_FRACTION * h.y;

        // First leg of each pair; its partner is the mirror image across the centre
        let leading = [
            Point3::new(c.x - lateral, c.y, c.z),
            Point3::new(c.x, c.y - longitudinal, c.z),
            Point3::new(c.x, c.y - stagger, c.z - vertical),
            Point3::new(c.x, c.y - stagger, c.z + vertical),
        ];

        leading
            .into_iter()
            .enumerate()
            .flat_map(|(pair, position)| {
                let axis = reflection_axis(pair);
                let mut partner = position;
                partner[axis] = 2.0 * c[axis] - position[axis];
                [position, partner]
            })
            .enumerate()
            .map(|(leg, position)| {
                if !envelope.excludes(&position) {
                    return Err(PlanningError::ScannerInsideEnvelope {
                        leg,
                        x: position.x,
                        y: position.y,
                        z: position.z,
                    });
                }
                Ok(ScannerPosition {
                    leg,
                    position,
                    role: ScanRole::BY_LEG[leg],
                    orientation: ScanOrientation::for_leg(leg),
                })
            })
            .collect()
    }
}

/// Axis each leg pair is mirrored across: x for the side legs, y otherwise.
pub fn reflection_axis(pair: usize) -> usize {
    if pair == 0 { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn bridge_envelope() -> Envelope {
        Envelope::from_corners(Point3::new(-12.5, -55.0, -7.0), Point3::new(12.5, 55.0, 1.3))
    }

    fn assert_reflected(positions: &[ScannerPosition], center: &Point3<f64>) {
        for pair in 0..LEG_COUNT / 2 {
            let (a, b) = (&positions[2 * pair].position, &positions[2 * pair + 1].position);
            let axis = reflection_axis(pair);
            for k in 0..3 {
                if k == axis {
                    assert_relative_eq!(a[k] - center[k], center[k] - b[k], epsilon = 1e-9);
                } else {
                    assert_relative_eq!(a[k], b[k], epsilon = 1e-9);
                }
            }
            assert_eq!(positions[2 * pair].leg + 1, positions[2 * pair + 1].leg);
        }
    }

    #[test]
    fn plans_eight_legs_with_default_offsets() {
        let envelope = bridge_envelope();
        let positions = ScanPlanner::new(PlannerConfig::default())
            .unwrap()
            .plan(&envelope)
            .unwrap();
        assert_eq!(positions.len(), 8);
        assert_relative_eq!(positions[0].position.x, -19.5);
        assert_relative_eq!(positions[3].position.y, 80.0);
        // Scan height is mid-structure
        assert_relative_eq!(positions[1].position.z, -2.85, epsilon = 1e-9);
        // Clearance is a quarter of the 8.3 m height below the soffit
        assert_relative_eq!(positions[4].position.z, -7.0 - 0.25 * 8.3, epsilon = 1e-9);
        assert_eq!(positions[6].role, ScanRole::Above);
        assert_eq!(positions[7].orientation.head_rotate_stop_deg, 360.0);
        assert_reflected(&positions, &envelope.center());
    }

    #[test]
    fn identical_inputs_give_identical_plans() {
        let planner = ScanPlanner::new(PlannerConfig::default()).unwrap();
        assert_eq!(
            planner.plan(&bridge_envelope()).unwrap(),
            planner.plan(&bridge_envelope()).unwrap()
        );
    }

    #[test]
    fn rejects_non_positive_offsets() {
        let config = PlannerConfig {
            lateral_offset_m: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            ScanPlanner::new(config),
            Err(PlanningError::InvalidOffset { name: "lateral_offset_m", .. })
        ));
        let config = PlannerConfig {
            longitudinal_offset_m: f64::NAN,
            ..Default::default()
        };
        assert!(ScanPlanner::new(config).is_err());
    }

    #[test]
    fn empty_envelope_cannot_be_planned() {
        let planner = ScanPlanner::new(PlannerConfig::default()).unwrap();
        assert!(matches!(
            planner.plan(&Envelope::new()),
            Err(PlanningError::EmptyEnvelope)
        ));
    }

    proptest! {
        #[test]
        fn legs_lie_outside_and_mirror(
            cx in -100.0..100.0f64,
            cy in -100.0..100.0f64,
            cz in -20.0..20.0f64,
            hx in 0.1..30.0f64,
            hy in 0.1..120.0f64,
            hz in 0.1..15.0f64,
            lateral in 0.01..50.0f64,
            longitudinal in 0.01..50.0f64,
        ) {
            let envelope = Envelope::from_corners(
                Point3::new(cx - hx, cy - hy, cz - hz),
                Point3::new(cx + hx, cy + hy, cz + hz),
            );
            let planner = ScanPlanner::new(PlannerConfig {
                lateral_offset_m: lateral,
                longitudinal_offset_m: longitudinal,
                ..Default::default()
            }).unwrap();
            let positions = planner.plan(&envelope).unwrap();
            prop_assert_eq!(positions.len(), LEG_COUNT);
            for position in &positions {
                prop_assert!(envelope.excludes(&position.position));
            }
            let center = envelope.center();
            for pair in 0..LEG_COUNT / 2 {
                let (a, b) = (&positions[2 * pair].position, &positions[2 * pair + 1].position);
                let axis = reflection_axis(pair);
                prop_assert!(((a[axis] - center[axis]) + (b[axis] - center[axis])).abs() < 1e-6);
            }
        }
    }
}
