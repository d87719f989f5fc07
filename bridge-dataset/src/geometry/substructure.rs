//! Piers, railings and abutments shared by both superstructure families.

use constants::structure::{
    APPROACH_SLAB_LENGTH, BACK_WALL_THICKNESS, CIRCLE_SEGMENTS, CLOSING_WALL_THICKNESS,
    HAMMER_HEAD_RECT_LOWER_WIDTH, HAMMER_HEAD_SLANT_HEIGHT, HAMMER_HEAD_STRAIGHT_HEIGHT,
    HAMMER_HEAD_THICKNESS, PRISMATIC_CAP_HEIGHT, RAILING_BAR_COUNT, RAILING_POST_HEIGHT,
    RAILING_POST_SIDE, RAILING_POST_SPACING, SINGLE_COLUMN_CAP_WIDTH_FRACTION,
    SINGLE_COLUMN_RADIUS_FACTOR, WING_WALL_CAP_FRACTION, WING_WALL_THICKNESS,
    WING_WALL_TOP_LENGTH,
};
use nalgebra::Point3;

use super::kernel::{self, Axis, ConvexPrism, Solid};
use super::{DeckFrame, Superstructure};
use crate::error::GeometryError;
use crate::sampler::{BridgeConfiguration, PierCrossSection, PierType};

/// Cap on top of each pier line.
#[derive(Debug, Clone, PartialEq)]
pub enum PierCap {
    /// Rectangular cap beam under the deck.
    Prismatic { half_width: f64, half_thickness: f64 },
    /// Two-stage hammer head per column: straight then slanted down to the column.
    HammerHead { half_widths: Vec<f64>, lower_width: f64 },
}

/// Resolved pier dimensions shared by every pier line of a bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct PierLayout {
    /// Pier positions along y.
    pub lines: Vec<f64>,
    /// Column shape.
    pub cross_section: PierCrossSection,
    /// Column radius, or half the side for rectangular columns.
    pub column_half_size: f64,
    /// Column centres across the bridge.
    pub column_xs: Vec<f64>,
    /// Cap shape and size.
    pub cap: PierCap,
    /// Top of the columns, where the cap begins.
    pub column_top: f64,
}

impl PierLayout {
    /// Resolve column count, size and cap for the configuration and deck.
    pub fn derive(
        config: &BridgeConfiguration,
        frame: &DeckFrame,
        superstructure: &Superstructure,
    ) -> Result<Self, GeometryError> {
        let radius = config.pier_radius_m;
        let (column_half_size, column_xs, cap, cap_height) = match config.pier_type {
            PierType::SingleColumn => {
                let r = SINGLE_COLUMN_RADIUS_FACTOR * radius;
                let cap = PierCap::Prismatic {
                    half_width: 0.5 * SINGLE_COLUMN_CAP_WIDTH_FRACTION * frame.width,
                    half_thickness: r,
                };
                (r, vec![0.0], cap, PRISMATIC_CAP_HEIGHT)
            }
            PierType::MultiColumn => {
                let n = config.columns_per_pier.max(2);
                let spacing = frame.width / n as f64;
                if spacing <= 2.0 * radius {
                    return Err(pier_error(format!(
                        "{n} columns of radius {radius} do not fit in {:.2} m",
                        frame.width
                    )));
                }
                let first = -0.5 * spacing * (n as f64 - 1.0);
                let xs = (0..n).map(|i| first + i as f64 * spacing).collect();
                let cap = PierCap::Prismatic {
                    half_width: frame.half_width(),
                    half_thickness: radius,
                };
                (radius, xs, cap, PRISMATIC_CAP_HEIGHT)
            }
            PierType::HammerHead => {
                let seats = superstructure.hammer_head_seats(frame);
                let lower_width = match config.pier_cross_section {
                    PierCrossSection::Circular => 2.0 * radius,
                    PierCrossSection::Rectangular => HAMMER_HEAD_RECT_LOWER_WIDTH,
                };
                if let Some((_, half)) = seats.iter().find(|(_, half)| *half <= 0.5 * lower_width) {
                    return Err(pier_error(format!(
                        "hammer head half-width {half:.2} m is narrower than its column"
                    )));
                }
                let cap = PierCap::HammerHead {
                    half_widths: seats.iter().map(|(_, half)| *half).collect(),
                    lower_width,
                };
                let xs = seats.iter().map(|(x, _)| *x).collect();
                (
                    0.5 * lower_width,
                    xs,
                    cap,
                    HAMMER_HEAD_STRAIGHT_HEIGHT + HAMMER_HEAD_SLANT_HEIGHT,
                )
            }
        };

        let layout = Self {
            lines: frame.pier_lines.clone(),
            cross_section: config.pier_cross_section,
            column_half_size,
            column_xs,
            cap,
            column_top: frame.soffit_z() - cap_height,
        };

        if layout.column_top - frame.ground_z() <= 0.0 {
            return Err(pier_error(format!(
                "cap height {cap_height} m exceeds the {:.2} m clearance",
                frame.clearance
            )));
        }
        let reach = layout.half_thickness();
        let limit = frame.half_length() - BACK_WALL_THICKNESS;
        if let Some(y) = layout.lines.iter().find(|y| y.abs() + reach >= limit) {
            return Err(pier_error(format!(
                "pier line at {y:.2} m runs into the abutment seat"
            )));
        }
        Ok(layout)
    }

    /// Half extent of a pier along the bridge axis.
    fn half_thickness(&self) -> f64 {
        match &self.cap {
            PierCap::Prismatic { half_thickness, .. } => half_thickness.max(self.column_half_size),
            PierCap::HammerHead { .. } => (0.5 * HAMMER_HEAD_THICKNESS).max(self.column_half_size),
        }
    }

    /// Columns from ground to cap, plus the cap, for every pier line.
    pub fn build(&self, frame: &DeckFrame) -> Result<Solid, GeometryError> {
        let mut piers = Solid::new();
        let ground = frame.ground_z();
        let soffit = frame.soffit_z();
        for &y in &self.lines {
            for &x in &self.column_xs {
                piers.add(self.column(x, y, ground)?);
            }
            match &self.cap {
                PierCap::Prismatic {
                    half_width,
                    half_thickness,
                } => {
                    piers.add(kernel::cuboid(
                        Point3::new(-half_width, y - half_thickness, self.column_top),
                        Point3::new(*half_width, y + half_thickness, soffit),
                    )?);
                }
                PierCap::HammerHead {
                    half_widths,
                    lower_width,
                } => {
                    for (&x, &half) in self.column_xs.iter().zip(half_widths) {
                        let neck = soffit - HAMMER_HEAD_STRAIGHT_HEIGHT;
                        let profile = vec![
                            [x - half, soffit],
                            [x - half, neck],
                            [x - 0.5 * lower_width, self.column_top],
                            [x + 0.5 * lower_width, self.column_top],
                            [x + half, neck],
                            [x + half, soffit],
                        ];
                        let half_thickness = 0.5 * HAMMER_HEAD_THICKNESS;
                        piers.add(kernel::extrude(
                            Axis::Y,
                            profile,
                            y - half_thickness,
                            y + half_thickness,
                        )?);
                    }
                }
            }
        }
        Ok(piers)
    }

    fn column(&self, x: f64, y: f64, ground: f64) -> Result<ConvexPrism, GeometryError> {
        let r = self.column_half_size;
        match self.cross_section {
            PierCrossSection::Circular => {
                kernel::cylinder(x, y, r, ground, self.column_top, CIRCLE_SEGMENTS)
            }
            PierCrossSection::Rectangular => kernel::cuboid(
                Point3::new(x - r, y - r, ground),
                Point3::new(x + r, y + r, self.column_top),
            ),
        }
    }
}

fn pier_error(reason: String) -> GeometryError {
    GeometryError::constraint("piers", reason)
}

/// Abutment dimensions depend only on the frame; check them up front.
pub fn check_abutments(frame: &DeckFrame) -> Result<(), GeometryError> {
    let shortest = frame
        .spans()
        .map(|(y0, y1)| y1 - y0)
        .fold(f64::INFINITY, f64::min);
    if shortest <= BACK_WALL_THICKNESS {
        return Err(GeometryError::constraint(
            "back_walls",
            format!("span of {shortest:.2} m cannot hold a {BACK_WALL_THICKNESS} m seat"),
        ));
    }
    let cap_depth = WING_WALL_CAP_FRACTION * frame.clearance;
    if cap_depth >= frame.depth + frame.clearance {
        return Err(GeometryError::constraint(
            "wing_walls",
            "sloped cap is deeper than the wall",
        ));
    }
    if frame.length <= RAILING_POST_SPACING {
        return Err(GeometryError::constraint(
            "railings",
            "bridge shorter than one railing bay",
        ));
    }
    Ok(())
}

/// Posts along both deck edges with horizontal bars between the end posts.
pub fn railings(frame: &DeckFrame) -> Result<Solid, GeometryError> {
    let side = RAILING_POST_SIDE;
    let posts = ((frame.length / RAILING_POST_SPACING).floor() as usize).max(2);
    let first = -0.5 * RAILING_POST_SPACING * (posts as f64 - 1.0);
    let last = -first;
    let base = frame.deck_thickness;

    let mut railings = Solid::new();
    for x0 in [-frame.half_width(), frame.half_width() - side] {
        for i in 0..posts {
            let y = first + i as f64 * RAILING_POST_SPACING;
            railings.add(kernel::cuboid(
                Point3::new(x0, y - 0.5 * side, base),
                Point3::new(x0 + side, y + 0.5 * side, base + RAILING_POST_HEIGHT),
            )?);
        }
        for bar in 1..=RAILING_BAR_COUNT {
            let top = base + RAILING_POST_HEIGHT * bar as f64 / RAILING_BAR_COUNT as f64;
            railings.add(kernel::cuboid(
                Point3::new(x0, first - 0.5 * side, top - side),
                Point3::new(x0 + side, last + 0.5 * side, top),
            )?);
        }
    }
    Ok(railings)
}

/// Slabs continuing the deck surface beyond both abutments.
pub fn approach_slabs(frame: &DeckFrame) -> Result<Solid, GeometryError> {
    let (hw, hl) = (frame.half_width(), frame.half_length());
    let mut slabs = Solid::new();
    for (y0, y1) in [(-hl - APPROACH_SLAB_LENGTH, -hl), (hl, hl + APPROACH_SLAB_LENGTH)] {
        slabs.add(kernel::cuboid(
            Point3::new(-hw, y0, 0.0),
            Point3::new(hw, y1, frame.deck_thickness),
        )?);
    }
    Ok(slabs)
}

/// Seat wall under each deck end plus the closing wall behind it.
pub fn back_walls(frame: &DeckFrame) -> Result<Solid, GeometryError> {
    let (hw, hl) = (frame.half_width(), frame.half_length());
    let ground = frame.ground_z();
    let mut walls = Solid::new();
    for sign in [-1.0, 1.0] {
        let seat = [sign * (hl - BACK_WALL_THICKNESS), sign * hl];
        let closing = [sign * hl, sign * (hl + CLOSING_WALL_THICKNESS)];
        walls.add(kernel::cuboid(
            Point3::new(-hw, seat[0].min(seat[1]), ground),
            Point3::new(hw, seat[0].max(seat[1]), frame.soffit_z()),
        )?);
        walls.add(kernel::cuboid(
            Point3::new(-hw, closing[0].min(closing[1]), ground),
            Point3::new(hw, closing[0].max(closing[1]), 0.0),
        )?);
    }
    Ok(walls)
}

/// Four wing walls flanking the abutments, each split into a seat block and a
/// sloped retaining panel so every part stays convex.
pub fn wing_walls(frame: &DeckFrame) -> Result<Solid, GeometryError> {
    let (hw, hl) = (frame.half_width(), frame.half_length());
    let ground = frame.ground_z();
    let toe = -WING_WALL_CAP_FRACTION * frame.clearance;
    let mut walls = Solid::new();
    for sign in [-1.0, 1.0] {
        let seat = vec![
            [sign * (hl - BACK_WALL_THICKNESS), ground],
            [sign * hl, ground],
            [sign * hl, 0.0],
            [sign * (hl - BACK_WALL_THICKNESS), 0.0],
        ];
        let panel = vec![
            [sign * hl, ground],
            [sign * (hl + WING_WALL_TOP_LENGTH), toe],
            [sign * (hl + WING_WALL_TOP_LENGTH), 0.0],
            [sign * hl, 0.0],
        ];
        for (x0, x1) in [
            (-hw - WING_WALL_THICKNESS, -hw),
            (hw, hw + WING_WALL_THICKNESS),
        ] {
            walls.add(kernel::extrude(Axis::X, seat.clone(), x0, x1)?);
            walls.add(kernel::extrude(Axis::X, panel.clone(), x0, x1)?);
        }
    }
    Ok(walls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::scenario_config;
    use crate::geometry::{BridgeLayout, synthesize};

    #[test]
    fn multi_column_piers_get_one_cap_per_line() {
        let mut config = scenario_config();
        config.pier_type = PierType::MultiColumn;
        config.columns_per_pier = 3;
        let layout = BridgeLayout::derive(&config).unwrap();
        assert_eq!(layout.piers.column_xs, vec![-8.0, 0.0, 8.0]);
        let piers = layout.piers.build(&layout.frame).unwrap();
        assert_eq!(piers.parts().len(), 2 * (3 + 1));
    }

    #[test]
    fn hammer_heads_sit_under_each_box_cell() {
        let mut config = scenario_config();
        config.pier_type = PierType::HammerHead;
        config.pier_cross_section = PierCrossSection::Rectangular;
        let layout = BridgeLayout::derive(&config).unwrap();
        assert_eq!(layout.piers.column_xs, vec![-5.0, 5.0]);
        let piers = layout.piers.build(&layout.frame).unwrap();
        let y = config.pier_positions_m[0];
        let soffit = -config.girder_depth_m;
        // Straight stage is full width, slanted stage narrows towards the column
        assert!(piers.contains(&Point3::new(-9.9, y, soffit - 0.5), 0.0));
        assert!(!piers.contains(&Point3::new(-9.9, y, soffit - 1.9), 0.0));
        assert!(piers.contains(&Point3::new(-5.0, y, soffit - 1.9), 0.0));
    }

    #[test]
    fn oversized_columns_are_rejected() {
        let mut config = scenario_config();
        config.pier_type = PierType::MultiColumn;
        config.columns_per_pier = 12;
        config.pier_radius_m = 1.5;
        let err = BridgeLayout::derive(&config).unwrap_err();
        assert!(err.to_string().contains("piers"));
    }

    #[test]
    fn railings_top_out_one_metre_above_the_deck() {
        let config = scenario_config();
        let model = synthesize(&config).unwrap();
        let railings = &model.components[2];
        assert!((railings.envelope.max_z - config.deck_thickness_m - 1.0).abs() < 1e-9);
        assert_eq!(railings.envelope.min_z, config.deck_thickness_m);
        assert!((railings.envelope.max_x - 12.0).abs() < 1e-9);
    }

    #[test]
    fn abutments_extend_past_both_ends() {
        let config = scenario_config();
        let model = synthesize(&config).unwrap();
        let slabs = &model.components[3].envelope;
        assert_eq!((slabs.min_y, slabs.max_y), (-55.0, 55.0));
        let wings = &model.components[5].envelope;
        assert_eq!((wings.min_x, wings.max_x), (-12.5, 12.5));
        assert_eq!(wings.max_y, 49.0);
        assert_eq!(wings.min_z, -config.girder_depth_m - config.clearance_height_m);
    }
}
