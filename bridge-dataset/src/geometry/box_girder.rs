//! Multi-cell box-girder superstructure.

use constants::structure::{
    BOX_BOTTOM_FLANGE_THICKNESS, BOX_CANTILEVER_ALLOWANCE, BOX_TOP_FLANGE_THICKNESS,
    BOX_WEB_THICKNESS, HAUNCH_INNER_DEPTH, HAUNCH_OUTER_DEPTH,
};
use nalgebra::Point3;

use super::DeckFrame;
use super::kernel::{self, Axis, HollowSection, Solid};
use crate::error::GeometryError;
use crate::sampler::{BridgeConfiguration, box_cell_count};

/// Cell layout of a multi-cell box girder.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxGirderDeck {
    /// Hollow cells across the width.
    pub cells: usize,
    /// Outer width of one cell, webs included.
    pub cell_width: f64,
    /// Top flange thickness.
    pub top_flange: f64,
    /// Bottom flange thickness.
    pub bottom_flange: f64,
    /// Web thickness.
    pub web: f64,
}

impl BoxGirderDeck {
    /// Derive the cell layout and reject depths the flanges or haunch cannot fit.
    pub fn derive(config: &BridgeConfiguration, frame: &DeckFrame) -> Result<Self, GeometryError> {
        let cells = box_cell_count(frame.depth, frame.width);
        let deck = Self {
            cells,
            cell_width: (frame.width - BOX_CANTILEVER_ALLOWANCE) / cells as f64,
            top_flange: BOX_TOP_FLANGE_THICKNESS,
            bottom_flange: BOX_BOTTOM_FLANGE_THICKNESS,
            web: BOX_WEB_THICKNESS,
        };

        if deck.cell_width <= 2.0 * deck.web {
            return Err(GeometryError::constraint(
                "deck",
                format!(
                    "{} m wide {} leaves no cell void",
                    frame.width, config.bridge_id
                ),
            ));
        }
        if frame.depth <= deck.top_flange + deck.bottom_flange {
            return Err(GeometryError::constraint(
                "deck",
                format!(
                    "girder depth {:.2} m is not deeper than the flanges ({:.2} m)",
                    frame.depth,
                    deck.top_flange + deck.bottom_flange
                ),
            ));
        }
        if frame.depth <= HAUNCH_INNER_DEPTH {
            return Err(GeometryError::constraint(
                "deck",
                "girder depth does not clear the cantilever haunch",
            ));
        }
        Ok(deck)
    }

    /// Outer face of the outermost web.
    fn box_half_width(&self) -> f64 {
        0.5 * self.cells as f64 * self.cell_width
    }

    fn cell_centers(&self) -> impl Iterator<Item = f64> + '_ {
        let first = -self.box_half_width() + 0.5 * self.cell_width;
        (0..self.cells).map(move |i| first + i as f64 * self.cell_width)
    }

    /// Centre and half-width of each cell, where hammer-head caps sit.
    pub fn hammer_head_seats(&self) -> Vec<(f64, f64)> {
        self.cell_centers()
            .map(|x| (x, 0.5 * self.cell_width))
            .collect()
    }

    /// Slab, hollow cells per span and cantilever haunches.
    pub fn build(&self, frame: &DeckFrame) -> Result<Solid, GeometryError> {
        let (hw, hl) = (frame.half_width(), frame.half_length());
        let mut deck = Solid::from(kernel::cuboid(
            Point3::new(-hw, -hl, 0.0),
            Point3::new(hw, hl, frame.deck_thickness),
        )?);

        for (y0, y1) in frame.spans() {
            for center_x in self.cell_centers() {
                let section = HollowSection {
                    center_x,
                    width: self.cell_width,
                    z_bottom: -frame.depth,
                    height: frame.depth,
                    top_flange: self.top_flange,
                    bottom_flange: self.bottom_flange,
                    web: self.web,
                };
                deck = deck.union(kernel::subtract_hollow(&section, y0, y1)?);
            }
        }

        // Cantilever haunches taper from the outer web to the deck edge
        let edge = self.box_half_width();
        for side in [-1.0, 1.0] {
            let profile = vec![
                [side * edge, -HAUNCH_INNER_DEPTH],
                [side * hw, -HAUNCH_OUTER_DEPTH],
                [side * hw, 0.0],
                [side * edge, 0.0],
            ];
            deck.add(kernel::extrude(Axis::Y, profile, -hl, hl)?);
        }
        Ok(deck)
    }
}
