//! Beam-and-slab superstructure: parallel girders per bay under a continuous slab.

use constants::structure::{GIRDER_THICKNESS, MIN_GIRDER_SPACING};
use nalgebra::Point3;

use super::DeckFrame;
use super::kernel::{self, Solid};
use crate::error::GeometryError;
use crate::sampler::BridgeConfiguration;

/// Girder layout of a beam-and-slab deck.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSlabDeck {
    /// Girders across the width.
    pub girders: usize,
    /// Centre-to-centre girder spacing.
    pub spacing: f64,
    /// Girder web thickness.
    pub girder_thickness: f64,
}

impl BeamSlabDeck {
    /// Pick the girder count for the deck width, at least two.
    pub fn derive(config: &BridgeConfiguration, frame: &DeckFrame) -> Result<Self, GeometryError> {
        let girders = ((frame.width / MIN_GIRDER_SPACING).round() as usize).max(2);
        let deck = Self {
            girders,
            spacing: frame.width / girders as f64,
            girder_thickness: GIRDER_THICKNESS,
        };
        if deck.spacing <= deck.girder_thickness {
            return Err(GeometryError::constraint(
                "deck",
                format!(
                    "{} girders at {:.2} m spacing overlap on {}",
                    girders, deck.spacing, config.bridge_id
                ),
            ));
        }
        Ok(deck)
    }

    /// Girder centrelines, evenly spread with half a spacing at each edge.
    pub fn girder_centers(&self) -> impl Iterator<Item = f64> + '_ {
        let first = -0.5 * self.spacing * (self.girders as f64 - 1.0);
        (0..self.girders).map(move |i| first + i as f64 * self.spacing)
    }

    /// Slab over the full deck plus one girder per bay and span.
    pub fn build(&self, frame: &DeckFrame) -> Result<Solid, GeometryError> {
        let (hw, hl) = (frame.half_width(), frame.half_length());
        let mut deck = Solid::from(kernel::cuboid(
            Point3::new(-hw, -hl, 0.0),
            Point3::new(hw, hl, frame.deck_thickness),
        )?);
        let half = 0.5 * self.girder_thickness;
        for (y0, y1) in frame.spans() {
            for x in self.girder_centers() {
                deck.add(kernel::cuboid(
                    Point3::new(x - half, y0, -frame.depth),
                    Point3::new(x + half, y1, 0.0),
                )?);
            }
        }
        Ok(deck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{BridgeFamily, ParameterSampler, SamplerOverrides};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn beam_slab_config() -> BridgeConfiguration {
        let overrides = SamplerOverrides {
            family: Some(BridgeFamily::BeamSlab),
            span_count: Some(3),
            total_length_m: Some(60.0),
            width_m: Some(21.0),
            ..Default::default()
        };
        ParameterSampler::new(32)
            .sample("bridge_2", &overrides, &mut ChaCha8Rng::seed_from_u64(8))
            .unwrap()
    }

    #[test]
    fn girder_count_follows_width() {
        let config = beam_slab_config();
        let frame = DeckFrame::from_config(&config).unwrap();
        let deck = BeamSlabDeck::derive(&config, &frame).unwrap();
        assert_eq!(deck.girders, 6);
        let centers: Vec<f64> = deck.girder_centers().collect();
        assert!((centers[0] + 8.75).abs() < 1e-9);
        assert!((centers[5] - 8.75).abs() < 1e-9);
    }

    #[test]
    fn one_girder_per_bay_per_line() {
        let config = beam_slab_config();
        let frame = DeckFrame::from_config(&config).unwrap();
        let solid = BeamSlabDeck::derive(&config, &frame)
            .unwrap()
            .build(&frame)
            .unwrap();
        assert_eq!(solid.parts().len(), 1 + 3 * 6);
        let soffit = -config.girder_depth_m + 0.01;
        assert!(solid.contains(&Point3::new(-8.75, 0.0, soffit), 0.0));
        assert!(!solid.contains(&Point3::new(0.0, 0.0, soffit), 0.0));
    }
}
