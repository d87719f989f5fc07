//! Bridge geometry synthesis.
//!
//! [`synthesize`] turns a [`BridgeConfiguration`] into the ordered component
//! list of a [`FullBridgeModel`]. The superstructure algorithm is picked by
//! family; piers, railings and abutments are shared. All derived dimensions are
//! resolved and checked in [`BridgeLayout::derive`] before any solid is built.

pub mod beam_slab;
pub mod box_girder;
pub mod kernel;
pub mod mesh;
pub mod substructure;

use std::path::Path;

use constants::class::CLASS_MAP;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bounds::Envelope;
use crate::error::GeometryError;
use crate::sampler::{BridgeConfiguration, BridgeFamily};
use beam_slab::BeamSlabDeck;
use box_girder::BoxGirderDeck;
use kernel::Solid;
use mesh::TriMesh;
use substructure::PierLayout;

/// Welding tolerance between touching components.
pub const WELD_TOLERANCE: f64 = 1e-6;

/// Structural parts in their fixed labelling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Deck,
    Piers,
    Railings,
    ApproachSlabs,
    BackWalls,
    WingWalls,
}

impl ComponentKind {
    /// Every kind in labelling order.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Deck,
        ComponentKind::Piers,
        ComponentKind::Railings,
        ComponentKind::ApproachSlabs,
        ComponentKind::BackWalls,
        ComponentKind::WingWalls,
    ];

    /// Segmentation label from the class map.
    pub fn label(&self) -> u8 {
        CLASS_MAP[*self as usize].id
    }

    /// Class name from the class map.
    pub fn name(&self) -> &'static str {
        CLASS_MAP[*self as usize].name
    }
}

/// One labelled structural part of a bridge.
#[derive(Debug, Clone)]
pub struct Component {
    /// Which part this is.
    pub kind: ComponentKind,
    /// Geometry as a union of convex prisms.
    pub solid: Solid,
    /// Bounds of `solid`, cached at construction.
    pub envelope: Envelope,
}

impl Component {
    fn new(kind: ComponentKind, solid: Solid) -> Result<Self, GeometryError> {
        if solid.is_empty() {
            return Err(GeometryError::constraint(kind.name(), "component has no parts"));
        }
        let envelope = solid.envelope();
        Ok(Self {
            kind,
            solid,
            envelope,
        })
    }

    /// Segmentation label of the component kind.
    pub fn label(&self) -> u8 {
        self.kind.label()
    }

    /// Class name of the component kind.
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Triangle mesh of the solid.
    pub fn mesh(&self) -> TriMesh {
        self.solid.to_mesh()
    }
}

/// Every component of one bridge, in labelling order.
#[derive(Debug, Clone)]
pub struct FullBridgeModel {
    /// Bridge identifier.
    pub bridge_id: String,
    /// Components in labelling order.
    pub components: Vec<Component>,
    /// Union of the component envelopes.
    pub envelope: Envelope,
}

impl FullBridgeModel {
    /// Component of the given kind, if the bridge has one.
    pub fn component(&self, kind: ComponentKind) -> Option<&Component> {
        self.components.iter().find(|c| c.kind == kind)
    }

    /// Every component mesh concatenated in labelling order.
    pub fn mesh(&self) -> TriMesh {
        let mut mesh = TriMesh::default();
        for component in &self.components {
            mesh.append(&component.mesh());
        }
        mesh
    }

    /// Write `<name>.obj` per component into `dir`, returning the paths written.
    pub fn export_components(&self, dir: &Path) -> std::io::Result<Vec<(ComponentKind, std::path::PathBuf)>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.components.len());
        for component in &self.components {
            let path = dir.join(format!("{}.obj", component.name()));
            mesh::write_obj(&path, &component.mesh())?;
            written.push((component.kind, path));
        }
        Ok(written)
    }
}

/// Family-specific superstructure.
#[derive(Debug, Clone)]
pub enum Superstructure {
    BoxGirder(BoxGirderDeck),
    BeamSlab(BeamSlabDeck),
}

impl Superstructure {
    fn derive(config: &BridgeConfiguration, frame: &DeckFrame) -> Result<Self, GeometryError> {
        match config.family {
            BridgeFamily::BoxGirder => BoxGirderDeck::derive(config, frame).map(Self::BoxGirder),
            BridgeFamily::BeamSlab => BeamSlabDeck::derive(config, frame).map(Self::BeamSlab),
        }
    }

    /// Build the deck solid for the chosen family.
    pub fn build(&self, frame: &DeckFrame) -> Result<Solid, GeometryError> {
        match self {
            Superstructure::BoxGirder(deck) => deck.build(frame),
            Superstructure::BeamSlab(deck) => deck.build(frame),
        }
    }

    /// Transverse centres and half-width of hammer-head caps under this deck.
    pub fn hammer_head_seats(&self, frame: &DeckFrame) -> Vec<(f64, f64)> {
        match self {
            Superstructure::BoxGirder(deck) => deck.hammer_head_seats(),
            Superstructure::BeamSlab(_) => vec![(
                0.0,
                0.5 * constants::structure::SINGLE_COLUMN_CAP_WIDTH_FRACTION * frame.width,
            )],
        }
    }
}

/// Reference dimensions shared by every component.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckFrame {
    /// Total bridge length along y.
    pub length: f64,
    /// Deck width along x.
    pub width: f64,
    /// Girder depth below the deck slab.
    pub depth: f64,
    /// Slab thickness above z = 0.
    pub deck_thickness: f64,
    /// Height from the girder soffit down to the ground.
    pub clearance: f64,
    /// Span boundaries along y, abutment to abutment.
    pub span_boundaries: Vec<f64>,
    /// Pier positions along y.
    pub pier_lines: Vec<f64>,
}

impl DeckFrame {
    /// Take dimensions from the configuration, rejecting non-positive values and
    /// non-increasing span boundaries.
    pub fn from_config(config: &BridgeConfiguration) -> Result<Self, GeometryError> {
        let frame = Self {
            length: config.total_length_m,
            width: config.width_m,
            depth: config.girder_depth_m,
            deck_thickness: config.deck_thickness_m,
            clearance: config.clearance_height_m,
            span_boundaries: config.span_boundaries(),
            pier_lines: config.pier_positions_m.clone(),
        };
        for (name, value) in [
            ("length", frame.length),
            ("width", frame.width),
            ("depth", frame.depth),
            ("deck thickness", frame.deck_thickness),
            ("clearance", frame.clearance),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(GeometryError::constraint("frame", format!("{name} is {value}")));
            }
        }
        if frame
            .span_boundaries
            .windows(2)
            .any(|pair| pair[1] - pair[0] <= WELD_TOLERANCE)
        {
            return Err(GeometryError::constraint("frame", "span boundaries are not increasing"));
        }
        Ok(frame)
    }

    /// Ground level.
    pub fn ground_z(&self) -> f64 {
        -self.depth - self.clearance
    }

    /// Underside of the girders.
    pub fn soffit_z(&self) -> f64 {
        -self.depth
    }

    /// Half of `length`.
    pub fn half_length(&self) -> f64 {
        0.5 * self.length
    }

    /// Half of `width`.
    pub fn half_width(&self) -> f64 {
        0.5 * self.width
    }

    /// Start and end of each span along y.
    pub fn spans(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.span_boundaries.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Fully resolved, validated dimensions for one bridge.
#[derive(Debug, Clone)]
pub struct BridgeLayout {
    /// Shared reference dimensions.
    pub frame: DeckFrame,
    /// Deck layout for the bridge family.
    pub superstructure: Superstructure,
    /// Pier lines, columns and caps.
    pub piers: PierLayout,
}

impl BridgeLayout {
    /// Resolve every derived dimension and check it before any solid is built.
    pub fn derive(config: &BridgeConfiguration) -> Result<Self, GeometryError> {
        config
            .validate()
            .map_err(|reason| GeometryError::constraint("configuration", reason))?;
        let frame = DeckFrame::from_config(config)?;
        let superstructure = Superstructure::derive(config, &frame)?;
        let piers = PierLayout::derive(config, &frame, &superstructure)?;
        substructure::check_abutments(&frame)?;
        Ok(Self {
            frame,
            superstructure,
            piers,
        })
    }
}

/// Build every component of a bridge in labelling order.
pub fn synthesize(config: &BridgeConfiguration) -> Result<FullBridgeModel, GeometryError> {
    let layout = BridgeLayout::derive(config)?;
    let frame = &layout.frame;

    let mut components = Vec::with_capacity(ComponentKind::ALL.len());
    for kind in ComponentKind::ALL {
        let solid = match kind {
            ComponentKind::Deck => layout.superstructure.build(frame),
            ComponentKind::Piers => layout.piers.build(frame),
            ComponentKind::Railings => substructure::railings(frame),
            ComponentKind::ApproachSlabs => substructure::approach_slabs(frame),
            ComponentKind::BackWalls => substructure::back_walls(frame),
            ComponentKind::WingWalls => substructure::wing_walls(frame),
        }
        .map_err(|e| e.for_component(kind.name()))?;
        components.push(Component::new(kind, solid)?);
    }

    let envelope = Envelope::union_of(components.iter().map(|c| &c.envelope));
    debug!(
        bridge_id = %config.bridge_id,
        parts = components.iter().map(|c| c.solid.parts().len()).sum::<usize>(),
        "synthesized bridge geometry"
    );
    Ok(FullBridgeModel {
        bridge_id: config.bridge_id.clone(),
        components,
        envelope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use crate::sampler::{ParameterSampler, PierCrossSection, PierType, SamplerOverrides};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    pub(crate) fn scenario_config() -> BridgeConfiguration {
        let overrides = SamplerOverrides {
            family: Some(BridgeFamily::BoxGirder),
            span_count: Some(3),
            total_length_m: Some(90.0),
            width_m: Some(24.0),
            ..Default::default()
        };
        ParameterSampler::new(16)
            .sample("bridge_1", &overrides, &mut ChaCha8Rng::seed_from_u64(5))
            .unwrap()
    }

    fn all_variants() -> Vec<BridgeConfiguration> {
        let mut configs = Vec::new();
        for family in BridgeFamily::ALL {
            for pier_type in PierType::ALL {
                for cross_section in [PierCrossSection::Circular, PierCrossSection::Rectangular] {
                    let overrides = SamplerOverrides {
                        family: Some(family),
                        span_count: Some(4),
                        total_length_m: Some(120.0),
                        pier_type: Some(pier_type),
                        pier_cross_section: Some(cross_section),
                        ..Default::default()
                    };
                    configs.push(
                        ParameterSampler::new(64)
                            .sample("bridge", &overrides, &mut ChaCha8Rng::seed_from_u64(11))
                            .unwrap(),
                    );
                }
            }
        }
        configs
    }

    #[test]
    fn scenario_yields_six_components_in_order() {
        let model = synthesize(&scenario_config()).unwrap();
        let kinds: Vec<_> = model.components.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, ComponentKind::ALL.to_vec());
        let labels: Vec<_> = model.components.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn model_envelope_is_union_of_components() {
        for config in all_variants() {
            let model = synthesize(&config).unwrap();
            let union = Envelope::union_of(model.components.iter().map(|c| &c.envelope));
            assert!(model.envelope.approx_eq(&union, 1e-9));
        }
    }

    #[test]
    fn components_never_interpenetrate() {
        for config in all_variants() {
            let model = synthesize(&config).unwrap();
            for (i, a) in model.components.iter().enumerate() {
                for b in &model.components[i + 1..] {
                    for pa in a.solid.parts() {
                        for pb in b.solid.parts() {
                            let (ea, eb) = (pa.envelope(), pb.envelope());
                            let overlap = [
                                ea.max_x.min(eb.max_x) - ea.min_x.max(eb.min_x),
                                ea.max_y.min(eb.max_y) - ea.min_y.max(eb.min_y),
                                ea.max_z.min(eb.max_z) - ea.min_z.max(eb.min_z),
                            ];
                            assert!(
                                overlap.iter().any(|o| *o <= WELD_TOLERANCE),
                                "{} and {} overlap by {overlap:?} in {:?}/{:?}",
                                a.name(),
                                b.name(),
                                config.family,
                                config.pier_type
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn deck_top_is_continuous_over_pier_lines() {
        let config = scenario_config();
        let model = synthesize(&config).unwrap();
        let deck = model.component(ComponentKind::Deck).unwrap();
        let top = config.deck_thickness_m;
        for y in config.span_boundaries() {
            for sample_y in [y - 0.01, y, y + 0.01] {
                if sample_y.abs() <= 0.5 * config.total_length_m {
                    assert!(deck.solid.contains(&Point3::new(0.0, sample_y, top - 1e-3), 0.0));
                    assert!(!deck.solid.contains(&Point3::new(0.0, sample_y, top + 1e-3), 0.0));
                }
            }
        }
    }

    #[test]
    fn piers_stand_on_the_pier_lines() {
        let config = scenario_config();
        let model = synthesize(&config).unwrap();
        let piers = model.component(ComponentKind::Piers).unwrap();
        assert_eq!(config.pier_count(), 2);
        assert_eq!(piers.envelope.min_z, model.envelope.min_z);
        assert_eq!(piers.envelope.max_z, -config.girder_depth_m);
        for y in &config.pier_positions_m {
            assert!(piers.solid.parts().iter().any(|part| {
                let envelope = part.envelope();
                envelope.min_y <= *y && *y <= envelope.max_y
            }));
        }
    }

    #[test]
    fn degenerate_dimensions_fail_before_building() {
        let mut config = scenario_config();
        config.girder_depth_m = 0.5;
        let err = synthesize(&config).unwrap_err();
        assert!(err.to_string().contains("deck"));

        let mut config = scenario_config();
        config.pier_radius_m = -1.0;
        assert!(synthesize(&config).is_err());
    }

    #[test]
    fn component_labels_follow_the_class_map() {
        for (index, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(kind.label() as usize, index);
        }
        assert_eq!(ComponentKind::ApproachSlabs.name(), "approach_slabs");
    }

    #[test]
    fn exports_one_obj_per_component() {
        let model = synthesize(&scenario_config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let written = model.export_components(dir.path()).unwrap();
        assert_eq!(written.len(), 6);
        assert!(dir.path().join("wing_walls.obj").exists());
    }
}
