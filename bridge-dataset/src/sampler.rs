//! Parameter sampling for bridge configurations.
use constants::structure::{
    CLEARANCE_HEIGHT, DECK_THICKNESS, LANE_WIDTH, MULTI_COLUMN_SPACING, NON_LANE_WIDTH,
    PIER_RADIUS,
};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SamplingError;

/// Inclusive range of span counts.
pub const SPAN_COUNT_RANGE: (usize, usize) = (2, 5);
/// Overall length range in metres, across both families.
pub const TOTAL_LENGTH_RANGE: (f64, f64) = (35.0, 160.0);
/// Deck width range in metres.
pub const WIDTH_RANGE: (f64, f64) = (20.5, 27.5);

/// Relative spread of individual span weights around the mean.
pub const SPAN_VARIANCE: f64 = 0.15;
/// No span may be shorter than this fraction of the mean span.
pub const MIN_SPAN_FRACTION: f64 = 0.7;
/// Hammer-head piers are not used when any span is shorter than this.
pub const HAMMER_HEAD_MIN_SPAN: f64 = 20.0;

const SUM_TOLERANCE: f64 = 1e-6;

/// Superstructure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeFamily {
    BoxGirder,
    BeamSlab,
}

impl BridgeFamily {
    /// Every family, in sampling order.
    pub const ALL: [BridgeFamily; 2] = [BridgeFamily::BoxGirder, BridgeFamily::BeamSlab];

    /// Span, length and depth bounds for the family.
    pub fn bounds(&self) -> FamilyBounds {
        match self {
            BridgeFamily::BeamSlab => FamilyBounds {
                mean_span: (10.0, 30.0),
                total_length: (35.0, 120.0),
                depth_ratio: (0.06, 0.07),
            },
            BridgeFamily::BoxGirder => FamilyBounds {
                mean_span: (15.0, 45.0),
                total_length: (45.0, 160.0),
                depth_ratio: (0.05, 0.06),
            },
        }
    }

    /// Snake-case name, as written to records.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeFamily::BoxGirder => "box_girder",
            BridgeFamily::BeamSlab => "beam_slab",
        }
    }

    /// Pier type weights in `PierType::ALL` order.
    fn pier_weights(&self) -> [f64; 3] {
        match self {
            BridgeFamily::BoxGirder => [0.25, 0.15, 0.6],
            BridgeFamily::BeamSlab => [0.3, 0.6, 0.1],
        }
    }
}

impl std::str::FromStr for BridgeFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "box_girder" | "box" => Ok(BridgeFamily::BoxGirder),
            "beam_slab" | "beam" => Ok(BridgeFamily::BeamSlab),
            other => Err(format!("unknown bridge family '{other}'")),
        }
    }
}

/// Family-specific parameter bounds.
#[derive(Debug, Clone, Copy)]
pub struct FamilyBounds {
    /// Mean span range in metres.
    pub mean_span: (f64, f64),
    /// Overall length range in metres.
    pub total_length: (f64, f64),
    /// Girder depth as a fraction of the mean span.
    pub depth_ratio: (f64, f64),
}

/// Pier arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PierType {
    SingleColumn,
    MultiColumn,
    HammerHead,
}

impl PierType {
    /// Every pier type, in weight order.
    pub const ALL: [PierType; 3] = [
        PierType::SingleColumn,
        PierType::MultiColumn,
        PierType::HammerHead,
    ];
}

/// Column cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PierCrossSection {
    Circular,
    Rectangular,
}

/// One internally consistent bridge. Built once by the sampler and only read afterwards.
///
/// Frame: x across the width, y along the length (centred on zero), z up with
/// the girder tops at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfiguration {
    /// Bridge identifier.
    pub bridge_id: String,
    /// Superstructure family.
    pub family: BridgeFamily,
    /// Number of spans.
    pub span_count: usize,
    /// Sum of all spans.
    pub total_length_m: f64,
    /// Deck width.
    pub width_m: f64,
    /// Traffic lanes derived from the width.
    pub lanes: u32,
    /// Individual span lengths, summing to `total_length_m`.
    pub span_lengths_m: Vec<f64>,
    /// Pier line positions along y, one per interior span boundary.
    pub pier_positions_m: Vec<f64>,
    /// Pier arrangement.
    pub pier_type: PierType,
    /// Column cross-section.
    pub pier_cross_section: PierCrossSection,
    /// Columns in each pier line.
    pub columns_per_pier: usize,
    /// Girder depth below the slab.
    pub girder_depth_m: f64,
    /// Slab thickness.
    pub deck_thickness_m: f64,
    /// Column radius, or half side for rectangular columns.
    pub pier_radius_m: f64,
    /// Height from the girder soffit to the ground.
    pub clearance_height_m: f64,
}

impl BridgeConfiguration {
    /// Pier lines, always one fewer than the spans.
    pub fn pier_count(&self) -> usize {
        self.pier_positions_m.len()
    }

    /// Average span length.
    pub fn mean_span(&self) -> f64 {
        self.total_length_m / self.span_count as f64
    }

    /// Span boundaries along y, from the first abutment to the last.
    pub fn span_boundaries(&self) -> Vec<f64> {
        let mut boundaries = Vec::with_capacity(self.span_count + 1);
        let mut y = -0.5 * self.total_length_m;
        boundaries.push(y);
        for span in &self.span_lengths_m {
            y += span;
            boundaries.push(y);
        }
        boundaries
    }

    /// Check every structural invariant. Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        let bounds = self.family.bounds();
        if !(SPAN_COUNT_RANGE.0..=SPAN_COUNT_RANGE.1).contains(&self.span_count) {
            return Err(format!("span count {} outside 2..=5", self.span_count));
        }
        if self.span_lengths_m.len() != self.span_count {
            return Err("span length list does not match span count".into());
        }
        if self.pier_positions_m.len() != self.span_count - 1 {
            return Err("pier count must equal span count - 1".into());
        }
        in_range("total length", self.total_length_m, TOTAL_LENGTH_RANGE)?;
        in_range("total length", self.total_length_m, bounds.total_length)?;
        in_range("width", self.width_m, WIDTH_RANGE)?;
        in_range("mean span", self.mean_span(), bounds.mean_span)?;

        let sum: f64 = self.span_lengths_m.iter().sum();
        if (sum - self.total_length_m).abs() > SUM_TOLERANCE {
            return Err(format!(
                "span lengths sum to {sum} instead of {}",
                self.total_length_m
            ));
        }
        let min_span = MIN_SPAN_FRACTION * self.mean_span();
        if let Some(short) = self.span_lengths_m.iter().find(|s| **s < min_span) {
            return Err(format!("span {short:.2} m shorter than {min_span:.2} m"));
        }
        if self.pier_type == PierType::HammerHead && self.shortest_span() < HAMMER_HEAD_MIN_SPAN {
            return Err(format!(
                "hammer-head piers need spans of at least {HAMMER_HEAD_MIN_SPAN} m"
            ));
        }
        for (name, value) in [
            ("girder depth", self.girder_depth_m),
            ("deck thickness", self.deck_thickness_m),
            ("pier radius", self.pier_radius_m),
            ("clearance height", self.clearance_height_m),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be positive, got {value}"));
            }
        }
        if self.columns_per_pier == 0 {
            return Err("piers need at least one column".into());
        }
        Ok(())
    }

    fn shortest_span(&self) -> f64 {
        self.span_lengths_m
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

fn in_range(name: &str, value: f64, (lo, hi): (f64, f64)) -> Result<(), String> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(format!("{name} {value:.2} outside [{lo}, {hi}]"))
    }
}

/// Box cells across the width: one when the depth/width ratio is in [1/6, 1/5], else two.
pub fn box_cell_count(girder_depth: f64, width: f64) -> usize {
    let ratio = girder_depth / width;
    if (1.0 / 6.0..=1.0 / 5.0).contains(&ratio) {
        1
    } else {
        2
    }
}

/// Caller-fixed values; anything left `None` is drawn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerOverrides {
    /// Fixed family.
    pub family: Option<BridgeFamily>,
    /// Fixed span count.
    pub span_count: Option<usize>,
    /// Fixed total length.
    pub total_length_m: Option<f64>,
    /// Fixed deck width.
    pub width_m: Option<f64>,
    /// Fixed pier arrangement.
    pub pier_type: Option<PierType>,
    /// Fixed column cross-section.
    pub pier_cross_section: Option<PierCrossSection>,
}

/// Draws valid bridge configurations from a caller-supplied random stream.
#[derive(Debug, Clone)]
pub struct ParameterSampler {
    max_attempts: u32,
}

impl ParameterSampler {
    /// Sampler allowing `max_attempts` draws per bridge, at least one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw one configuration, retrying up to the attempt budget.
    pub fn sample<R: Rng>(
        &self,
        bridge_id: &str,
        overrides: &SamplerOverrides,
        rng: &mut R,
    ) -> Result<BridgeConfiguration, SamplingError> {
        check_overrides(overrides).map_err(|reason| SamplingError::violation(1, reason))?;

        let mut last_reason = String::new();
        for attempt in 1..=self.max_attempts {
            match self.draw(bridge_id, overrides, rng) {
                Ok(config) => {
                    debug!(bridge_id, attempt, "sampled configuration");
                    return Ok(config);
                }
                Err(reason) => {
                    debug!(bridge_id, attempt, %reason, "rejected draw");
                    last_reason = reason;
                }
            }
        }
        Err(SamplingError::violation(self.max_attempts, last_reason))
    }

    fn draw<R: Rng>(
        &self,
        bridge_id: &str,
        overrides: &SamplerOverrides,
        rng: &mut R,
    ) -> Result<BridgeConfiguration, String> {
        let family = overrides
            .family
            .unwrap_or_else(|| BridgeFamily::ALL[rng.gen_range(0..BridgeFamily::ALL.len())]);
        let bounds = family.bounds();

        let span_count = overrides
            .span_count
            .unwrap_or_else(|| rng.gen_range(SPAN_COUNT_RANGE.0..=SPAN_COUNT_RANGE.1));
        let total_length = overrides
            .total_length_m
            .unwrap_or_else(|| rng.gen_range(bounds.total_length.0..=bounds.total_length.1));
        let width = overrides
            .width_m
            .unwrap_or_else(|| rng.gen_range(WIDTH_RANGE.0..=WIDTH_RANGE.1));

        in_range("total length", total_length, bounds.total_length)?;
        let mean_span = total_length / span_count as f64;
        in_range("mean span", mean_span, bounds.mean_span)?;

        let span_lengths = distribute_spans(total_length, span_count, rng);
        let shortest = span_lengths.iter().copied().fold(f64::INFINITY, f64::min);

        let girder_depth = mean_span * rng.gen_range(bounds.depth_ratio.0..=bounds.depth_ratio.1);

        let pier_type = match overrides.pier_type {
            Some(pier_type) => pier_type,
            None => {
                let mut weights = family.pier_weights();
                if shortest < HAMMER_HEAD_MIN_SPAN {
                    weights[2] = 0.0;
                }
                let index = WeightedIndex::new(weights).map_err(|e| e.to_string())?;
                PierType::ALL[index.sample(rng)]
            }
        };
        let pier_cross_section = overrides.pier_cross_section.unwrap_or_else(|| {
            if rng.gen_bool(0.5) {
                PierCrossSection::Circular
            } else {
                PierCrossSection::Rectangular
            }
        });

        let columns_per_pier = match pier_type {
            PierType::SingleColumn => 1,
            PierType::HammerHead => match family {
                BridgeFamily::BoxGirder => box_cell_count(girder_depth, width),
                BridgeFamily::BeamSlab => 1,
            },
            PierType::MultiColumn => ((width / MULTI_COLUMN_SPACING).round() as usize).max(2),
        };

        let mut pier_positions = Vec::with_capacity(span_count - 1);
        let mut y = -0.5 * total_length;
        for span in &span_lengths[..span_count - 1] {
            y += span;
            pier_positions.push(y);
        }

        let config = BridgeConfiguration {
            bridge_id: bridge_id.to_string(),
            family,
            span_count,
            total_length_m: total_length,
            width_m: width,
            lanes: (((width - NON_LANE_WIDTH) / LANE_WIDTH).floor() as u32).max(2),
            span_lengths_m: span_lengths,
            pier_positions_m: pier_positions,
            pier_type,
            pier_cross_section,
            columns_per_pier,
            girder_depth_m: girder_depth,
            deck_thickness_m: DECK_THICKNESS,
            pier_radius_m: PIER_RADIUS,
            clearance_height_m: CLEARANCE_HEIGHT,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Spread the total length over `count` spans with bounded variance. The last
/// span absorbs the rounding remainder so the sum is exact.
fn distribute_spans<R: Rng>(total: f64, count: usize, rng: &mut R) -> Vec<f64> {
    let weights: Vec<f64> = (0..count)
        .map(|_| 1.0 + rng.gen_range(-SPAN_VARIANCE..=SPAN_VARIANCE))
        .collect();
    let weight_sum: f64 = weights.iter().sum();
    let mut spans: Vec<f64> = weights.iter().map(|w| total * w / weight_sum).collect();
    let head: f64 = spans[..count - 1].iter().sum();
    spans[count - 1] = total - head;
    spans
}

fn check_overrides(overrides: &SamplerOverrides) -> Result<(), String> {
    if let Some(count) = overrides.span_count {
        if !(SPAN_COUNT_RANGE.0..=SPAN_COUNT_RANGE.1).contains(&count) {
            return Err(format!("span count override {count} outside 2..=5"));
        }
    }
    if let Some(length) = overrides.total_length_m {
        in_range("total length override", length, TOTAL_LENGTH_RANGE)?;
        if let Some(family) = overrides.family {
            in_range("total length override", length, family.bounds().total_length)?;
        }
    }
    if let Some(width) = overrides.width_m {
        in_range("width override", width, WIDTH_RANGE)?;
    }
    if let (Some(family), Some(count), Some(length)) = (
        overrides.family,
        overrides.span_count,
        overrides.total_length_m,
    ) {
        in_range(
            "mean span implied by overrides",
            length / count as f64,
            family.bounds().mean_span,
        )?;
    }
    Ok(())
}
