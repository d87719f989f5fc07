//! Structural dimension defaults for synthesized bridges (metres).

/// Slab thickness on top of the girders.
pub const DECK_THICKNESS: f64 = 0.3;
/// Box cell top flange thickness.
pub const BOX_TOP_FLANGE_THICKNESS: f64 = 0.25;
/// Box cell bottom flange thickness.
pub const BOX_BOTTOM_FLANGE_THICKNESS: f64 = 0.35;
/// Box cell web thickness.
pub const BOX_WEB_THICKNESS: f64 = 0.5;
/// Total cantilever length left outside the box cells across the width.
pub const BOX_CANTILEVER_ALLOWANCE: f64 = 4.0;
/// Cantilever haunch depth at the outer web.
pub const HAUNCH_INNER_DEPTH: f64 = 0.4;
/// Cantilever haunch depth at the deck edge.
pub const HAUNCH_OUTER_DEPTH: f64 = 0.2;

/// Beam-slab girder web thickness.
pub const GIRDER_THICKNESS: f64 = 0.5;
/// Target girder spacing used to pick the girder count.
pub const MIN_GIRDER_SPACING: f64 = 3.5;

/// Height from girder soffit down to ground.
pub const CLEARANCE_HEIGHT: f64 = 5.0;
/// Default column radius.
pub const PIER_RADIUS: f64 = 0.6;
/// Radius multiplier for single-column piers.
pub const SINGLE_COLUMN_RADIUS_FACTOR: f64 = 1.5;
/// Single-column cap width as a fraction of the deck width.
pub const SINGLE_COLUMN_CAP_WIDTH_FRACTION: f64 = 0.6;
/// Height of a prismatic cap beam.
pub const PRISMATIC_CAP_HEIGHT: f64 = 0.5;
/// Height of the straight upper stage of a hammer head.
pub const HAMMER_HEAD_STRAIGHT_HEIGHT: f64 = 1.0;
/// Height of the slanted lower stage of a hammer head.
pub const HAMMER_HEAD_SLANT_HEIGHT: f64 = 1.0;
/// Bottom width of a hammer head on rectangular columns.
pub const HAMMER_HEAD_RECT_LOWER_WIDTH: f64 = 1.8;
/// Hammer head extent along the bridge.
pub const HAMMER_HEAD_THICKNESS: f64 = 2.0;
/// Transverse spacing between columns of multi-column piers.
pub const MULTI_COLUMN_SPACING: f64 = 8.0;
/// Segments used to approximate circular sections.
pub const CIRCLE_SEGMENTS: usize = 24;

/// Railing post height above the deck.
pub const RAILING_POST_HEIGHT: f64 = 1.0;
/// Spacing between railing posts.
pub const RAILING_POST_SPACING: f64 = 2.5;
/// Side length of the square railing posts.
pub const RAILING_POST_SIDE: f64 = 0.07;
/// Horizontal bars per railing.
pub const RAILING_BAR_COUNT: usize = 3;

/// Approach slab length beyond each abutment.
pub const APPROACH_SLAB_LENGTH: f64 = 10.0;
/// Seat wall thickness under each deck end.
pub const BACK_WALL_THICKNESS: f64 = 2.0;
/// Closing wall thickness behind the seat.
pub const CLOSING_WALL_THICKNESS: f64 = 0.5;

/// Wing wall thickness.
pub const WING_WALL_THICKNESS: f64 = 0.5;
/// Length of each wing wall beyond the abutment face.
pub const WING_WALL_TOP_LENGTH: f64 = 4.0;
/// Fraction of the clearance height taken by the sloped wing wall cap.
pub const WING_WALL_CAP_FRACTION: f64 = 0.5;

/// Lane width used to derive lane count from deck width.
pub const LANE_WIDTH: f64 = 3.5;
/// Shoulders, strips and sidewalks across both edges.
pub const NON_LANE_WIDTH: f64 = 10.0;
