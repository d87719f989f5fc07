//! Point classification against component solids and per-bridge resampling.
//!
//! A point takes the label of the first component (in labelling order) that
//! contains it within the containment tolerance. Failing that, the nearest
//! component surface within the distance threshold wins; anything further is
//! `unassigned`.

use std::collections::BTreeMap;

use constants::class::{UNASSIGNED_LABEL, get_class_name};
use constants::dataset::{
    DEFAULT_CONTAINMENT_TOLERANCE, DEFAULT_MIN_POINTS_PER_CLASS,
    DEFAULT_NEAREST_DISTANCE_THRESHOLD, TARGET_POINT_COUNT,
};
use indicatif::ProgressBar;
use nalgebra::Point3;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acquisition::RawScanPoint;
use crate::error::SegmentationError;
use crate::geometry::Component;
use crate::resample::{self, FeatureArray, SamplingStrategy};

/// Labelling tolerances and feature array settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Inclusion tolerance for containment tests, in metres.
    pub containment_tolerance: f64,
    /// Nearest-surface fallback radius, in metres.
    pub nearest_distance_threshold: f64,
    /// Rows in the feature array.
    pub target_points: usize,
    /// Quota reserved for every present class before the proportional
    /// split. 0 keeps the split purely proportional.
    pub min_points_per_class: usize,
    /// Centre on the centroid and scale into the unit sphere.
    pub normalize_positions: bool,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            containment_tolerance: DEFAULT_CONTAINMENT_TOLERANCE,
            nearest_distance_threshold: DEFAULT_NEAREST_DISTANCE_THRESHOLD,
            target_points: TARGET_POINT_COUNT,
            min_points_per_class: DEFAULT_MIN_POINTS_PER_CLASS,
            normalize_positions: true,
        }
    }
}

impl SegmentationParams {
    /// Reject non-finite or negative tolerances and an empty target.
    pub fn validate(&self) -> Result<(), SegmentationError> {
        for (name, value) in [
            ("containment_tolerance", self.containment_tolerance),
            ("nearest_distance_threshold", self.nearest_distance_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SegmentationError::InvalidParameter { name, value });
            }
        }
        if self.target_points == 0 {
            return Err(SegmentationError::InvalidParameter {
                name: "target_points",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// A raw return with its component label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledPoint {
    /// Return as the simulator reported it.
    pub point: RawScanPoint,
    /// Component label or `UNASSIGNED_LABEL`.
    pub label: u8,
}

/// Components borrowed in ascending label order, whatever order the caller
/// holds them in.
pub struct LabellingOrder<'a> {
    components: Vec<&'a Component>,
}

impl<'a> LabellingOrder<'a> {
    /// Sort `components` by label. Equal labels keep their relative order.
    pub fn new(components: &'a [Component]) -> Self {
        let mut components: Vec<&'a Component> = components.iter().collect();
        components.sort_by_key(|c| c.label());
        Self { components }
    }

    /// Label for one position: first containing component, else the nearest
    /// surface within the threshold, else `unassigned`.
    pub fn classify(&self, p: &Point3<f64>, params: &SegmentationParams) -> u8 {
        let tolerance = params.containment_tolerance;
        if let Some(component) = self
            .components
            .iter()
            .find(|c| c.envelope.contains(p, tolerance) && c.solid.contains(p, tolerance))
        {
            return component.label();
        }

        let threshold = params.nearest_distance_threshold;
        let mut nearest: Option<(f64, u8)> = None;
        for component in &self.components {
            if component.envelope.distance_to(p) > threshold {
                continue;
            }
            let distance = component.solid.distance(p);
            // Strictly closer only, so earlier components keep ties
            if distance <= threshold && nearest.is_none_or(|(best, _)| distance < best) {
                nearest = Some((distance, component.label()));
            }
        }
        nearest.map_or(UNASSIGNED_LABEL, |(_, label)| label)
    }
}

/// Label for one position. Components are ranked by label, not slice order.
pub fn classify_point(components: &[Component], p: &Point3<f64>, params: &SegmentationParams) -> u8 {
    LabellingOrder::new(components).classify(p, params)
}

/// Label every point. Order is preserved, so output is identical across runs.
pub fn classify(
    points: &[RawScanPoint],
    components: &[Component],
    params: &SegmentationParams,
    progress: &ProgressBar,
) -> Result<Vec<LabeledPoint>, SegmentationError> {
    if points.is_empty() {
        return Err(SegmentationError::EmptyPointCloud);
    }
    if components.is_empty() {
        return Err(SegmentationError::NoComponents);
    }

    let order = LabellingOrder::new(components);
    let labeled = points
        .par_chunks(4096)
        .flat_map_iter(|chunk| {
            let labeled: Vec<LabeledPoint> = chunk
                .iter()
                .map(|point| LabeledPoint {
                    point: *point,
                    label: order.classify(&point.position, params),
                })
                .collect();
            progress.inc(chunk.len() as u64);
            labeled
        })
        .collect();
    Ok(labeled)
}

/// Points per label, keyed by class name.
pub fn label_histogram(points: &[LabeledPoint]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for point in points {
        *counts.entry(point.label).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(label, count)| (get_class_name(label), count))
        .collect()
}

/// Split labelled points by label, preserving scan order within each group.
pub fn split_by_label(points: &[LabeledPoint]) -> BTreeMap<u8, Vec<LabeledPoint>> {
    let mut groups: BTreeMap<u8, Vec<LabeledPoint>> = BTreeMap::new();
    for point in points {
        groups.entry(point.label).or_default().push(*point);
    }
    groups
}

/// Share of points labelled `unassigned`, 0 for an empty cloud.
pub fn unassigned_fraction(points: &[LabeledPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let unassigned = points.iter().filter(|p| p.label == UNASSIGNED_LABEL).count();
    unassigned as f64 / points.len() as f64
}

/// Everything segmentation produces for one bridge.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    /// Every input point with its label, in input order.
    pub labeled: Vec<LabeledPoint>,
    /// Fixed-size array drawn from `labeled`.
    pub features: FeatureArray,
    /// How the array rows were selected.
    pub strategy: SamplingStrategy,
    /// Points per class name.
    pub class_counts: BTreeMap<String, usize>,
    /// Share of points that matched no component.
    pub unassigned_fraction: f64,
}

impl SegmentationOutput {
    /// True when the array had to be padded by drawing with replacement.
    pub fn undersampled(&self) -> bool {
        self.strategy == SamplingStrategy::Padded
    }
}

/// Validated labelling and resampling settings for a batch.
#[derive(Debug, Clone)]
pub struct SegmentationEngine {
    params: SegmentationParams,
}

impl SegmentationEngine {
    /// Validate `params` once for the whole batch.
    pub fn new(params: SegmentationParams) -> Result<Self, SegmentationError> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Settings the engine was built with.
    pub fn params(&self) -> &SegmentationParams {
        &self.params
    }

    /// Classify, then draw the fixed-size feature array with `rng`.
    pub fn run<R: Rng>(
        &self,
        points: &[RawScanPoint],
        components: &[Component],
        rng: &mut R,
        progress: &ProgressBar,
    ) -> Result<SegmentationOutput, SegmentationError> {
        let labeled = classify(points, components, &self.params, progress)?;
        let labels: Vec<u8> = labeled.iter().map(|p| p.label).collect();
        let selection = resample::select(
            &labels,
            self.params.target_points,
            self.params.min_points_per_class,
            rng,
        )?;
        let features = FeatureArray::from_selection(
            &labeled,
            &selection.indices,
            self.params.normalize_positions,
        );

        let output = SegmentationOutput {
            class_counts: label_histogram(&labeled),
            unassigned_fraction: unassigned_fraction(&labeled),
            strategy: selection.strategy,
            features,
            labeled,
        };
        debug!(
            points = output.labeled.len(),
            unassigned = output.unassigned_fraction,
            strategy = ?output.strategy,
            "segmented scan"
        );
        Ok(output)
    }
}
