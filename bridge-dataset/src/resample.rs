//! Fixed-cardinality resampling and feature extraction.

use std::collections::BTreeMap;

use constants::dataset::FEATURES_PER_POINT;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::error::SegmentationError;
use crate::segmentation::LabeledPoint;

/// How the feature array rows were drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Per-class quotas preserving label proportions.
    Stratified,
    /// Uniform draw without replacement.
    Uniform,
    /// Every point once, padded with replacement.
    Padded,
}

/// Row indices chosen for the feature array.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Indices into the labelled cloud, ascending.
    pub indices: Vec<usize>,
    /// Strategy that produced `indices`.
    pub strategy: SamplingStrategy,
}

impl Selection {
    /// True when the cloud was smaller than the target and had to be padded.
    pub fn undersampled(&self) -> bool {
        self.strategy == SamplingStrategy::Padded
    }
}

/// Choose exactly `target` point indices from a cloud with the given labels.
pub fn select<R: Rng>(
    labels: &[u8],
    target: usize,
    min_per_class: usize,
    rng: &mut R,
) -> Result<Selection, SegmentationError> {
    let n = labels.len();
    if n == 0 {
        return Err(SegmentationError::EmptyPointCloud);
    }

    if n < target {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.extend((0..target - n).map(|_| rng.gen_range(0..n)));
        indices.sort_unstable();
        return Ok(Selection {
            indices,
            strategy: SamplingStrategy::Padded,
        });
    }

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        by_class.entry(*label).or_default().push(i);
    }

    let selection = match stratified_quotas(&by_class, n, target, min_per_class) {
        Some(quotas) => {
            let mut indices = Vec::with_capacity(target);
            for ((_, members), quota) in by_class.iter().zip(quotas) {
                indices.extend(
                    index::sample(rng, members.len(), quota)
                        .into_iter()
                        .map(|i| members[i]),
                );
            }
            indices.sort_unstable();
            Selection {
                indices,
                strategy: SamplingStrategy::Stratified,
            }
        }
        None => {
            let mut indices = index::sample(rng, n, target).into_vec();
            indices.sort_unstable();
            Selection {
                indices,
                strategy: SamplingStrategy::Uniform,
            }
        }
    };
    Ok(selection)
}

/// Largest-remainder quotas proportional to class size, in class order. A
/// non-zero `min_per_class` is reserved for every class before the split.
/// `None` when some class cannot fill its quota.
fn stratified_quotas(
    by_class: &BTreeMap<u8, Vec<usize>>,
    total: usize,
    target: usize,
    min_per_class: usize,
) -> Option<Vec<usize>> {
    let reserved = min_per_class.checked_mul(by_class.len())?;
    let remaining = target.checked_sub(reserved)?;

    let mut quotas = Vec::with_capacity(by_class.len());
    let mut remainders = Vec::with_capacity(by_class.len());
    for (slot, members) in by_class.values().enumerate() {
        let exact = remaining as f64 * members.len() as f64 / total as f64;
        quotas.push(min_per_class + exact.floor() as usize);
        remainders.push((exact - exact.floor(), slot));
    }

    let assigned: usize = quotas.iter().sum();
    // Largest fractional parts first, earlier classes on ties
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, slot) in remainders.into_iter().take(target - assigned) {
        quotas[slot] += 1;
    }

    let fits = by_class
        .values()
        .zip(&quotas)
        .all(|(members, quota)| *quota <= members.len());
    fits.then_some(quotas)
}

/// Row-major `[x, y, z, intensity, label]` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureArray {
    /// One row per selected point.
    pub rows: Vec<[f32; FEATURES_PER_POINT]>,
    /// Subtracted from positions before scaling.
    pub centroid: [f64; 3],
    /// Positions are divided by this after centring.
    pub scale: f64,
}

impl FeatureArray {
    /// Gather `indices` into rows. With `normalize`, positions are centred on the
    /// selection centroid and scaled into the unit sphere.
    pub fn from_selection(points: &[LabeledPoint], indices: &[usize], normalize: bool) -> Self {
        let (centroid, scale) = if normalize && !indices.is_empty() {
            let mut sum = [0.0f64; 3];
            for &i in indices {
                let p = points[i].point.position;
                sum[0] += p.x;
                sum[1] += p.y;
                sum[2] += p.z;
            }
            let count = indices.len() as f64;
            let centroid = [sum[0] / count, sum[1] / count, sum[2] / count];
            let radius = indices
                .iter()
                .map(|&i| {
                    let p = points[i].point.position;
                    let (dx, dy, dz) = (p.x - centroid[0], p.y - centroid[1], p.z - centroid[2]);
                    (dx * dx + dy * dy + dz * dz).sqrt()
                })
                .fold(0.0f64, f64::max);
            (centroid, if radius > 0.0 { radius } else { 1.0 })
        } else {
            ([0.0; 3], 1.0)
        };

        let rows = indices
            .iter()
            .map(|&i| {
                let labeled = &points[i];
                let p = labeled.point.position;
                [
                    ((p.x - centroid[0]) / scale) as f32,
                    ((p.y - centroid[1]) / scale) as f32,
                    ((p.z - centroid[2]) / scale) as f32,
                    labeled.point.intensity,
                    f32::from(labeled.label),
                ]
            })
            .collect();

        Self {
            rows,
            centroid,
            scale,
        }
    }

    /// Rows and columns.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), FEATURES_PER_POINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::RawScanPoint;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn labels(counts: &[(u8, usize)]) -> Vec<u8> {
        counts
            .iter()
            .flat_map(|(label, count)| std::iter::repeat(*label).take(*count))
            .collect()
    }

    fn histogram(labels: &[u8], indices: &[usize]) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for &i in indices {
            *counts.entry(labels[i]).or_insert(0) += 1;
        }
        counts
    }

    fn assert_proportional(labels: &[u8], selection: &Selection, target: usize) {
        let mut totals: BTreeMap<u8, usize> = BTreeMap::new();
        for label in labels {
            *totals.entry(*label).or_insert(0) += 1;
        }
        let drawn = histogram(labels, &selection.indices);
        for (label, total) in totals {
            let share = target as f64 * total as f64 / labels.len() as f64;
            let got = drawn.get(&label).copied().unwrap_or(0) as f64;
            assert!(
                (got - share).abs() <= 1.0,
                "class {label}: drew {got}, proportional share {share:.2}"
            );
        }
    }

    #[test]
    fn stratified_draw_preserves_proportions() {
        let labels = labels(&[(0, 6000), (1, 3000), (2, 1000)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let selection = select(&labels, 1000, 0, &mut rng).unwrap();
        assert_eq!(selection.strategy, SamplingStrategy::Stratified);
        assert_eq!(selection.indices.len(), 1000);
        assert!(selection.indices.windows(2).all(|w| w[0] < w[1]));
        let counts = histogram(&labels, &selection.indices);
        assert_eq!(counts[&0], 600);
        assert_eq!(counts[&1], 300);
        assert_eq!(counts[&2], 100);
    }

    #[test]
    fn rare_classes_keep_their_share() {
        let labels = labels(&[(0, 12000), (1, 9000), (2, 4000), (3, 2000), (4, 1000), (5, 30)]);
        let selection = select(&labels, 8192, 0, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(selection.strategy, SamplingStrategy::Stratified);
        assert_eq!(selection.indices.len(), 8192);
        assert_proportional(&labels, &selection, 8192);
    }

    #[test]
    fn tiny_class_does_not_force_uniform() {
        let labels = labels(&[(0, 100_000), (255, 5)]);
        let selection = select(&labels, 8192, 0, &mut ChaCha8Rng::seed_from_u64(6)).unwrap();
        assert_eq!(selection.strategy, SamplingStrategy::Stratified);
        assert_proportional(&labels, &selection, 8192);
    }

    #[test]
    fn minimum_quota_is_opt_in() {
        let labels = labels(&[(0, 9990), (5, 20)]);
        let selection = select(&labels, 100, 16, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        let counts = histogram(&labels, &selection.indices);
        assert_eq!(counts[&5], 16);
        assert_eq!(counts[&0], 84);
    }

    #[test]
    fn unmet_minimum_falls_back_to_uniform() {
        let labels = labels(&[(0, 500), (1, 8)]);
        let selection = select(&labels, 400, 16, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        assert_eq!(selection.strategy, SamplingStrategy::Uniform);
        assert_eq!(selection.indices.len(), 400);
        let mut unique = selection.indices.clone();
        unique.dedup();
        assert_eq!(unique.len(), 400);
    }

    #[test]
    fn small_cloud_is_padded() {
        let labels = labels(&[(0, 30)]);
        let selection = select(&labels, 64, 16, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        assert!(selection.undersampled());
        assert_eq!(selection.indices.len(), 64);
        for i in 0..30 {
            assert!(selection.indices.contains(&i));
        }
    }

    #[test]
    fn empty_cloud_is_an_error() {
        assert!(matches!(
            select(&[], 64, 16, &mut ChaCha8Rng::seed_from_u64(0)),
            Err(SegmentationError::EmptyPointCloud)
        ));
    }

    #[test]
    fn same_seed_same_selection() {
        let labels = labels(&[(0, 5000), (3, 4000), (255, 50)]);
        let a = select(&labels, 2048, 0, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
        let b = select(&labels, 2048, 0, &mut ChaCha8Rng::seed_from_u64(77)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn features_are_centred_and_scaled() {
        let points: Vec<LabeledPoint> = [(-2.0, 0.0), (2.0, 0.0), (0.0, 1.0)]
            .iter()
            .map(|(x, y)| LabeledPoint {
                point: RawScanPoint {
                    position: Point3::new(*x, *y + 10.0, 5.0),
                    intensity: 7.0,
                    leg: 0,
                },
                label: 2,
            })
            .collect();
        let features = FeatureArray::from_selection(&points, &[0, 1], true);
        assert_eq!(features.shape(), (2, 5));
        assert_eq!(features.centroid, [0.0, 10.0, 5.0]);
        assert_eq!(features.scale, 2.0);
        assert_eq!(features.rows[0], [-1.0, 0.0, 0.0, 7.0, 2.0]);

        let raw = FeatureArray::from_selection(&points, &[2], false);
        assert_eq!(raw.rows[0], [0.0, 11.0, 5.0, 7.0, 2.0]);
    }
}
