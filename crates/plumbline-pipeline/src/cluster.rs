//! Split a merged wall mask into one mask per wall.
//!
//! Walls in survey photographs run roughly vertically, so foreground
//! pixels are grouped by their x coordinate alone. A wall whose mask is
//! broken vertically (an occluded mid-span, say) stays in one group as
//! long as its columns stay apart from the other wall's.
//!
//! Clustering is k-means over the 1-D x values. Pixels sharing a column
//! share an x value, so the k-means runs over the column histogram with
//! each column weighted by its pixel count. That yields exactly the
//! clustering a per-pixel run would, at a cost proportional to the image
//! width rather than the pixel count.

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::FOREGROUND;

/// Seed for the k-means++ initialization. Fixed so identical masks
/// always split identically.
pub const KMEANS_SEED: u64 = 0;

/// Upper bound on Lloyd iterations.
pub const MAX_ITERATIONS: usize = 300;

/// Result of a 1-D k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster centers, ascending. Cluster `i` is the `i`-th from the left.
    pub centroids: Vec<f64>,
    /// Cluster index for each input value, in input order.
    pub assignments: Vec<usize>,
}

/// Split `mask` into `groups` disjoint masks by x position.
///
/// Masks are ordered left to right by cluster center. A group that ends
/// up with no pixels yields an all-zero mask.
///
/// When the mask has fewer foreground pixels than `groups` (or `groups`
/// is zero) there is nothing meaningful to cluster, and a single mask
/// identical to the input is returned instead.
#[must_use]
pub fn split_mask_by_x(mask: &GrayImage, groups: usize) -> Vec<GrayImage> {
    let histogram = column_histogram(mask);
    let foreground: u64 = histogram.iter().sum();

    if groups == 0 || foreground < groups as u64 {
        tracing::debug!(foreground, groups, "too few pixels to cluster, keeping mask whole");
        return vec![mask.clone()];
    }

    let occupied: Vec<(u32, u64)> = (0..mask.width())
        .zip(histogram.iter().copied())
        .filter(|&(_, count)| count > 0)
        .collect();
    let values: Vec<(f64, u64)> = occupied
        .iter()
        .map(|&(x, count)| (f64::from(x), count))
        .collect();
    let clustering = kmeans_1d(&values, groups, KMEANS_SEED);

    let mut column_group = vec![None; mask.width() as usize];
    for (&(x, _), &group) in occupied.iter().zip(&clustering.assignments) {
        column_group[x as usize] = Some(group);
    }

    let mut masks = vec![GrayImage::new(mask.width(), mask.height()); groups];
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        if let Some(group) = column_group[x as usize] {
            masks[group].put_pixel(x, y, Luma([FOREGROUND]));
        }
    }

    tracing::debug!(
        centroids = ?clustering.centroids,
        "split {foreground} foreground pixels into {groups} groups",
    );
    masks
}

/// Count foreground pixels in each column.
#[must_use]
pub fn column_histogram(mask: &GrayImage) -> Vec<u64> {
    let mut histogram = vec![0_u64; mask.width() as usize];
    for (x, _, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != 0 {
            histogram[x as usize] += 1;
        }
    }
    histogram
}

/// Weighted k-means over scalar values.
///
/// `values` holds `(position, weight)` pairs; a weight of `n` behaves
/// exactly like `n` copies of the position. Centers are seeded with
/// k-means++ from an RNG seeded with `seed`, then refined with Lloyd
/// iterations until assignments stop changing or [`MAX_ITERATIONS`] is
/// reached. A cluster that loses all its members keeps its previous
/// center. Clusters are renumbered so centers ascend.
///
/// Returns no centers when `values` is empty or `k` is zero.
#[must_use]
pub fn kmeans_1d(values: &[(f64, u64)], k: usize, seed: u64) -> Clustering {
    if values.is_empty() || k == 0 {
        return Clustering {
            centroids: Vec::new(),
            assignments: vec![0; values.len()],
        };
    }

    let mut centroids = kmeans_plus_plus(values, k, seed);
    let mut assignments = assign(values, &centroids);

    for _ in 0..MAX_ITERATIONS {
        update_centroids(values, &assignments, &mut centroids);
        let next = assign(values, &centroids);
        if next == assignments {
            break;
        }
        assignments = next;
    }

    // Renumber clusters left to right.
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| centroids[a].total_cmp(&centroids[b]));
    let mut rank = vec![0; k];
    for (new_index, &old_index) in order.iter().enumerate() {
        rank[old_index] = new_index;
    }

    Clustering {
        centroids: order.iter().map(|&i| centroids[i]).collect(),
        assignments: assignments.iter().map(|&a| rank[a]).collect(),
    }
}

/// k-means++ seeding: the first center is drawn proportionally to
/// weight, each further one proportionally to weight times squared
/// distance to the nearest chosen center.
#[allow(clippy::cast_precision_loss)]
fn kmeans_plus_plus(values: &[(f64, u64)], k: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = Vec::with_capacity(k);

    let weights: Vec<f64> = values.iter().map(|&(_, w)| w as f64).collect();
    let first = weighted_pick(&weights, &mut rng).unwrap_or(0);
    centroids.push(values[first].0);

    while centroids.len() < k {
        let scores: Vec<f64> = values
            .iter()
            .zip(&weights)
            .map(|(&(x, _), &w)| w * nearest_distance_sq(x, &centroids))
            .collect();
        match weighted_pick(&scores, &mut rng) {
            Some(i) => centroids.push(values[i].0),
            // Every value already sits on a center; the extra clusters
            // stay empty.
            None => centroids.push(centroids[centroids.len() - 1]),
        }
    }

    centroids
}

/// Draw an index with probability proportional to `weights[i]`.
///
/// Returns `None` if all weights are zero.
fn weighted_pick(weights: &[f64], rng: &mut StdRng) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let target = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return Some(i);
        }
    }
    weights.iter().rposition(|&w| w > 0.0)
}

fn nearest_distance_sq(x: f64, centroids: &[f64]) -> f64 {
    centroids
        .iter()
        .map(|&c| (x - c) * (x - c))
        .fold(f64::INFINITY, f64::min)
}

/// Index of the nearest center for each value. Ties go to the lower index.
fn assign(values: &[(f64, u64)], centroids: &[f64]) -> Vec<usize> {
    values
        .iter()
        .map(|&(x, _)| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, &c) in centroids.iter().enumerate() {
                let distance = (x - c).abs();
                if distance < best_distance {
                    best = i;
                    best_distance = distance;
                }
            }
            best
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn update_centroids(values: &[(f64, u64)], assignments: &[usize], centroids: &mut [f64]) {
    let mut sums = vec![0.0; centroids.len()];
    let mut weights = vec![0_u64; centroids.len()];
    for (&(x, w), &a) in values.iter().zip(assignments) {
        sums[a] += x * w as f64;
        weights[a] += w;
    }
    for (i, centroid) in centroids.iter_mut().enumerate() {
        if weights[i] > 0 {
            *centroid = sums[i] / weights[i] as f64;
        }
    }
}
