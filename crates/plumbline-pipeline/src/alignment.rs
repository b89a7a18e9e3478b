//! Horizontal misalignment detection for a single wall mask.
//!
//! The mask is cut into horizontal strips of `strip_height` rows. Every
//! strip with enough foreground pixels contributes one sample: its
//! center row and the mean x of its foreground pixels. A straight wall
//! gives a mean x that drifts smoothly from sample to sample; an offset
//! wall section shows up as a step between consecutive samples.
//!
//! Strips with too few pixels are skipped rather than treated as zero,
//! and consecutive *samples* are compared, so a gap of skipped strips is
//! spanned implicitly.
//!
//! Strips start at row 0 and stop once a strip's first row would reach
//! `height - strip_height`. Rows below that point are never sampled, so a
//! step confined to the last few rows of the mask goes unreported.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// One sampled strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StripSample {
    /// Center row of the strip (`start + strip_height / 2`).
    pub y_center: u32,
    /// Mean x of the strip's foreground pixels.
    pub mean_x: f64,
    /// Number of foreground pixels in the strip.
    pub point_count: usize,
}

/// A step in mean x between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jump {
    /// Upper sample.
    pub from: StripSample,
    /// Lower sample.
    pub to: StripSample,
    /// Signed change in mean x (`to.mean_x - from.mean_x`).
    pub dx: f64,
}

/// Samples taken from one wall mask and the first jump found, if any.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Recorded samples in increasing y order.
    pub samples: Vec<StripSample>,
    /// First pair of consecutive samples whose mean x differs by more
    /// than the threshold.
    pub jump: Option<Jump>,
}

impl AlignmentReport {
    /// Returns `true` if a jump was found.
    #[must_use]
    pub const fn is_misaligned(&self) -> bool {
        self.jump.is_some()
    }
}

/// Sample a mask strip by strip.
///
/// Returns samples for every strip holding at least `min_points`
/// foreground pixels. A `strip_height` of zero yields no samples.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_strips(mask: &GrayImage, strip_height: u32, min_points: usize) -> Vec<StripSample> {
    if strip_height == 0 {
        return Vec::new();
    }

    // Per-row foreground count and sum of x.
    let mut rows = vec![(0_usize, 0_u64); mask.height() as usize];
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != 0 {
            let row = &mut rows[y as usize];
            row.0 += 1;
            row.1 += u64::from(x);
        }
    }

    let stop = mask.height().saturating_sub(strip_height);
    (0..stop)
        .step_by(strip_height as usize)
        .filter_map(|start| {
            let strip = &rows[start as usize..(start + strip_height) as usize];
            let point_count: usize = strip.iter().map(|r| r.0).sum();
            if point_count < min_points || point_count == 0 {
                return None;
            }
            let sum_x: u64 = strip.iter().map(|r| r.1).sum();
            Some(StripSample {
                y_center: start + strip_height / 2,
                mean_x: sum_x as f64 / point_count as f64,
                point_count,
            })
        })
        .collect()
}

/// First pair of consecutive samples whose mean x differs by more than
/// `threshold`. Fewer than two samples never produce a jump.
#[must_use]
pub fn find_jump(samples: &[StripSample], threshold: f64) -> Option<Jump> {
    samples.windows(2).find_map(|pair| {
        let dx = pair[1].mean_x - pair[0].mean_x;
        (dx.abs() > threshold).then_some(Jump {
            from: pair[0],
            to: pair[1],
            dx,
        })
    })
}

/// Sample `mask` and look for a jump.
///
/// An all-zero mask has no samples and is reported aligned.
#[must_use]
pub fn analyze(
    mask: &GrayImage,
    jump_threshold: f64,
    strip_height: u32,
    min_points: usize,
) -> AlignmentReport {
    let samples = sample_strips(mask, strip_height, min_points);
    let jump = find_jump(&samples, jump_threshold);
    if let Some(jump) = &jump {
        tracing::debug!(
            from_y = jump.from.y_center,
            to_y = jump.to.y_center,
            dx = jump.dx,
            "horizontal jump exceeds {jump_threshold}px",
        );
    }
    AlignmentReport { samples, jump }
}

/// Returns `true` if `mask` shows a horizontal jump larger than
/// `jump_threshold`.
#[must_use]
pub fn has_jump(mask: &GrayImage, jump_threshold: f64, strip_height: u32, min_points: usize) -> bool {
    analyze(mask, jump_threshold, strip_height, min_points).is_misaligned()
}
