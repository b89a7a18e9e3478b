//! Segmenter boundary: turn one image tile into wall masks.
//!
//! This module defines the [`Segmenter`] trait the pipeline calls once
//! per tile, and [`merge_instance_masks`] which folds the instance masks
//! a segmenter returns into the single binary tile mask the rest of the
//! pipeline consumes.
//!
//! # Strategy pattern
//!
//! The trained model is an external collaborator. Anything that maps a
//! tile to zero or more tile-sized masks can stand in for it: a model
//! runtime wrapper, the bundled [`LumaThresholdSegmenter`], or a closure
//! returning precomputed masks in tests.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, FOREGROUND, PipelineError};

/// Failure reported by a [`Segmenter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("segmentation failed: {0}")]
pub struct SegmenterError(pub String);

/// Produces per-instance wall masks for one tile.
pub trait Segmenter {
    /// Segment a single `tile_size x tile_size` tile.
    ///
    /// Each returned mask must have the tile's dimensions. Nonzero
    /// pixels are foreground. Instance identity is not used.
    ///
    /// # Errors
    ///
    /// Returns [`SegmenterError`] if inference fails.
    fn infer(&mut self, tile: &RgbImage) -> Result<Vec<GrayImage>, SegmenterError>;
}

impl<F> Segmenter for F
where
    F: FnMut(&RgbImage) -> Result<Vec<GrayImage>, SegmenterError>,
{
    fn infer(&mut self, tile: &RgbImage) -> Result<Vec<GrayImage>, SegmenterError> {
        self(tile)
    }
}

/// Which side of the luma threshold counts as wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Foreground {
    /// Pixels strictly brighter than the threshold.
    #[default]
    Bright,
    /// Pixels strictly darker than the threshold.
    Dark,
}

/// Threshold segmenter: marks pixels by luminance.
///
/// A stand-in for a trained model on high-contrast inputs (and for
/// synthetic test scenes). Always returns a single instance mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LumaThresholdSegmenter {
    /// Luma cut-off in `0..=255`.
    pub threshold: u8,
    /// Which side of the cut-off is foreground.
    pub foreground: Foreground,
}

impl LumaThresholdSegmenter {
    pub const DEFAULT_THRESHOLD: u8 = 128;

    /// Create a segmenter with the given threshold and polarity.
    #[must_use]
    pub const fn new(threshold: u8, foreground: Foreground) -> Self {
        Self {
            threshold,
            foreground,
        }
    }
}

impl Default for LumaThresholdSegmenter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Foreground::default())
    }
}

impl Segmenter for LumaThresholdSegmenter {
    fn infer(&mut self, tile: &RgbImage) -> Result<Vec<GrayImage>, SegmenterError> {
        let luma = image::imageops::grayscale(tile);
        let threshold = self.threshold;
        let foreground = self.foreground;
        let mask = GrayImage::from_fn(luma.width(), luma.height(), |x, y| {
            let value = luma.get_pixel(x, y).0[0];
            let hit = match foreground {
                Foreground::Bright => value > threshold,
                Foreground::Dark => value < threshold,
            };
            Luma([if hit { FOREGROUND } else { 0 }])
        });
        Ok(vec![mask])
    }
}

/// Merge instance masks into one binary tile mask by logical OR.
///
/// The result is `tile_size x tile_size` with values 0 and
/// [`FOREGROUND`]. No instances gives an all-zero mask.
///
/// # Errors
///
/// Returns [`PipelineError::MaskDimensions`] if any instance mask is not
/// `tile_size x tile_size`.
pub fn merge_instance_masks(
    instances: &[GrayImage],
    tile_size: u32,
) -> Result<GrayImage, PipelineError> {
    let expected = Dimensions {
        width: tile_size,
        height: tile_size,
    };
    let mut merged = GrayImage::new(tile_size, tile_size);

    for instance in instances {
        let actual = Dimensions::of(instance);
        if actual != expected {
            return Err(PipelineError::MaskDimensions { expected, actual });
        }
        for (target, source) in merged.pixels_mut().zip(instance.pixels()) {
            if source.0[0] != 0 {
                target.0[0] = FOREGROUND;
            }
        }
    }

    Ok(merged)
}
