//! Incremental pipeline: advance stage by stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use plumbline_pipeline::{LumaThresholdSegmenter, Pipeline, PipelineConfig, PipelineError, RgbImage};
//! # fn run(image: RgbImage) -> Result<(), PipelineError> {
//! let mut segmenter = LumaThresholdSegmenter::default();
//! let analysis = Pipeline::new(image, PipelineConfig::default())
//!     .tile()?
//!     .segment(&mut segmenter)?
//!     .reconstruct()
//!     .split()
//!     .analyze();
//!
//! println!("{}", analysis.summary);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state (or a
//! `Result` for fallible stages). Image tiles are dropped once every
//! tile has been segmented, and tile masks once the full mask is
//! reconstructed; only the source image and the masks needed for the
//! overlay survive into [`ImageAnalysis`].

use image::Rgb;

use crate::alignment::{self, AlignmentReport};
use crate::cluster;
use crate::segment::{Segmenter, merge_instance_masks};
use crate::tiling::{self, TileOrigin, TiledImage};
use crate::types::{AlignmentSummary, Dimensions, GrayImage, PipelineConfig, PipelineError, RgbImage};

/// Entry point for the staged pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline run over an already decoded image.
    pub fn new(image: RgbImage, config: PipelineConfig) -> Pending {
        Pending { config, image }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .tile() to continue"]
pub struct Pending {
    config: PipelineConfig,
    image: RgbImage,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Validate the config and cut the image into tiles.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the config is out of
    /// range, or [`PipelineError::EmptyImage`] if the image has no
    /// pixels.
    pub fn tile(self) -> Result<Tiled, PipelineError> {
        self.config.validate()?;
        if Dimensions::of(&self.image).is_empty() {
            return Err(PipelineError::EmptyImage);
        }

        let tiled = tiling::tile_image(&self.image, self.config.tile_size);
        tracing::debug!(
            dimensions = %tiled.dimensions(),
            tile_size = self.config.tile_size,
            tiles = tiled.len(),
            "tiled image",
        );
        Ok(Tiled {
            config: self.config,
            image: self.image,
            tiled,
        })
    }
}

// ───────────────────────── Stage 1: Tiled ───────────────────────────

/// Pipeline state after tiling.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Tiled {
    config: PipelineConfig,
    image: RgbImage,
    tiled: TiledImage<Rgb<u8>>,
}

impl Tiled {
    /// The tiles, in traversal order.
    #[must_use]
    pub const fn tiles(&self) -> &TiledImage<Rgb<u8>> {
        &self.tiled
    }

    /// Run the segmenter on every tile, in traversal order, and merge
    /// each tile's instance masks into one binary tile mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Segmentation`] if the segmenter fails on
    /// any tile, or [`PipelineError::MaskDimensions`] if it returns a
    /// mask that is not tile sized.
    pub fn segment<S>(self, segmenter: &mut S) -> Result<Segmented, PipelineError>
    where
        S: Segmenter + ?Sized,
    {
        let dimensions = self.tiled.dimensions();
        let tile_size = self.tiled.tile_size();
        let mut tile_masks = Vec::with_capacity(self.tiled.len());

        for tile in self.tiled.into_tiles() {
            let instances = segmenter.infer(&tile.image)?;
            let mask = merge_instance_masks(&instances, tile_size)?;
            tracing::trace!(
                x = tile.origin.x,
                y = tile.origin.y,
                instances = instances.len(),
                "segmented tile",
            );
            tile_masks.push((tile.origin, mask));
        }

        Ok(Segmented {
            config: self.config,
            image: self.image,
            dimensions,
            tile_size,
            tile_masks,
        })
    }
}

// ───────────────────────── Stage 2: Segmented ───────────────────────

/// Pipeline state after every tile has been segmented.
#[must_use = "pipeline stages are consumed by advancing; call .reconstruct() to continue"]
pub struct Segmented {
    config: PipelineConfig,
    image: RgbImage,
    dimensions: Dimensions,
    tile_size: u32,
    tile_masks: Vec<(TileOrigin, GrayImage)>,
}

impl Segmented {
    /// Binary tile masks paired with their tile origins.
    #[must_use]
    pub fn tile_masks(&self) -> &[(TileOrigin, GrayImage)] {
        &self.tile_masks
    }

    /// Stitch the tile masks into a full-resolution mask.
    pub fn reconstruct(self) -> Reconstructed {
        let full_mask = tiling::untile_mask(
            self.tile_masks.iter().map(|(origin, mask)| (*origin, mask)),
            self.dimensions,
            self.tile_size,
        );
        let foreground = full_mask.pixels().filter(|p| p.0[0] != 0).count();
        tracing::debug!(foreground, "reconstructed full mask");

        Reconstructed {
            config: self.config,
            image: self.image,
            tile_count: self.tile_masks.len(),
            full_mask,
        }
    }
}

// ───────────────────────── Stage 3: Reconstructed ───────────────────

/// Pipeline state holding the full-resolution wall mask.
#[must_use = "pipeline stages are consumed by advancing; call .split() to continue"]
pub struct Reconstructed {
    config: PipelineConfig,
    image: RgbImage,
    tile_count: usize,
    full_mask: GrayImage,
}

impl Reconstructed {
    /// The merged mask of every wall.
    #[must_use]
    pub const fn full_mask(&self) -> &GrayImage {
        &self.full_mask
    }

    /// Split the full mask into one mask per wall.
    pub fn split(self) -> Split {
        let walls = cluster::split_mask_by_x(&self.full_mask, self.config.wall_count);
        Split {
            config: self.config,
            image: self.image,
            tile_count: self.tile_count,
            full_mask: self.full_mask,
            walls,
        }
    }
}

// ───────────────────────── Stage 4: Split ───────────────────────────

/// Pipeline state holding one mask per wall.
#[must_use = "pipeline stages are consumed by advancing; call .analyze() to continue"]
pub struct Split {
    config: PipelineConfig,
    image: RgbImage,
    tile_count: usize,
    full_mask: GrayImage,
    walls: Vec<GrayImage>,
}

impl Split {
    /// Per-wall masks, left to right.
    #[must_use]
    pub fn walls(&self) -> &[GrayImage] {
        &self.walls
    }

    /// Check every wall for a horizontal jump and summarize.
    pub fn analyze(self) -> ImageAnalysis {
        let config = &self.config;
        let walls: Vec<WallAnalysis> = self
            .walls
            .into_iter()
            .map(|mask| {
                let report = alignment::analyze(
                    &mask,
                    config.jump_threshold,
                    config.strip_height,
                    config.min_strip_points,
                );
                WallAnalysis { mask, report }
            })
            .collect();

        let verdicts: Vec<bool> = walls.iter().map(WallAnalysis::is_misaligned).collect();
        let summary = AlignmentSummary::from_verdicts(&verdicts);
        tracing::debug!(?verdicts, %summary, "analyzed walls");

        ImageAnalysis {
            dimensions: Dimensions::of(&self.image),
            original: self.image,
            tile_count: self.tile_count,
            full_mask: self.full_mask,
            walls,
            summary,
        }
    }
}

// ───────────────────────── Result ───────────────────────────────────

/// One wall's mask and its alignment report.
#[derive(Debug, Clone)]
pub struct WallAnalysis {
    /// Binary mask of this wall.
    pub mask: GrayImage,
    /// Samples and the first jump, if any.
    pub report: AlignmentReport,
}

impl WallAnalysis {
    /// Returns `true` if the wall shows a jump.
    #[must_use]
    pub const fn is_misaligned(&self) -> bool {
        self.report.is_misaligned()
    }

    /// Number of foreground pixels in the wall mask.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] != 0).count()
    }
}

/// Everything the pipeline produced for one image.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    /// The decoded source image.
    pub original: RgbImage,
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Number of tiles the image was cut into.
    pub tile_count: usize,
    /// Merged mask of all walls.
    pub full_mask: GrayImage,
    /// Per-wall masks and reports, left to right.
    pub walls: Vec<WallAnalysis>,
    /// Per-image verdict.
    pub summary: AlignmentSummary,
}

impl ImageAnalysis {
    /// Per-wall verdicts (`true` = misaligned), left to right.
    #[must_use]
    pub fn verdicts(&self) -> Vec<bool> {
        self.walls.iter().map(WallAnalysis::is_misaligned).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::segment::SegmenterError;
    use crate::types::FOREGROUND;

    fn small_config(tile_size: u32) -> PipelineConfig {
        PipelineConfig {
            tile_size,
            ..PipelineConfig::default()
        }
    }

    fn empty_segmenter(tile: &RgbImage) -> Result<Vec<GrayImage>, SegmenterError> {
        Ok(vec![GrayImage::new(tile.width(), tile.height())])
    }

    #[test]
    fn tile_rejects_invalid_config() {
        let result = Pipeline::new(RgbImage::new(4, 4), small_config(0)).tile();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn tile_rejects_empty_image() {
        let result = Pipeline::new(RgbImage::new(0, 4), small_config(8)).tile();
        assert!(matches!(result, Err(PipelineError::EmptyImage)));
    }

    #[test]
    fn tiles_are_segmented_in_traversal_order() {
        let mut seen = Vec::new();
        let mut segmenter = |tile: &RgbImage| -> Result<Vec<GrayImage>, SegmenterError> {
            seen.push(tile.get_pixel(0, 0).0[0]);
            Ok(Vec::new())
        };
        // Tag each tile's top-left pixel with its traversal index.
        let image = RgbImage::from_fn(30, 20, |x, y| Rgb([((y / 10) * 3 + x / 10) as u8, 0, 0]));
        let segmented = Pipeline::new(image, small_config(10))
            .tile()
            .unwrap()
            .segment(&mut segmenter)
            .unwrap();
        let origins: Vec<TileOrigin> = segmented.tile_masks().iter().map(|(o, _)| *o).collect();
        assert_eq!(origins.len(), 6);
        assert_eq!(origins[4], TileOrigin { x: 10, y: 10 });
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn segmenter_failure_is_reported() {
        let mut failing = |_: &RgbImage| -> Result<Vec<GrayImage>, SegmenterError> {
            Err(SegmenterError("out of memory".to_string()))
        };
        let result = Pipeline::new(RgbImage::new(8, 8), small_config(8))
            .tile()
            .unwrap()
            .segment(&mut failing);
        assert!(matches!(result, Err(PipelineError::Segmentation(_))));
    }

    #[test]
    fn wrong_sized_instance_mask_is_reported() {
        let mut wrong = |_: &RgbImage| -> Result<Vec<GrayImage>, SegmenterError> {
            Ok(vec![GrayImage::new(4, 4)])
        };
        let result = Pipeline::new(RgbImage::new(8, 8), small_config(8))
            .tile()
            .unwrap()
            .segment(&mut wrong);
        assert!(matches!(result, Err(PipelineError::MaskDimensions { .. })));
    }

    #[test]
    fn no_detections_is_no_misalignment() {
        let analysis = Pipeline::new(RgbImage::new(40, 30), small_config(16))
            .tile()
            .unwrap()
            .segment(&mut empty_segmenter)
            .unwrap()
            .reconstruct()
            .split()
            .analyze();
        assert_eq!(analysis.tile_count, 6);
        // Nothing to cluster: the fallback keeps one (empty) mask.
        assert_eq!(analysis.walls.len(), 1);
        assert_eq!(analysis.summary, AlignmentSummary::NoMisalignment);
    }

    #[test]
    fn detections_in_padding_are_dropped() {
        // Marks every pixel of every tile, padding included.
        let mut everything = |tile: &RgbImage| -> Result<Vec<GrayImage>, SegmenterError> {
            Ok(vec![GrayImage::from_pixel(
                tile.width(),
                tile.height(),
                Luma([FOREGROUND]),
            )])
        };
        let reconstructed = Pipeline::new(RgbImage::new(10, 6), small_config(8))
            .tile()
            .unwrap()
            .segment(&mut everything)
            .unwrap()
            .reconstruct();
        assert_eq!(reconstructed.full_mask().dimensions(), (10, 6));
        assert!(reconstructed.full_mask().pixels().all(|p| p.0[0] == FOREGROUND));
    }
}
