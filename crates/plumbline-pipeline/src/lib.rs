//! plumbline-pipeline: wall misalignment detection (sans-IO).
//!
//! Finds horizontal offsets between vertically running wall sections in
//! survey photographs through:
//! decode -> tile -> segment each tile -> reconstruct the full mask ->
//! split into one mask per wall -> check each wall for jumps.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! byte slices and images and returns structured data. The segmentation
//! model is reached through the [`Segmenter`] trait; filesystem access
//! and overlay rendering live in other crates.

pub mod alignment;
pub mod batch;
pub mod cluster;
pub mod decode;
pub mod pipeline;
pub mod report;
pub mod segment;
pub mod tiling;
pub mod types;

pub use alignment::{AlignmentReport, Jump, StripSample};
pub use batch::{BatchInput, BatchItem, ItemOutcome, SkipReason, process_batch};
pub use pipeline::{ImageAnalysis, Pipeline, WallAnalysis};
pub use report::{ImageReport, WallReport};
pub use segment::{Foreground, LumaThresholdSegmenter, Segmenter, SegmenterError};
pub use tiling::{Tile, TileOrigin, TiledImage};
pub use types::{
    AlignmentSummary, Dimensions, FOREGROUND, GrayImage, PipelineConfig, PipelineError, RgbImage,
};

/// Run the full pipeline on a decoded image.
///
/// # Pipeline steps
///
/// 1. Validate the config and tile the image
/// 2. Segment each tile, in traversal order, and OR its instance masks
/// 3. Reconstruct the full-resolution mask
/// 4. Split the mask into `wall_count` groups by x position
/// 5. Check every group for a horizontal jump
/// 6. Summarize the per-wall verdicts
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an out-of-range config,
/// [`PipelineError::EmptyImage`] for an image without pixels, and
/// [`PipelineError::Segmentation`] or [`PipelineError::MaskDimensions`]
/// when the segmenter fails or misbehaves.
pub fn analyze_image<S>(
    image: RgbImage,
    segmenter: &mut S,
    config: &PipelineConfig,
) -> Result<ImageAnalysis, PipelineError>
where
    S: Segmenter + ?Sized,
{
    Ok(Pipeline::new(image, config.clone())
        .tile()?
        .segment(segmenter)?
        .reconstruct()
        .split()
        .analyze())
}

/// Decode raw image bytes and run the full pipeline.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty and
/// [`PipelineError::ImageDecode`] if the format is unrecognized, plus
/// everything [`analyze_image`] can return.
pub fn process<S>(
    image_bytes: &[u8],
    segmenter: &mut S,
    config: &PipelineConfig,
) -> Result<ImageAnalysis, PipelineError>
where
    S: Segmenter + ?Sized,
{
    let image = decode::decode_rgb(image_bytes)?;
    analyze_image(image, segmenter, config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;

    use super::*;

    /// White vertical bands on black: `(x_start, x_end, rows)` per band
    /// segment.
    fn bands(width: u32, height: u32, segments: &[(u32, u32, std::ops::Range<u32>)]) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let hit = segments
                .iter()
                .any(|(start, end, rows)| (*start..*end).contains(&x) && rows.contains(&y));
            if hit { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        })
    }

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    fn config(tile_size: u32) -> PipelineConfig {
        PipelineConfig {
            tile_size,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &mut LumaThresholdSegmenter::default(), &config(64));
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(
            &[0xFF, 0x00],
            &mut LumaThresholdSegmenter::default(),
            &config(64),
        );
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn two_straight_walls_are_aligned() {
        let image = bands(200, 120, &[(20, 30, 0..120), (150, 165, 0..120)]);
        let analysis =
            analyze_image(image, &mut LumaThresholdSegmenter::default(), &config(64)).unwrap();
        assert_eq!(analysis.walls.len(), 2);
        assert_eq!(analysis.verdicts(), vec![false, false]);
        assert_eq!(analysis.summary, AlignmentSummary::NoMisalignment);
    }

    #[test]
    fn one_offset_wall_is_reported() {
        let image = bands(
            300,
            160,
            &[(20, 30, 0..160), (180, 190, 0..80), (240, 250, 80..160)],
        );
        let analysis = process(
            &encode_png(&image),
            &mut LumaThresholdSegmenter::default(),
            &config(64),
        )
        .unwrap();
        assert_eq!(analysis.verdicts(), vec![false, true]);
        assert_eq!(analysis.summary, AlignmentSummary::OneMisaligned);
    }

    #[test]
    fn both_offset_walls_are_reported() {
        let image = bands(
            400,
            160,
            &[
                (20, 30, 0..80),
                (80, 90, 80..160),
                (280, 290, 0..80),
                (340, 350, 80..160),
            ],
        );
        let analysis =
            analyze_image(image, &mut LumaThresholdSegmenter::default(), &config(100)).unwrap();
        assert_eq!(analysis.summary, AlignmentSummary::AllMisaligned);
    }

    #[test]
    fn result_does_not_depend_on_tile_size() {
        let image = bands(
            300,
            160,
            &[(20, 30, 0..160), (180, 190, 0..80), (240, 250, 80..160)],
        );
        let reference =
            analyze_image(image.clone(), &mut LumaThresholdSegmenter::default(), &config(512))
                .unwrap();
        for tile_size in [7, 32, 100, 160] {
            let analysis = analyze_image(
                image.clone(),
                &mut LumaThresholdSegmenter::default(),
                &config(tile_size),
            )
            .unwrap();
            assert_eq!(analysis.full_mask, reference.full_mask, "tile size {tile_size}");
            assert_eq!(analysis.summary, reference.summary, "tile size {tile_size}");
        }
    }
}
