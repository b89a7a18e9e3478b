//! Contour and banner drawing.

use ab_glyph::{FontRef, PxScale};
use image::{GrayImage, Rgb, RgbImage, imageops};
use imageproc::contours::{BorderType, Contour};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use plumbline_pipeline::{AlignmentSummary, ImageAnalysis};

/// Outline color for a wall with a jump.
pub const MISALIGNED_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline color for a wall without a jump.
pub const ALIGNED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Outline width in pixels.
pub const CONTOUR_THICKNESS: u32 = 4;

const BANNER_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// DejaVu Sans Bold, see `assets/DejaVuSans-LICENSE`.
const BANNER_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// Text color for a per-image verdict.
#[must_use]
pub const fn summary_color(summary: AlignmentSummary) -> Rgb<u8> {
    match summary {
        AlignmentSummary::AllMisaligned => Rgb([255, 0, 0]),
        AlignmentSummary::OneMisaligned => Rgb([255, 165, 0]),
        AlignmentSummary::NoMisalignment => Rgb([0, 200, 0]),
    }
}

/// Draw the outer boundary of every blob in `mask` onto a copy of
/// `image`.
///
/// Hole borders and blobs nested inside holes are not drawn. Blobs
/// touching the image border are outlined along it. Each boundary pixel
/// is stamped with a `thickness`-sized square, clipped to the image.
#[must_use]
pub fn draw_mask_contour(
    image: &RgbImage,
    mask: &GrayImage,
    color: Rgb<u8>,
    thickness: u32,
) -> RgbImage {
    let mut canvas = image.clone();
    if thickness == 0 {
        return canvas;
    }

    // Border following needs a background frame around every blob.
    let mut framed = GrayImage::new(mask.width() + 2, mask.height() + 2);
    imageops::replace(&mut framed, mask, 1, 1);

    let half = to_i32(thickness / 2);
    let contours: Vec<Contour<i32>> = imageproc::contours::find_contours(&framed);
    for contour in contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
    {
        for point in &contour.points {
            let rect = Rect::at(point.x - 1 - half, point.y - 1 - half).of_size(thickness, thickness);
            draw_filled_rect_mut(&mut canvas, rect, color);
        }
    }
    canvas
}

/// Write the summary text in the bottom-left corner of a copy of
/// `image`, in [`summary_color`] on a white box.
///
/// The text scales with the image so the longest summary spans roughly
/// two thirds of its width.
#[must_use]
pub fn annotate_summary(image: &RgbImage, summary: AlignmentSummary) -> RgbImage {
    let mut annotated = image.clone();
    let (width, height) = annotated.dimensions();
    if width == 0 || height == 0 {
        return annotated;
    }
    let Ok(font) = FontRef::try_from_slice(BANNER_FONT) else {
        return annotated;
    };

    #[allow(clippy::cast_precision_loss)]
    let scale = PxScale::from(
        (width as f32 / 25.0)
            .min(height as f32 / 8.0)
            .clamp(12.0, 120.0),
    );
    let text = summary.as_str();
    let (text_width, text_height) = text_size(scale, &font, text);

    let unit = (width.min(height) / 50).max(2);
    let (margin, pad) = (to_i32(unit * 2), to_i32(unit));
    let x = margin + pad;
    let y = to_i32(height) - margin - pad - to_i32(text_height);

    let background = Rect::at(x - pad, y - pad)
        .of_size(text_width + 2 * unit, text_height + 2 * unit);
    draw_filled_rect_mut(&mut annotated, background, BANNER_BACKGROUND);
    draw_text_mut(&mut annotated, summary_color(summary), x, y, scale, &font, text);
    annotated
}

/// Full overlay for one analyzed image: every wall outlined in its
/// verdict color, then the summary banner.
#[must_use]
pub fn render_overlay(analysis: &ImageAnalysis) -> RgbImage {
    let outlined = analysis
        .walls
        .iter()
        .fold(analysis.original.clone(), |canvas, wall| {
            let color = if wall.is_misaligned() {
                MISALIGNED_COLOR
            } else {
                ALIGNED_COLOR
            };
            draw_mask_contour(&canvas, &wall.mask, color, CONTOUR_THICKNESS)
        });
    annotate_summary(&outlined, analysis.summary)
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}
