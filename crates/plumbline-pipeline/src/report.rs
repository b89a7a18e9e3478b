//! Serializable per-image reports.
//!
//! [`ImageAnalysis`] holds raster masks, which have no serde support and
//! are large. A report keeps the numbers a reviewer needs: per-wall pixel
//! counts, the strip samples, and the jump that triggered a verdict.

use serde::{Deserialize, Serialize};

use crate::alignment::{Jump, StripSample};
use crate::pipeline::{ImageAnalysis, WallAnalysis};
use crate::types::{AlignmentSummary, Dimensions};

/// Report for one wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallReport {
    /// Position of the wall, counted from the left.
    pub index: usize,
    /// Foreground pixels assigned to this wall.
    pub pixel_count: usize,
    /// Whether a jump was found.
    pub misaligned: bool,
    /// Recorded strip samples, top to bottom.
    pub samples: Vec<StripSample>,
    /// The first jump, if any.
    pub jump: Option<Jump>,
}

/// Report for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    /// Name of the input (usually the file name).
    pub name: String,
    /// Source image dimensions.
    pub dimensions: Dimensions,
    /// Number of tiles the image was cut into.
    pub tile_count: usize,
    /// Foreground pixels in the merged mask.
    pub foreground_pixels: usize,
    /// Per-wall reports, left to right.
    pub walls: Vec<WallReport>,
    /// Per-image verdict.
    pub summary: AlignmentSummary,
}

impl WallReport {
    fn new(index: usize, wall: &WallAnalysis) -> Self {
        Self {
            index,
            pixel_count: wall.pixel_count(),
            misaligned: wall.is_misaligned(),
            samples: wall.report.samples.clone(),
            jump: wall.report.jump,
        }
    }
}

impl ImageReport {
    /// Build a report from a finished analysis.
    #[must_use]
    pub fn new(name: impl Into<String>, analysis: &ImageAnalysis) -> Self {
        Self {
            name: name.into(),
            dimensions: analysis.dimensions,
            tile_count: analysis.tile_count,
            foreground_pixels: analysis.full_mask.pixels().filter(|p| p.0[0] != 0).count(),
            walls: analysis
                .walls
                .iter()
                .enumerate()
                .map(|(index, wall)| WallReport::new(index, wall))
                .collect(),
            summary: analysis.summary,
        }
    }
}
