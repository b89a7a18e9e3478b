//! Shared types for the plumbline pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::SegmenterError;

/// Re-export `GrayImage` so downstream crates can reference masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// decoded source image without depending on `image` directly.
pub use image::RgbImage;

/// Pixel value marking a foreground pixel in every mask the pipeline
/// produces. Inputs treat any nonzero value as foreground.
pub const FOREGROUND: u8 = 1;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of<I: image::GenericImageView>(image: &I) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for the misalignment pipeline.
///
/// Every field is overridable per run. Missing fields in a serialized
/// config fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Side length of the square tiles fed to the segmenter. Must match
    /// the model's expected input resolution.
    pub tile_size: u32,

    /// Number of walls (k-means groups) the merged mask is split into.
    pub wall_count: usize,

    /// Largest tolerated change in mean x between consecutive sampled
    /// strips, in pixels. Anything strictly greater is a jump.
    pub jump_threshold: f64,

    /// Height of each horizontal sampling strip in pixels.
    pub strip_height: u32,

    /// Minimum foreground pixels a strip needs to be sampled.
    pub min_strip_points: usize,
}

impl PipelineConfig {
    pub const DEFAULT_TILE_SIZE: u32 = 1024;
    pub const DEFAULT_WALL_COUNT: usize = 2;
    pub const DEFAULT_JUMP_THRESHOLD: f64 = 45.0;
    pub const DEFAULT_STRIP_HEIGHT: u32 = 5;
    pub const DEFAULT_MIN_STRIP_POINTS: usize = 5;

    /// Check the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.tile_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "tile_size must be positive".to_string(),
            ));
        }
        if self.wall_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "wall_count must be positive".to_string(),
            ));
        }
        if !self.jump_threshold.is_finite() || self.jump_threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "jump_threshold must be finite and non-negative, got {}",
                self.jump_threshold
            )));
        }
        if self.strip_height == 0 {
            return Err(PipelineError::InvalidConfig(
                "strip_height must be positive".to_string(),
            ));
        }
        if self.min_strip_points == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_strip_points must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_size: Self::DEFAULT_TILE_SIZE,
            wall_count: Self::DEFAULT_WALL_COUNT,
            jump_threshold: Self::DEFAULT_JUMP_THRESHOLD,
            strip_height: Self::DEFAULT_STRIP_HEIGHT,
            min_strip_points: Self::DEFAULT_MIN_STRIP_POINTS,
        }
    }
}

/// Per-image verdict derived from the per-wall verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentSummary {
    /// No wall shows a jump.
    NoMisalignment,
    /// Some, but not all, walls show a jump.
    OneMisaligned,
    /// Every wall shows a jump.
    AllMisaligned,
}

impl AlignmentSummary {
    /// Fold per-wall verdicts (`true` = misaligned) into a summary.
    ///
    /// An empty verdict list carries no evidence and is
    /// [`NoMisalignment`](Self::NoMisalignment).
    #[must_use]
    pub fn from_verdicts(verdicts: &[bool]) -> Self {
        let misaligned = verdicts.iter().filter(|&&v| v).count();
        if misaligned == 0 {
            Self::NoMisalignment
        } else if misaligned == verdicts.len() {
            Self::AllMisaligned
        } else {
            Self::OneMisaligned
        }
    }

    /// Human-readable summary line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMisalignment => "No misalignment detected",
            Self::OneMisaligned => "One wall misaligned",
            Self::AllMisaligned => "Both walls misaligned",
        }
    }
}

impl fmt::Display for AlignmentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while analyzing one image.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has a zero-length axis.
    #[error("image has no pixels")]
    EmptyImage,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The segmenter failed on a tile.
    #[error(transparent)]
    Segmentation(#[from] SegmenterError),

    /// The segmenter returned a mask that does not match the tile size.
    #[error("segmenter returned a {actual} mask for a {expected} tile")]
    MaskDimensions {
        /// Tile dimensions.
        expected: Dimensions,
        /// Mask dimensions actually returned.
        actual: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.tile_size, 1024);
        assert_eq!(config.wall_count, 2);
        assert!((config.jump_threshold - 45.0).abs() < f64::EPSILON);
        assert_eq!(config.strip_height, 5);
        assert_eq!(config.min_strip_points, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_tile_size() {
        let config = PipelineConfig {
            tile_size: 0,
            ..PipelineConfig::default()
        };
        assert!(
            matches!(config.validate(), Err(PipelineError::InvalidConfig(ref s)) if s.contains("tile_size"))
        );
    }

    #[test]
    fn validate_rejects_zero_wall_count() {
        let config = PipelineConfig {
            wall_count: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        for jump_threshold in [-1.0, f64::NAN, f64::INFINITY] {
            let config = PipelineConfig {
                jump_threshold,
                ..PipelineConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {jump_threshold}");
        }
    }

    #[test]
    fn validate_rejects_zero_strip_parameters() {
        let zero_height = PipelineConfig {
            strip_height: 0,
            ..PipelineConfig::default()
        };
        let zero_points = PipelineConfig {
            min_strip_points: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_height.validate().is_err());
        assert!(zero_points.validate().is_err());
    }

    #[test]
    fn partial_json_config_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"tile_size": 640, "jump_threshold": 30.0}"#).unwrap();
        assert_eq!(config.tile_size, 640);
        assert!((config.jump_threshold - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.wall_count, PipelineConfig::DEFAULT_WALL_COUNT);
        assert_eq!(config.strip_height, PipelineConfig::DEFAULT_STRIP_HEIGHT);
    }

    #[test]
    fn summary_from_verdicts() {
        assert_eq!(
            AlignmentSummary::from_verdicts(&[false, false]),
            AlignmentSummary::NoMisalignment
        );
        assert_eq!(
            AlignmentSummary::from_verdicts(&[true, false]),
            AlignmentSummary::OneMisaligned
        );
        assert_eq!(
            AlignmentSummary::from_verdicts(&[false, true]),
            AlignmentSummary::OneMisaligned
        );
        assert_eq!(
            AlignmentSummary::from_verdicts(&[true, true]),
            AlignmentSummary::AllMisaligned
        );
    }

    #[test]
    fn summary_single_verdict_is_all_or_none() {
        assert_eq!(
            AlignmentSummary::from_verdicts(&[true]),
            AlignmentSummary::AllMisaligned
        );
        assert_eq!(
            AlignmentSummary::from_verdicts(&[false]),
            AlignmentSummary::NoMisalignment
        );
    }

    #[test]
    fn summary_of_no_verdicts_is_no_misalignment() {
        assert_eq!(
            AlignmentSummary::from_verdicts(&[]),
            AlignmentSummary::NoMisalignment
        );
    }

    #[test]
    fn summary_display() {
        assert_eq!(
            AlignmentSummary::AllMisaligned.to_string(),
            "Both walls misaligned"
        );
        assert_eq!(
            AlignmentSummary::OneMisaligned.to_string(),
            "One wall misaligned"
        );
        assert_eq!(
            AlignmentSummary::NoMisalignment.to_string(),
            "No misalignment detected"
        );
    }

    #[test]
    fn error_mask_dimensions_display() {
        let err = PipelineError::MaskDimensions {
            expected: Dimensions {
                width: 1024,
                height: 1024,
            },
            actual: Dimensions {
                width: 640,
                height: 640,
            },
        };
        assert_eq!(
            err.to_string(),
            "segmenter returned a 640x640 mask for a 1024x1024 tile"
        );
    }

    #[test]
    fn dimensions_is_empty() {
        assert!(Dimensions { width: 0, height: 5 }.is_empty());
        assert!(!Dimensions { width: 1, height: 1 }.is_empty());
    }
}
