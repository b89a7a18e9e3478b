//! Batch driver: analyze a sequence of images, one at a time.
//!
//! Each input yields exactly one [`BatchItem`]. A failure (unreadable
//! bytes, an undecodable image, a segmenter error) becomes a
//! [`ItemOutcome::Skipped`] for that item only; later items are processed
//! normally. The driver is a lazy iterator, so at most one image's
//! rasters are alive at a time.

use crate::pipeline::ImageAnalysis;
use crate::segment::Segmenter;
use crate::types::{PipelineConfig, PipelineError};

/// One image to analyze.
#[derive(Debug)]
pub struct BatchInput {
    /// Display name (usually the file name).
    pub name: String,
    /// Encoded image bytes, or a description of why they could not be
    /// read.
    pub source: Result<Vec<u8>, String>,
}

impl BatchInput {
    /// Input whose bytes were read successfully.
    #[must_use]
    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: Ok(bytes),
        }
    }

    /// Input that could not be read.
    #[must_use]
    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Err(reason.into()),
        }
    }
}

/// Why an item produced no analysis.
#[derive(Debug, thiserror::Error)]
pub enum SkipReason {
    /// The caller could not read the input.
    #[error("cannot read: {0}")]
    Unreadable(String),

    /// The pipeline rejected the input.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Outcome for one input.
#[derive(Debug)]
pub enum ItemOutcome {
    /// The image was analyzed.
    Analyzed(Box<ImageAnalysis>),
    /// The image was skipped.
    Skipped(SkipReason),
}

/// Result for one input, tagged with its name.
#[derive(Debug)]
pub struct BatchItem {
    /// Name from the [`BatchInput`].
    pub name: String,
    /// What happened.
    pub outcome: ItemOutcome,
}

/// Lazy iterator returned by [`process_batch`].
pub struct Batch<'a, I, S: ?Sized> {
    inputs: I,
    segmenter: &'a mut S,
    config: &'a PipelineConfig,
}

impl<I, S> Iterator for Batch<'_, I, S>
where
    I: Iterator<Item = BatchInput>,
    S: Segmenter + ?Sized,
{
    type Item = BatchItem;

    fn next(&mut self) -> Option<Self::Item> {
        let BatchInput { name, source } = self.inputs.next()?;
        let outcome = match source {
            Err(reason) => ItemOutcome::Skipped(SkipReason::Unreadable(reason)),
            Ok(bytes) => match crate::process(&bytes, &mut *self.segmenter, self.config) {
                Ok(analysis) => ItemOutcome::Analyzed(Box::new(analysis)),
                Err(e) => ItemOutcome::Skipped(SkipReason::Pipeline(e)),
            },
        };
        Some(BatchItem { name, outcome })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inputs.size_hint()
    }
}

/// Analyze each input in order, sharing one segmenter.
///
/// Nothing runs until the returned iterator is advanced.
pub fn process_batch<'a, I, S>(
    inputs: I,
    segmenter: &'a mut S,
    config: &'a PipelineConfig,
) -> Batch<'a, I::IntoIter, S>
where
    I: IntoIterator<Item = BatchInput>,
    S: Segmenter + ?Sized,
{
    Batch {
        inputs: inputs.into_iter(),
        segmenter,
        config,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, RgbImage};

    use super::*;
    use crate::segment::{LumaThresholdSegmenter, SegmenterError};
    use crate::types::AlignmentSummary;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::new(width, height);
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

    fn config() -> PipelineConfig {
        PipelineConfig {
            tile_size: 16,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn failures_do_not_affect_other_items() {
        let inputs = vec![
            BatchInput::bytes("a.png", png(20, 20)),
            BatchInput::unreadable("b.png", "permission denied"),
            BatchInput::bytes("c.jpg", vec![0xFF, 0x00, 0x13]),
            BatchInput::bytes("d.png", Vec::new()),
            BatchInput::bytes("e.png", png(40, 10)),
        ];
        let mut segmenter = LumaThresholdSegmenter::default();
        let config = config();
        let items: Vec<BatchItem> = process_batch(inputs, &mut segmenter, &config).collect();

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.jpg", "d.png", "e.png"]);

        assert!(matches!(
            &items[0].outcome,
            ItemOutcome::Analyzed(a) if a.summary == AlignmentSummary::NoMisalignment
        ));
        assert!(matches!(
            &items[1].outcome,
            ItemOutcome::Skipped(SkipReason::Unreadable(r)) if r == "permission denied"
        ));
        assert!(matches!(
            &items[2].outcome,
            ItemOutcome::Skipped(SkipReason::Pipeline(PipelineError::ImageDecode(_)))
        ));
        assert!(matches!(
            &items[3].outcome,
            ItemOutcome::Skipped(SkipReason::Pipeline(PipelineError::EmptyInput))
        ));
        assert!(matches!(&items[4].outcome, ItemOutcome::Analyzed(a) if a.tile_count == 3));
    }

    #[test]
    fn segmenter_error_skips_only_that_item() {
        let mut calls = 0;
        // Fails on every tile of the first image only (it has one tile).
        let mut segmenter = |tile: &RgbImage| -> Result<Vec<GrayImage>, SegmenterError> {
            calls += 1;
            if calls == 1 {
                Err(SegmenterError("device lost".to_string()))
            } else {
                Ok(vec![GrayImage::new(tile.width(), tile.height())])
            }
        };
        let inputs = [
            BatchInput::bytes("first.png", png(8, 8)),
            BatchInput::bytes("second.png", png(8, 8)),
        ];
        let config = config();
        let items: Vec<BatchItem> = process_batch(inputs, &mut segmenter, &config).collect();
        assert!(matches!(
            items[0].outcome,
            ItemOutcome::Skipped(SkipReason::Pipeline(PipelineError::Segmentation(_)))
        ));
        assert!(matches!(items[1].outcome, ItemOutcome::Analyzed(_)));
    }

    #[test]
    fn skip_reason_display() {
        let unreadable = SkipReason::Unreadable("no such file".to_string());
        assert_eq!(unreadable.to_string(), "cannot read: no such file");
        let pipeline = SkipReason::Pipeline(PipelineError::EmptyInput);
        assert_eq!(pipeline.to_string(), "input image data is empty");
    }
}
