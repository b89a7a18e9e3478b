//! plumbline-overlay: annotated result images (sans-IO).
//!
//! Draws each wall's outline over the source photo, red when the wall
//! is misaligned and green when it is not, plus the summary text
//! in the bottom-left corner. Encoders return bytes; writing them out is
//! left to the caller.

pub mod draw;
pub mod encode;

pub use draw::{
    ALIGNED_COLOR, CONTOUR_THICKNESS, MISALIGNED_COLOR, annotate_summary, draw_mask_contour,
    render_overlay, summary_color,
};
pub use encode::{JPEG_QUALITY, OverlayError, encode_jpeg, encode_png};
