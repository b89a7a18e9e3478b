//! Tiling and mask reconstruction.
//!
//! The segmenter only accepts square inputs of a fixed size, so images
//! are cut into a regular grid of tiles before inference and the
//! per-tile masks are stitched back into one full-resolution mask.
//!
//! Tiles are laid out row-major with step `tile_size` on both axes.
//! Tiles that overhang the right or bottom edge are zero padded; the
//! reconstructor crops every mask back to its tile's unpadded extent, so
//! anything the segmenter reports inside the padding is discarded.

use image::{GrayImage, ImageBuffer, Pixel, imageops};
use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// Top-left corner of a tile in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileOrigin {
    /// Column of the tile's left edge.
    pub x: u32,
    /// Row of the tile's top edge.
    pub y: u32,
}

/// One fixed-size tile and where it came from.
#[derive(Clone)]
pub struct Tile<P: Pixel> {
    /// Position of the tile's top-left pixel in the source image.
    pub origin: TileOrigin,
    /// The `tile_size x tile_size` pixel data, zero padded at edges.
    pub image: ImageBuffer<P, Vec<P::Subpixel>>,
}

/// An image cut into tiles, in traversal order.
#[derive(Clone)]
pub struct TiledImage<P: Pixel> {
    tiles: Vec<Tile<P>>,
    dimensions: Dimensions,
    tile_size: u32,
}

impl<P: Pixel> TiledImage<P> {
    /// Tiles in row-major traversal order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile<P>] {
        &self.tiles
    }

    /// Consume the tiling and return the tiles.
    #[must_use]
    pub fn into_tiles(self) -> Vec<Tile<P>> {
        self.tiles
    }

    /// Tile origins in traversal order.
    pub fn origins(&self) -> impl Iterator<Item = TileOrigin> + '_ {
        self.tiles.iter().map(|t| t.origin)
    }

    /// Dimensions of the source image.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Side length of every tile.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Returns `true` if the source image had no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Number of tiles [`tile_image`] produces for the given dimensions.
#[must_use]
pub fn tile_count(dimensions: Dimensions, tile_size: u32) -> usize {
    if tile_size == 0 {
        return 0;
    }
    let columns = dimensions.width.div_ceil(tile_size) as usize;
    let rows = dimensions.height.div_ceil(tile_size) as usize;
    columns * rows
}

/// Cut an image into `tile_size x tile_size` tiles.
///
/// Origins run `y = 0, S, 2S, ...` in the outer loop and
/// `x = 0, S, 2S, ...` in the inner loop. Edge tiles hold the available
/// region in their top-left corner and zeros elsewhere. An image smaller
/// than one tile produces exactly one padded tile. A `tile_size` of zero
/// produces no tiles.
#[must_use]
pub fn tile_image<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, tile_size: u32) -> TiledImage<P>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let dimensions = Dimensions::of(image);
    let mut tiles = Vec::with_capacity(tile_count(dimensions, tile_size));

    if tile_size > 0 {
        let step = tile_size as usize;
        for y in (0..dimensions.height).step_by(step) {
            for x in (0..dimensions.width).step_by(step) {
                let width = tile_size.min(dimensions.width - x);
                let height = tile_size.min(dimensions.height - y);
                let region = imageops::crop_imm(image, x, y, width, height).to_image();

                let tile = if width == tile_size && height == tile_size {
                    region
                } else {
                    let mut padded = ImageBuffer::new(tile_size, tile_size);
                    imageops::replace(&mut padded, &region, 0, 0);
                    padded
                };

                tiles.push(Tile {
                    origin: TileOrigin { x, y },
                    image: tile,
                });
            }
        }
    }

    TiledImage {
        tiles,
        dimensions,
        tile_size,
    }
}

/// Stitch per-tile masks back into a full-resolution mask.
///
/// Each mask is paired with the origin of the tile it was computed from.
/// Only the mask's top-left `min(S, H - y) x min(S, W - x)` region is
/// used (further limited to the mask's own size), and it is merged into
/// the output with an element-wise maximum. Because the merge is a
/// maximum, the result does not depend on the order of `tile_masks` and
/// overlapping tiles never suppress a foreground pixel. No masks gives
/// an all-zero mask.
#[must_use]
pub fn untile_mask<'a, I>(tile_masks: I, dimensions: Dimensions, tile_size: u32) -> GrayImage
where
    I: IntoIterator<Item = (TileOrigin, &'a GrayImage)>,
{
    let mut merged = GrayImage::new(dimensions.width, dimensions.height);

    for (origin, mask) in tile_masks {
        if origin.x >= dimensions.width || origin.y >= dimensions.height {
            continue;
        }
        let valid_height = tile_size
            .min(dimensions.height - origin.y)
            .min(mask.height());
        let valid_width = tile_size
            .min(dimensions.width - origin.x)
            .min(mask.width());

        for dy in 0..valid_height {
            for dx in 0..valid_width {
                let value = mask.get_pixel(dx, dy).0[0];
                let target = merged.get_pixel_mut(origin.x + dx, origin.y + dy);
                target.0[0] = target.0[0].max(value);
            }
        }
    }

    merged
}
