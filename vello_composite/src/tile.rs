// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alpha tiles and their grouping into batches.

use crate::compose::Blend;
use crate::vertex::TileVertex;
use bytemuck::{Pod, Zeroable};

/// An axis-aligned rectangle in normalized texture coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TexRect {
    /// The corner mapped to the upper-left tile corner.
    pub min: [f32; 2],
    /// The corner mapped to the lower-right tile corner.
    pub max: [f32; 2],
}

impl TexRect {
    /// The whole texture.
    pub const FULL: Self = Self {
        min: [0.0, 0.0],
        max: [1.0, 1.0],
    };

    /// Create a rectangle from its corners.
    pub const fn new(min: [f32; 2], max: [f32; 2]) -> Self {
        Self { min, max }
    }

    /// The rectangle covering `size` texels starting at texel `origin` of a texture with
    /// `texture_size` texels.
    pub fn from_texels(origin: [u16; 2], size: [u16; 2], texture_size: [u16; 2]) -> Self {
        let norm = |v: u16, extent: u16| f32::from(v) / f32::from(extent);

        Self {
            min: [
                norm(origin[0], texture_size[0]),
                norm(origin[1], texture_size[1]),
            ],
            max: [
                norm(origin[0] + size[0], texture_size[0]),
                norm(origin[1] + size[1], texture_size[1]),
            ],
        }
    }
}

/// A tile of a path that is partially covered, drawn as a quad of four vertices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct AlphaTile {
    /// The upper-left, upper-right, lower-right and lower-left corners.
    pub vertices: [TileVertex; 4],
}

impl AlphaTile {
    /// Index of the upper-left corner in [`AlphaTile::vertices`].
    pub const UPPER_LEFT: usize = 0;
    /// Index of the upper-right corner in [`AlphaTile::vertices`].
    pub const UPPER_RIGHT: usize = 1;
    /// Index of the lower-right corner in [`AlphaTile::vertices`].
    pub const LOWER_RIGHT: usize = 2;
    /// Index of the lower-left corner in [`AlphaTile::vertices`].
    pub const LOWER_LEFT: usize = 3;

    /// Create the tile at grid position `position`, covered by `mask_rect` of the coverage
    /// texture and painted with `color_rect` of the paint texture.
    pub fn new(position: [i32; 2], mask_rect: TexRect, color_rect: TexRect, opacity: f32) -> Self {
        let [x, y] = position;
        let corner = |dx: i32, dy: i32, pick: fn(&TexRect) -> [f32; 2]| TileVertex {
            tile_position: [x + dx, y + dy],
            color_tex_coord: pick(&color_rect),
            mask_tex_coord: pick(&mask_rect),
            opacity,
        };

        Self {
            vertices: [
                corner(0, 0, |r| r.min),
                corner(1, 0, |r| [r.max[0], r.min[1]]),
                corner(1, 1, |r| r.max),
                corner(0, 1, |r| [r.min[0], r.max[1]]),
            ],
        }
    }

    /// The grid position of the tile.
    pub fn position(&self) -> [i32; 2] {
        self.vertices[Self::UPPER_LEFT].tile_position
    }
}

/// Tiles drawn in one pass with the same blend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlphaTileBatch {
    /// The tiles, in drawing order.
    pub tiles: Vec<AlphaTile>,
    /// How the tiles are combined with the destination.
    pub blend: Blend,
}

/// Groups the tiles of consecutive paths into batches.
///
/// Paths with the same blend share a batch. A path whose blend reads the destination always gets
/// a batch of its own, since its destination snapshot has to include all prior paths.
#[derive(Debug, Default)]
pub struct TileBatcher {
    batches: Vec<AlphaTileBatch>,
}

impl TileBatcher {
    /// Create an empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the tiles of one path.
    pub fn push_path(&mut self, tiles: impl IntoIterator<Item = AlphaTile>, blend: Blend) {
        match self.batches.last() {
            Some(batch) if batch.blend == blend && !blend.needs_readable_framebuffer() => {}
            _ => self.batches.push(AlphaTileBatch {
                tiles: vec![],
                blend,
            }),
        }

        // There is always a last batch at this point.
        if let Some(batch) = self.batches.last_mut() {
            batch.tiles.extend(tiles);
        }
    }

    /// The batches built so far.
    pub fn batches(&self) -> &[AlphaTileBatch] {
        &self.batches
    }

    /// Finish batching.
    pub fn finish(self) -> Vec<AlphaTileBatch> {
        self.batches
    }
}

/// Whether any of the batches reads the destination.
pub fn needs_readable_framebuffer(batches: &[AlphaTileBatch]) -> bool {
    batches
        .iter()
        .any(|batch| batch.blend.needs_readable_framebuffer())
}
