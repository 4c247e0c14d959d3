// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Placement of tile vertices in clip space.

use bytemuck::{Pod, Zeroable};
use core::ops::Mul;
use peniko::kurbo;

/// Width of a tile in pixels.
pub const TILE_WIDTH: u32 = 16;
/// Height of a tile in pixels.
pub const TILE_HEIGHT: u32 = 16;

/// A 4x4 transformation matrix, stored in column-major order.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// The four columns of the matrix.
    pub columns: [[f32; 4]; 4],
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from a kurbo affine matrix, leaving z and w untouched.
    pub fn from_kurbo(transform: &kurbo::Affine) -> Self {
        let c = transform.as_coeffs().map(|x| x as f32);
        Self {
            columns: [
                [c[0], c[1], 0.0, 0.0],
                [c[2], c[3], 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [c[4], c[5], 0.0, 1.0],
            ],
        }
    }

    /// Maps pixel coordinates in `[0, width] x [0, height]` to clip space `[-1, 1]^2`.
    pub fn orthographic(width: f32, height: f32) -> Self {
        Self {
            columns: [
                [2.0 / width, 0.0, 0.0, 0.0],
                [0.0, 2.0 / height, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [-1.0, -1.0, 0.0, 1.0],
            ],
        }
    }

    /// Apply the transform to a homogeneous point.
    #[inline]
    pub fn transform_point(&self, p: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (col, s) in self.columns.iter().zip(p) {
            for (o, c) in out.iter_mut().zip(col) {
                *o += c * s;
            }
        }
        out
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Transform {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            columns: other.columns.map(|col| self.transform_point(col)),
        }
    }
}

/// Per-draw uniforms of the vertex stage.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexUniforms {
    /// Transform from pixel space to clip space.
    pub transform: Transform,
    /// Size of a tile in pixels.
    pub tile_size: [f32; 2],
}

impl VertexUniforms {
    /// Uniforms for drawing tiles of the default size onto a target of the given size.
    pub fn for_target(width: u16, height: u16) -> Self {
        Self {
            transform: Transform::orthographic(f32::from(width), f32::from(height)),
            tile_size: [TILE_WIDTH as f32, TILE_HEIGHT as f32],
        }
    }
}

/// The attributes of one tile corner.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TileVertex {
    /// Position of the corner on the tile grid.
    pub tile_position: [i32; 2],
    /// Normalized paint texture coordinates.
    pub color_tex_coord: [f32; 2],
    /// Normalized coverage texture coordinates.
    pub mask_tex_coord: [f32; 2],
    /// Opacity of the layer the tile belongs to.
    pub opacity: f32,
}

static_assertions::const_assert_eq!(size_of::<TileVertex>(), 28);

/// Compute the clip-space position of a tile corner.
///
/// `position = tile_position * tile_size`, then transformed by the uniform transform.
#[inline]
pub fn place_tile_vertex(uniforms: &VertexUniforms, tile_position: [i32; 2]) -> [f32; 4] {
    let position = [
        tile_position[0] as f32 * uniforms.tile_size[0],
        tile_position[1] as f32 * uniforms.tile_size[1],
    ];

    uniforms
        .transform
        .transform_point([position[0], position[1], 0.0, 1.0])
}

/// Map a clip-space position to window coordinates in pixels.
///
/// Row 0 of the framebuffer sits at `y = -1` in normalized device coordinates. Returns `None`
/// for points behind the viewer.
#[inline]
pub fn clip_to_window(clip: [f32; 4], framebuffer_size: [f32; 2]) -> Option<[f32; 2]> {
    let w = clip[3];
    if w <= 0.0 {
        return None;
    }

    let ndc = [clip[0] / w, clip[1] / w];

    Some([
        (ndc[0] + 1.0) * 0.5 * framebuffer_size[0],
        (ndc[1] + 1.0) * 0.5 * framebuffer_size[1],
    ])
}
