// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Textures read by the fragment stage.
//!
//! All textures are sampled with normalized coordinates, picking the nearest texel and clamping
//! to the edge.

use crate::Error;
use peniko::color::{AlphaColor, Srgb};

/// A texture that can be sampled at normalized coordinates.
pub trait Texture {
    /// The value stored for each texel.
    type Texel: Copy;

    /// Width of the texture in texels.
    fn width(&self) -> u16;

    /// Height of the texture in texels.
    fn height(&self) -> u16;

    /// The texel at the given integer coordinates.
    ///
    /// The coordinates must be in range.
    fn texel(&self, x: u16, y: u16) -> Self::Texel;

    /// Sample the texel covering the normalized coordinates `uv`.
    #[inline]
    fn sample(&self, uv: [f32; 2]) -> Self::Texel {
        self.texel(nearest(uv[0], self.width()), nearest(uv[1], self.height()))
    }
}

/// Map a normalized coordinate to the index of the texel containing it.
///
/// `size` must not be zero.
#[inline(always)]
pub(crate) fn nearest(coord: f32, size: u16) -> u16 {
    // Float to int casts saturate, which also sends NaN and negative values to the first texel.
    let texel = (coord * f32::from(size)).floor() as u32;
    texel.min(u32::from(size) - 1) as u16
}

fn check_size(width: u16, height: u16, len: usize) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyTexture);
    }

    if usize::from(width) * usize::from(height) != len {
        return Err(Error::TextureSize { width, height, len });
    }

    Ok(())
}

/// A single-channel texture of coverage values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CoverageTexture {
    width: u16,
    height: u16,
    buf: Vec<f32>,
}

impl CoverageTexture {
    /// Create a coverage texture from row-major coverage values.
    pub fn new(width: u16, height: u16, buf: Vec<f32>) -> Result<Self, Error> {
        check_size(width, height, buf.len())?;

        Ok(Self { width, height, buf })
    }

    /// Create a texture with the same coverage everywhere.
    pub fn filled(width: u16, height: u16, coverage: f32) -> Result<Self, Error> {
        let len = usize::from(width) * usize::from(height);
        Self::new(width, height, vec![coverage; len])
    }

    /// Create a coverage texture from 8-bit alpha values, as produced by strip rendering.
    pub fn from_alphas(width: u16, height: u16, alphas: &[u8]) -> Result<Self, Error> {
        let buf = alphas.iter().map(|a| f32::from(*a) / 255.0).collect();
        Self::new(width, height, buf)
    }

    /// The coverage values in row-major order.
    pub fn data(&self) -> &[f32] {
        &self.buf
    }
}

impl Texture for CoverageTexture {
    type Texel = f32;

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn texel(&self, x: u16, y: u16) -> f32 {
        self.buf[usize::from(y) * usize::from(self.width) + usize::from(x)]
    }
}

/// An RGBA texture of paint colors with straight alpha.
#[derive(Debug, Clone)]
pub struct PaintTexture {
    width: u16,
    height: u16,
    buf: Vec<AlphaColor<Srgb>>,
}

impl PaintTexture {
    /// Create a paint texture from row-major colors.
    pub fn new(width: u16, height: u16, buf: Vec<AlphaColor<Srgb>>) -> Result<Self, Error> {
        check_size(width, height, buf.len())?;

        Ok(Self { width, height, buf })
    }

    /// A 1x1 texture holding a solid color.
    pub fn solid(color: AlphaColor<Srgb>) -> Self {
        Self {
            width: 1,
            height: 1,
            buf: vec![color],
        }
    }

    /// The colors in row-major order.
    pub fn data(&self) -> &[AlphaColor<Srgb>] {
        &self.buf
    }
}

impl Texture for PaintTexture {
    type Texel = [f32; 4];

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn texel(&self, x: u16, y: u16) -> [f32; 4] {
        self.buf[usize::from(y) * usize::from(self.width) + usize::from(x)].components
    }
}
