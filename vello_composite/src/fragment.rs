// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The fragment stage: sampling the source and destination colors and compositing them.
//!
//! Every function in here shades a single pixel and has no side effects, so any number of
//! invocations can run concurrently.

use crate::blend::{BlendMode, MixKernel, MixVisitor};
use crate::compose::{self, BlendState};
use crate::target::DestTexture;
use crate::texture::{CoverageTexture, PaintTexture, Texture};

/// The interpolated inputs of one fragment.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FragmentInput {
    /// Window position of the pixel center.
    pub frag_coord: [f32; 2],
    /// Normalized paint texture coordinates.
    pub color_tex_coord: [f32; 2],
    /// Normalized coverage texture coordinates.
    pub mask_tex_coord: [f32; 2],
    /// Layer opacity.
    pub opacity: f32,
}

/// The textures providing the source color.
///
/// Mask and color coordinates index their textures independently, so the two textures don't
/// need to share a size or an origin.
#[derive(Copy, Clone, Debug)]
pub struct SourceTextures<'a> {
    /// Coverage computed by the rasterizer.
    pub stencil: &'a CoverageTexture,
    /// Fill colors.
    pub paint: &'a PaintTexture,
}

/// The source color of a fragment: the paint color with an alpha of
/// `paint.a * coverage * opacity`.
///
/// The alpha never exceeds `paint.a` for coverage and opacity in `[0, 1]`.
#[inline]
pub fn sample_src_color(input: &FragmentInput, textures: &SourceTextures<'_>) -> [f32; 4] {
    let coverage = textures.stencil.sample(input.mask_tex_coord);
    let paint = textures.paint.sample(input.color_tex_coord);

    [
        paint[0],
        paint[1],
        paint[2],
        paint[3] * coverage * input.opacity,
    ]
}

/// The premultiplied destination color under the fragment.
#[inline]
pub fn sample_dest_color(
    frag_coord: [f32; 2],
    framebuffer_size: [f32; 2],
    dest: &DestTexture<'_>,
) -> [f32; 4] {
    dest.sample([
        frag_coord[0] / framebuffer_size[0],
        frag_coord[1] / framebuffer_size[1],
    ])
}

/// Shade a fragment with the blend mode kernel `K`.
///
/// The result has an alpha of 1.
#[inline]
pub fn shade_mix<K: MixKernel>(
    input: &FragmentInput,
    textures: &SourceTextures<'_>,
    dest: &DestTexture<'_>,
    framebuffer_size: [f32; 2],
) -> [f32; 4] {
    let dest = sample_dest_color(input.frag_coord, framebuffer_size, dest);
    let src = sample_src_color(input, textures);

    compose::composite_with::<K>(dest, src)
}

/// Shade a fragment with a blend mode chosen at runtime.
pub fn shade(
    mode: BlendMode,
    input: &FragmentInput,
    textures: &SourceTextures<'_>,
    dest: &DestTexture<'_>,
    framebuffer_size: [f32; 2],
) -> [f32; 4] {
    struct Shade<'a, 'b> {
        input: &'a FragmentInput,
        textures: &'a SourceTextures<'b>,
        dest: &'a DestTexture<'b>,
        framebuffer_size: [f32; 2],
    }

    impl MixVisitor for Shade<'_, '_> {
        type Output = [f32; 4];

        fn visit<K: MixKernel>(self) -> [f32; 4] {
            shade_mix::<K>(self.input, self.textures, self.dest, self.framebuffer_size)
        }
    }

    mode.dispatch(Shade {
        input,
        textures,
        dest,
        framebuffer_size,
    })
}

/// The premultiplied source color, for blending with fixed-function [`BlendState`]s.
#[inline]
pub fn shade_premultiplied(input: &FragmentInput, textures: &SourceTextures<'_>) -> [f32; 4] {
    compose::premultiply(sample_src_color(input, textures))
}

/// Shade a fragment and blend it onto `current` with fixed-function blending.
#[inline]
pub fn shade_fixed_function(
    state: &BlendState,
    input: &FragmentInput,
    textures: &SourceTextures<'_>,
    current: [f32; 4],
) -> [f32; 4] {
    state.apply(shade_premultiplied(input, textures), current)
}
