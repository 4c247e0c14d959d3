// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code, reason = "not every test file uses every helper")]

use vello_composite::peniko::color::{AlphaColor, PremulColor, Srgb};
use vello_composite::{
    AlphaTile, Blend, CoverageTexture, PaintTexture, Renderer, SourceTextures, TexRect,
    TileBatcher, VertexUniforms,
};

pub const SIZE: u16 = 32;

/// Textures for a path painted with one color at one coverage.
pub struct Solid {
    pub stencil: CoverageTexture,
    pub paint: PaintTexture,
}

impl Solid {
    pub fn new(color: AlphaColor<Srgb>, coverage: f32) -> Self {
        Self {
            stencil: CoverageTexture::filled(1, 1, coverage).unwrap(),
            paint: PaintTexture::solid(color),
        }
    }

    pub fn textures(&self) -> SourceTextures<'_> {
        SourceTextures {
            stencil: &self.stencil,
            paint: &self.paint,
        }
    }
}

pub fn tile(x: i32, y: i32) -> AlphaTile {
    AlphaTile::new([x, y], TexRect::FULL, TexRect::FULL, 1.0)
}

/// A renderer whose target is filled with the premultiplied `background`.
pub fn renderer_with_background(background: [f32; 4]) -> Renderer {
    let mut renderer = Renderer::new(SIZE, SIZE);
    renderer
        .framebuffer_mut()
        .fill(PremulColor::new(background));
    renderer
}

/// Draw `tiles` with `blend` and the given textures.
pub fn draw(
    renderer: &mut Renderer,
    tiles: impl IntoIterator<Item = AlphaTile>,
    blend: Blend,
    solid: &Solid,
) {
    let mut batcher = TileBatcher::new();
    batcher.push_path(tiles, blend);
    renderer.draw_batches(
        &batcher.finish(),
        &VertexUniforms::for_target(SIZE, SIZE),
        &solid.textures(),
    );
}

pub fn pixel(renderer: &Renderer, x: u16, y: u16) -> [f32; 4] {
    renderer.framebuffer().pixel(x, y).components
}

#[track_caller]
pub fn assert_color(actual: [f32; 4], expected: [f32; 4]) {
    assert!(
        actual
            .iter()
            .zip(expected)
            .all(|(a, e)| (a - e).abs() < 1e-5),
        "{actual:?} != {expected:?}"
    );
}
