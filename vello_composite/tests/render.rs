// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end tests of tile placement, destination reads and layer compositing.

mod util;

use util::{Solid, assert_color, draw, pixel, renderer_with_background, tile, SIZE};
use vello_composite::peniko::color::palette::css::{BLUE, RED, WHITE};
use vello_composite::peniko::color::{AlphaColor, PremulColor};
use vello_composite::peniko::kurbo::Affine;
use vello_composite::{
    AlphaTile, Blend, BlendMode, CompositeOp, CoverageTexture, Error, Framebuffer, PaintTexture,
    RenderSettings, Renderer, SourceTextures, TexRect, TileBatcher, Transform, VertexUniforms,
};

const OPAQUE_BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

#[test]
fn difference_at_half_coverage() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    draw(
        &mut renderer,
        [tile(0, 0)],
        Blend::Mix(BlendMode::Difference),
        &Solid::new(RED, 0.5),
    );

    assert_color(pixel(&renderer, 5, 5), [0.5, 0.0, 1.0, 1.0]);
}

#[test]
fn exclusion_of_white_over_gray() {
    let mut renderer = renderer_with_background([0.5, 0.5, 0.5, 1.0]);
    draw(
        &mut renderer,
        [tile(0, 0)],
        Blend::Mix(BlendMode::Exclusion),
        &Solid::new(WHITE, 1.0),
    );

    assert_color(pixel(&renderer, 8, 8), [0.5, 0.5, 0.5, 1.0]);
}

#[test]
fn only_covered_tiles_are_written() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    draw(
        &mut renderer,
        [tile(0, 0), tile(1, 1)],
        CompositeOp::SrcOver.into(),
        &Solid::new(RED, 1.0),
    );

    let red = [1.0, 0.0, 0.0, 1.0];
    assert_color(pixel(&renderer, 0, 0), red);
    assert_color(pixel(&renderer, 15, 15), red);
    assert_color(pixel(&renderer, 16, 16), red);
    assert_color(pixel(&renderer, 31, 31), red);
    assert_color(pixel(&renderer, 16, 0), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 0, 16), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 15, 16), OPAQUE_BLUE);
}

#[test]
fn coverage_varies_across_tile() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let stencil = CoverageTexture::new(2, 1, vec![0.0, 1.0]).unwrap();
    let paint = PaintTexture::solid(RED);
    let textures = SourceTextures {
        stencil: &stencil,
        paint: &paint,
    };

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(0, 0)], Blend::Mix(BlendMode::Normal));
    renderer.draw_batches(
        &batcher.finish(),
        &VertexUniforms::for_target(SIZE, SIZE),
        &textures,
    );

    assert_color(pixel(&renderer, 3, 0), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 12, 0), [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn opacity_scales_source_alpha() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let faded = AlphaTile::new([0, 0], TexRect::FULL, TexRect::FULL, 0.5);
    draw(
        &mut renderer,
        [faded],
        Blend::Mix(BlendMode::Difference),
        &Solid::new(RED, 1.0),
    );

    assert_color(pixel(&renderer, 1, 1), [0.5, 0.0, 1.0, 1.0]);
}

#[test]
fn batches_read_previous_results() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let solid = Solid::new(RED, 1.0);
    let blend = Blend::Mix(BlendMode::Difference);

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(0, 0)], blend);
    batcher.push_path([tile(0, 0)], blend);
    let batches = batcher.finish();
    assert_eq!(batches.len(), 2);

    renderer.draw_batches(
        &batches,
        &VertexUniforms::for_target(SIZE, SIZE),
        &solid.textures(),
    );

    // |blue - red| is magenta, and |magenta - red| is blue again.
    assert_color(pixel(&renderer, 4, 4), OPAQUE_BLUE);
}

#[test]
fn composite_ops_mix_with_blend_modes() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let solid = Solid::new(RED, 1.0);

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(0, 0)], CompositeOp::Clear.into());
    batcher.push_path([tile(0, 0)], Blend::Mix(BlendMode::Multiply));
    renderer.draw_batches(
        &batcher.finish(),
        &VertexUniforms::for_target(SIZE, SIZE),
        &solid.textures(),
    );

    // Over a cleared destination, every blend mode shows the plain source.
    assert_color(pixel(&renderer, 0, 0), [1.0, 0.0, 0.0, 1.0]);
    assert_color(pixel(&renderer, 20, 0), OPAQUE_BLUE);
}

#[test]
fn transformed_placement() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let uniforms = VertexUniforms {
        transform: Transform::orthographic(f32::from(SIZE), f32::from(SIZE))
            * Transform::from_kurbo(&Affine::translate((8.0, 4.0))),
        ..VertexUniforms::for_target(SIZE, SIZE)
    };
    let solid = Solid::new(RED, 1.0);

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(0, 0)], Blend::default());
    renderer.draw_batches(&batcher.finish(), &uniforms, &solid.textures());

    let red = [1.0, 0.0, 0.0, 1.0];
    assert_color(pixel(&renderer, 7, 4), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 8, 3), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 8, 4), red);
    assert_color(pixel(&renderer, 23, 19), red);
    assert_color(pixel(&renderer, 24, 19), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 23, 20), OPAQUE_BLUE);
}

#[test]
fn perspective_placement() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    // w = 1 + x / 64 in pixel space.
    let perspective = Transform {
        columns: [
            [1.0, 0.0, 0.0, 1.0 / 64.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };
    let uniforms = VertexUniforms {
        transform: Transform::orthographic(f32::from(SIZE), f32::from(SIZE)) * perspective,
        ..VertexUniforms::for_target(SIZE, SIZE)
    };
    let solid = Solid::new(RED, 1.0);

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(1, 0)], CompositeOp::SrcOver.into());
    renderer.draw_batches(&batcher.finish(), &uniforms, &solid.textures());

    // The projected lower edge passes y = 10.875 at x = 20.5.
    let red = [1.0, 0.0, 0.0, 1.0];
    assert_color(pixel(&renderer, 20, 10), red);
    assert_color(pixel(&renderer, 20, 11), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 14, 8), red);
    assert_color(pixel(&renderer, 12, 5), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 21, 2), OPAQUE_BLUE);
    assert_color(pixel(&renderer, 25, 12), OPAQUE_BLUE);
}

#[test]
fn tiles_outside_target_are_ignored() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    draw(
        &mut renderer,
        [tile(-1, 0), tile(2, 0), tile(0, 5)],
        Blend::Mix(BlendMode::Difference),
        &Solid::new(RED, 1.0),
    );

    assert!(renderer
        .framebuffer()
        .data()
        .iter()
        .all(|px| *px == OPAQUE_BLUE));
}

#[test]
fn output_is_clamped_by_default() {
    let mut renderer = renderer_with_background([1.0, 0.0, 0.0, 1.0]);
    draw(
        &mut renderer,
        [tile(0, 0)],
        CompositeOp::Lighter.into(),
        &Solid::new(RED, 1.0),
    );

    assert_color(pixel(&renderer, 0, 0), [1.0, 0.0, 0.0, 1.0]);
}

#[test]
fn unclamped_output() {
    let settings = RenderSettings {
        clamp_output: false,
        ..RenderSettings::default()
    };
    let mut renderer = Renderer::new_with(SIZE, SIZE, settings).unwrap();
    renderer
        .framebuffer_mut()
        .fill(PremulColor::new([1.0, 0.0, 0.0, 1.0]));
    draw(
        &mut renderer,
        [tile(0, 0)],
        CompositeOp::Lighter.into(),
        &Solid::new(RED, 1.0),
    );

    assert_color(pixel(&renderer, 0, 0), [2.0, 0.0, 0.0, 2.0]);
}

#[test]
fn composite_layer_onto_target() {
    let mut renderer = renderer_with_background(OPAQUE_BLUE);
    let mut layer = Framebuffer::new(SIZE, SIZE);
    layer.set_pixel(3, 3, PremulColor::new([0.5, 0.0, 0.0, 0.5]));

    renderer
        .composite_layer(&layer, CompositeOp::SrcOver)
        .unwrap();

    assert_color(pixel(&renderer, 3, 3), [0.5, 0.0, 0.5, 1.0]);
    assert_color(pixel(&renderer, 4, 3), OPAQUE_BLUE);

    renderer
        .composite_layer(&layer, CompositeOp::DestIn)
        .unwrap();
    assert_color(pixel(&renderer, 3, 3), [0.25, 0.0, 0.25, 0.5]);
    assert_color(pixel(&renderer, 4, 3), [0.0; 4]);
}

#[test]
fn composite_layer_size_mismatch() {
    let mut renderer = Renderer::new(SIZE, SIZE);
    let layer = Framebuffer::new(SIZE, SIZE / 2);

    assert!(matches!(
        renderer.composite_layer(&layer, CompositeOp::SrcOver),
        Err(Error::TargetSizeMismatch)
    ));
}

#[test]
fn empty_target() {
    let mut renderer = Renderer::new(0, 0);
    let solid = Solid::new(RED, 1.0);

    let mut batcher = TileBatcher::new();
    batcher.push_path([tile(0, 0)], Blend::Mix(BlendMode::Screen));
    renderer.draw_batches(
        &batcher.finish(),
        &VertexUniforms::for_target(0, 0),
        &solid.textures(),
    );

    assert!(renderer.into_framebuffer().data().is_empty());
}

#[test]
fn paint_texture_lookup() {
    let mut renderer = renderer_with_background([0.0; 4]);
    let stencil = CoverageTexture::filled(1, 1, 1.0).unwrap();
    let paint = PaintTexture::new(2, 1, vec![RED, BLUE]).unwrap();
    let textures = SourceTextures {
        stencil: &stencil,
        paint: &paint,
    };

    let texel = |x: u16| TexRect::from_texels([x, 0], [1, 1], [2, 1]);

    let mut batcher = TileBatcher::new();
    batcher.push_path(
        [
            AlphaTile::new([0, 0], TexRect::FULL, texel(0), 1.0),
            AlphaTile::new([1, 0], TexRect::FULL, texel(1), 1.0),
        ],
        Blend::Mix(BlendMode::Normal),
    );
    renderer.draw_batches(
        &batcher.finish(),
        &VertexUniforms::for_target(SIZE, SIZE),
        &textures,
    );

    assert_color(pixel(&renderer, 10, 10), [1.0, 0.0, 0.0, 1.0]);
    assert_color(pixel(&renderer, 20, 10), [0.0, 0.0, 1.0, 1.0]);
}

#[test]
fn translucent_paint_over_transparent_target() {
    let mut renderer = renderer_with_background([0.0; 4]);
    draw(
        &mut renderer,
        [tile(0, 0)],
        CompositeOp::SrcOver.into(),
        &Solid::new(AlphaColor::new([1.0, 0.5, 0.0, 0.5]), 1.0),
    );

    assert_color(pixel(&renderer, 0, 0), [0.5, 0.25, 0.0, 0.5]);
}

#[cfg(feature = "multithreading")]
#[test]
fn multithreaded_matches_single_threaded() {
    let settings = RenderSettings {
        num_threads: 3,
        ..RenderSettings::default()
    };
    let solid = Solid::new(RED, 0.75);
    let tiles = [tile(0, 0), tile(1, 0), tile(1, 1)];

    let mut single = renderer_with_background(OPAQUE_BLUE);
    let mut multi = Renderer::new_with(SIZE, SIZE, settings).unwrap();
    multi
        .framebuffer_mut()
        .fill(PremulColor::new(OPAQUE_BLUE));

    for mode in [BlendMode::Exclusion, BlendMode::Difference, BlendMode::Hue] {
        draw(&mut single, tiles, Blend::Mix(mode), &solid);
        draw(&mut multi, tiles, Blend::Mix(mode), &solid);
    }

    assert_eq!(single.framebuffer(), multi.framebuffer());
}

#[cfg(not(feature = "multithreading"))]
#[test]
fn threads_without_multithreading() {
    let settings = RenderSettings {
        num_threads: 4,
        ..RenderSettings::default()
    };

    assert!(Renderer::new_with(SIZE, SIZE, settings).is_ok());
}
