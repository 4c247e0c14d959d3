// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositing stage of a tile-based rasterizer.
//!
//! Paths are rasterized into alpha tiles: `16x16` pixel quads that carry a coverage mask and a
//! paint. This crate places those tiles on the target and combines every covered pixel with the
//! pixels already there, either with a Porter-Duff [`CompositeOp`] or with one of the W3C
//! [`BlendMode`]s.
//!
//! Blend modes need the destination color under each fragment. Since a fragment may not read
//! the buffer it writes, batches that use a blend mode sample a copy of the target taken right
//! before the batch (see [`RenderTargets`]).
//!
//! # Usage
//!
//! ```
//! use vello_composite::peniko::color::palette::css::RED;
//! use vello_composite::{
//!     AlphaTile, Blend, BlendMode, CoverageTexture, PaintTexture, Renderer, SourceTextures,
//!     TexRect, TileBatcher, VertexUniforms,
//! };
//!
//! let mut renderer = Renderer::new(32, 32);
//! let stencil = CoverageTexture::filled(16, 16, 1.0).unwrap();
//! let paint = PaintTexture::solid(RED);
//! let textures = SourceTextures {
//!     stencil: &stencil,
//!     paint: &paint,
//! };
//!
//! let mut batcher = TileBatcher::new();
//! let tile = AlphaTile::new([0, 0], TexRect::FULL, TexRect::FULL, 1.0);
//! batcher.push_path([tile], Blend::Mix(BlendMode::Difference));
//!
//! renderer.draw_batches(
//!     &batcher.finish(),
//!     &VertexUniforms::for_target(32, 32),
//!     &textures,
//! );
//! assert_eq!(renderer.framebuffer().pixel(0, 0).components, [1.0, 0.0, 0.0, 1.0]);
//! ```
//!
//! # Features
//!
//! - `multithreading`: Shade the bands of a batch on a [rayon](https://crates.io/crates/rayon)
//!   thread pool, configured through [`RenderSettings::num_threads`].

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
#![expect(
    clippy::cast_possible_truncation,
    reason = "pixel coordinates are clamped to the framebuffer size, and kurbo transforms are narrowed to f32"
)]

pub mod blend;
pub mod compose;
pub mod fragment;
mod render;
pub mod target;
pub mod texture;
pub mod tile;
pub mod vertex;

pub use peniko;

pub use blend::BlendMode;
pub use compose::{Blend, BlendFactor, BlendState, CompositeOp};
pub use fragment::{FragmentInput, SourceTextures};
pub use render::{RenderSettings, Renderer};
pub use target::{DestTexture, Framebuffer, RenderTargets};
pub use texture::{CoverageTexture, PaintTexture, Texture};
pub use tile::{AlphaTile, AlphaTileBatch, TexRect, TileBatcher};
pub use vertex::{TILE_HEIGHT, TILE_WIDTH, TileVertex, Transform, VertexUniforms};

/// Errors that can occur when setting up textures and targets.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The texel data doesn't match the texture dimensions.
    #[error("{len} texels don't fill a {width}x{height} texture")]
    TextureSize {
        /// Requested width.
        width: u16,
        /// Requested height.
        height: u16,
        /// Number of texels provided.
        len: usize,
    },
    /// Textures must have at least one texel to be sampled.
    #[error("texture has no texels")]
    EmptyTexture,
    /// A layer composited onto the target has a different size.
    #[error("layer size doesn't match the render target")]
    TargetSizeMismatch,
    /// The blend can't be expressed as a [`CompositeOp`] or a [`BlendMode`].
    #[error("unsupported blend {0:?}")]
    UnsupportedBlend(peniko::BlendMode),
    /// Failed to create the worker threads.
    #[cfg(feature = "multithreading")]
    #[error("couldn't build thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

static_assertions::assert_impl_all!(Renderer: Send, Sync);
static_assertions::assert_impl_all!(AlphaTile: bytemuck::Pod);
static_assertions::assert_impl_all!(VertexUniforms: bytemuck::Pod);
