// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Executing tile batches on the CPU.

use crate::Error;
use crate::blend::{MixKernel, MixVisitor};
use crate::compose::{Blend, BlendState, CompositeOp};
use crate::fragment::{self, FragmentInput, SourceTextures};
use crate::target::{DestTexture, Framebuffer, RenderTargets};
use crate::tile::{self, AlphaTile, AlphaTileBatch};
use crate::vertex::{self, TILE_HEIGHT, TileVertex, VertexUniforms};
use core::marker::PhantomData;
use smallvec::SmallVec;

// Rows of pixels processed together. Bands are the unit of parallelism.
const BAND_HEIGHT: usize = TILE_HEIGHT as usize;

// Triangles with a smaller determinant in pixels are skipped.
const MIN_TRIANGLE_AREA: f32 = 1e-6;

/// Settings to apply to the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    /// The number of worker threads for the fragment stage.
    ///
    /// With `0`, everything runs on the calling thread. Other values require the
    /// `multithreading` feature.
    pub num_threads: u16,
    /// Whether to clamp written colors to `[0, 1]`.
    pub clamp_output: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            num_threads: 0,
            clamp_output: true,
        }
    }
}

/// Renders tile batches into a framebuffer.
#[derive(Debug)]
pub struct Renderer {
    targets: RenderTargets,
    settings: RenderSettings,
    #[cfg(feature = "multithreading")]
    thread_pool: Option<rayon::ThreadPool>,
}

impl Renderer {
    /// Create a renderer with the default settings and a transparent target of the given size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            targets: RenderTargets::new(width, height),
            settings: RenderSettings::default(),
            #[cfg(feature = "multithreading")]
            thread_pool: None,
        }
    }

    /// Create a renderer with custom settings.
    pub fn new_with(width: u16, height: u16, settings: RenderSettings) -> Result<Self, Error> {
        #[cfg(feature = "multithreading")]
        let thread_pool = if settings.num_threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(usize::from(settings.num_threads))
                    .build()?,
            )
        } else {
            None
        };

        #[cfg(not(feature = "multithreading"))]
        if settings.num_threads > 0 {
            log::warn!(
                "{} threads requested without the `multithreading` feature, rendering on the calling thread",
                settings.num_threads
            );
        }

        Ok(Self {
            targets: RenderTargets::new(width, height),
            settings,
            #[cfg(feature = "multithreading")]
            thread_pool,
        })
    }

    /// The settings of this renderer.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// The rendered image.
    pub fn framebuffer(&self) -> &Framebuffer {
        self.targets.framebuffer()
    }

    /// Mutable access to the draw target, e.g. to clear it or to upload a background.
    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        self.targets.framebuffer_mut()
    }

    /// Consume the renderer, returning the rendered image.
    pub fn into_framebuffer(self) -> Framebuffer {
        self.targets.into_framebuffer()
    }

    /// Draw all batches in order.
    pub fn draw_batches(
        &mut self,
        batches: &[AlphaTileBatch],
        uniforms: &VertexUniforms,
        textures: &SourceTextures<'_>,
    ) {
        if tile::needs_readable_framebuffer(batches) {
            self.targets.reserve_dest_buffer();
        }

        for batch in batches {
            self.draw_batch(batch, uniforms, textures);
        }
    }

    /// Draw one batch of tiles.
    ///
    /// Blend modes read a copy of the target taken right before the batch, so tiles within one
    /// such batch must not overlap.
    pub fn draw_batch(
        &mut self,
        batch: &AlphaTileBatch,
        uniforms: &VertexUniforms,
        textures: &SourceTextures<'_>,
    ) {
        let framebuffer_size = self.targets.framebuffer().size();
        let tiles: Vec<PreparedTile> = batch
            .tiles
            .iter()
            .filter_map(|tile| PreparedTile::new(tile, uniforms, framebuffer_size))
            .collect();

        log::debug!(
            "drawing {} of {} tiles with {:?}",
            tiles.len(),
            batch.tiles.len(),
            batch.blend
        );

        if tiles.is_empty() {
            return;
        }

        let executor = Executor {
            clamp_output: self.settings.clamp_output,
            #[cfg(feature = "multithreading")]
            thread_pool: self.thread_pool.as_ref(),
            #[cfg(not(feature = "multithreading"))]
            _marker: PhantomData,
        };

        match batch.blend {
            Blend::Composite(op) => {
                let shader = FixedFunctionShader {
                    state: op.blend_state(),
                    textures,
                };
                executor.run(&shader, &tiles, self.targets.framebuffer_mut());
            }
            Blend::Mix(mode) => {
                let pass = self.targets.begin_pass();
                mode.dispatch(MixPass {
                    executor: &executor,
                    textures,
                    dest: pass.dest,
                    framebuffer_size,
                    tiles: &tiles,
                    target: pass.target,
                });
            }
        }
    }

    /// Composite a finished layer onto the target.
    pub fn composite_layer(&mut self, layer: &Framebuffer, op: CompositeOp) -> Result<(), Error> {
        let target = self.targets.framebuffer_mut();
        if layer.width() != target.width() || layer.height() != target.height() {
            return Err(Error::TargetSizeMismatch);
        }

        let state = op.blend_state();
        let clamp = self.settings.clamp_output;
        for (dest, src) in target.data_mut().iter_mut().zip(layer.data()) {
            *dest = finish(state.apply(*src, *dest), clamp);
        }

        Ok(())
    }
}

/// A tile after the vertex stage.
///
/// All four corners go through the vertex stage. The quad is rasterized as the triangles
/// (upper-left, upper-right, lower-right) and (upper-left, lower-right, lower-left), with
/// attributes interpolated perspective-correctly.
#[derive(Debug)]
struct PreparedTile {
    vertices: [TileVertex; 4],
    // `1 / w` of each corner in clip space.
    inv_w: [f32; 4],
    triangles: SmallVec<[Triangle; 2]>,
    // Pixel bounds, `[x0, y0, x1, y1)`.
    bounds: [u16; 4],
}

/// One half of a tile quad in window coordinates.
///
/// A point is `origin + s * e1 + t * e2`, where `e1` and `e2` run from the first corner to the
/// second and third.
#[derive(Debug)]
struct Triangle {
    corners: [usize; 3],
    origin: [f32; 2],
    // Inverse of the matrix with `e1` and `e2` as columns.
    inverse: [f32; 4],
    // Whether the edge from the first to the second corner (`t == 0`) belongs to this triangle.
    owns_first_edge: bool,
}

impl Triangle {
    fn new(
        corners: [usize; 3],
        points: &[[f32; 2]; 4],
        owns_first_edge: bool,
    ) -> Option<Self> {
        let [a, b, c] = corners.map(|i| points[i]);
        let e1 = [b[0] - a[0], b[1] - a[1]];
        let e2 = [c[0] - a[0], c[1] - a[1]];
        let det = e1[0] * e2[1] - e1[1] * e2[0];
        if !det.is_finite() || det.abs() < MIN_TRIANGLE_AREA {
            return None;
        }

        Some(Self {
            corners,
            origin: a,
            inverse: [e2[1] / det, -e1[1] / det, -e2[0] / det, e1[0] / det],
            owns_first_edge,
        })
    }

    /// The screen-space barycentric weights of `p`, if it lies inside the triangle.
    #[inline]
    fn weights(&self, p: [f32; 2]) -> Option<[f32; 3]> {
        let d = [p[0] - self.origin[0], p[1] - self.origin[1]];
        let s = self.inverse[0] * d[0] + self.inverse[2] * d[1];
        let t = self.inverse[1] * d[0] + self.inverse[3] * d[1];

        // The far edge is open, so pixels on an edge shared with a neighboring tile belong to
        // exactly one of them. The diagonal belongs to the first triangle only.
        let t_inside = if self.owns_first_edge { t >= 0.0 } else { t > 0.0 };
        if s >= 0.0 && t_inside && s + t < 1.0 {
            Some([1.0 - s - t, s, t])
        } else {
            None
        }
    }
}

impl PreparedTile {
    fn new(tile: &AlphaTile, uniforms: &VertexUniforms, framebuffer_size: [f32; 2]) -> Option<Self> {
        let mut points = [[0.0; 2]; 4];
        let mut inv_w = [0.0; 4];

        for (i, vertex) in tile.vertices.iter().enumerate() {
            let clip = vertex::place_tile_vertex(uniforms, vertex.tile_position);
            let Some(window) = vertex::clip_to_window(clip, framebuffer_size) else {
                log::warn!("skipping tile {:?} behind the viewer", tile.position());
                return None;
            };
            points[i] = window;
            inv_w[i] = 1.0 / clip[3];
        }

        let triangles: SmallVec<[Triangle; 2]> = [
            Triangle::new(
                [AlphaTile::UPPER_LEFT, AlphaTile::UPPER_RIGHT, AlphaTile::LOWER_RIGHT],
                &points,
                true,
            ),
            Triangle::new(
                [AlphaTile::UPPER_LEFT, AlphaTile::LOWER_RIGHT, AlphaTile::LOWER_LEFT],
                &points,
                false,
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        if triangles.is_empty() {
            log::warn!("skipping degenerate tile {:?}", tile.position());
            return None;
        }

        let xs = points.map(|p| p[0]);
        let ys = points.map(|p| p[1]);
        let to_pixel = |v: f32, max: f32| v.clamp(0.0, max) as u16;

        let bounds = [
            to_pixel(xs.into_iter().fold(f32::INFINITY, f32::min).floor(), framebuffer_size[0]),
            to_pixel(ys.into_iter().fold(f32::INFINITY, f32::min).floor(), framebuffer_size[1]),
            to_pixel(xs.into_iter().fold(f32::NEG_INFINITY, f32::max).ceil(), framebuffer_size[0]),
            to_pixel(ys.into_iter().fold(f32::NEG_INFINITY, f32::max).ceil(), framebuffer_size[1]),
        ];

        Some(Self {
            vertices: tile.vertices,
            inv_w,
            triangles,
            bounds,
        })
    }

    fn overlaps_rows(&self, y0: usize, y1: usize) -> bool {
        usize::from(self.bounds[1]) < y1 && usize::from(self.bounds[3]) > y0
    }

    /// The fragment inputs for the pixel at `(x, y)`, if its center lies inside the quad.
    #[inline]
    fn fragment(&self, x: u16, y: u16) -> Option<FragmentInput> {
        let frag_coord = [f32::from(x) + 0.5, f32::from(y) + 0.5];
        let (triangle, weights) = self
            .triangles
            .iter()
            .find_map(|tri| tri.weights(frag_coord).map(|w| (tri, w)))?;

        // Perspective correction: interpolate `attr / w` and `1 / w` linearly in screen space.
        let mut k = [0.0; 3];
        for ((slot, b), &corner) in k.iter_mut().zip(weights).zip(&triangle.corners) {
            *slot = b * self.inv_w[corner];
        }
        let norm = 1.0 / (k[0] + k[1] + k[2]);

        let mut input = FragmentInput {
            frag_coord,
            ..FragmentInput::default()
        };
        for (k, &corner) in k.iter().zip(&triangle.corners) {
            let vertex = &self.vertices[corner];
            let k = k * norm;
            for i in 0..2 {
                input.color_tex_coord[i] += k * vertex.color_tex_coord[i];
                input.mask_tex_coord[i] += k * vertex.mask_tex_coord[i];
            }
            input.opacity += k * vertex.opacity;
        }

        Some(input)
    }
}

/// Produces the new value of a covered pixel.
trait TileShader: Sync {
    fn shade(&self, input: &FragmentInput, current: [f32; 4]) -> [f32; 4];
}

struct FixedFunctionShader<'a, 'b> {
    state: BlendState,
    textures: &'a SourceTextures<'b>,
}

impl TileShader for FixedFunctionShader<'_, '_> {
    #[inline]
    fn shade(&self, input: &FragmentInput, current: [f32; 4]) -> [f32; 4] {
        fragment::shade_fixed_function(&self.state, input, self.textures, current)
    }
}

struct MixShader<'a, 'b, K> {
    textures: &'a SourceTextures<'b>,
    dest: DestTexture<'a>,
    framebuffer_size: [f32; 2],
    _kernel: PhantomData<fn() -> K>,
}

impl<K: MixKernel> TileShader for MixShader<'_, '_, K> {
    #[inline]
    fn shade(&self, input: &FragmentInput, _current: [f32; 4]) -> [f32; 4] {
        fragment::shade_mix::<K>(input, self.textures, &self.dest, self.framebuffer_size)
    }
}

/// Runs the kernel selected for a blend mode over a batch.
struct MixPass<'a, 'b> {
    executor: &'a Executor<'a>,
    textures: &'a SourceTextures<'b>,
    dest: DestTexture<'a>,
    framebuffer_size: [f32; 2],
    tiles: &'a [PreparedTile],
    target: &'a mut Framebuffer,
}

impl MixVisitor for MixPass<'_, '_> {
    type Output = ();

    fn visit<K: MixKernel>(self) {
        let shader = MixShader::<K> {
            textures: self.textures,
            dest: self.dest,
            framebuffer_size: self.framebuffer_size,
            _kernel: PhantomData,
        };
        self.executor.run(&shader, self.tiles, self.target);
    }
}

struct Executor<'a> {
    clamp_output: bool,
    #[cfg(feature = "multithreading")]
    thread_pool: Option<&'a rayon::ThreadPool>,
    #[cfg(not(feature = "multithreading"))]
    _marker: PhantomData<&'a ()>,
}

impl Executor<'_> {
    fn run<S: TileShader>(&self, shader: &S, tiles: &[PreparedTile], target: &mut Framebuffer) {
        let width = usize::from(target.width());
        if width == 0 || target.height() == 0 {
            return;
        }

        let band_len = width * BAND_HEIGHT;
        let clamp = self.clamp_output;
        let run_band = |(idx, band): (usize, &mut [[f32; 4]])| {
            raster_band(shader, tiles, band, idx * BAND_HEIGHT, width, clamp);
        };

        #[cfg(feature = "multithreading")]
        if let Some(pool) = self.thread_pool {
            use rayon::iter::{IndexedParallelIterator, ParallelIterator};
            use rayon::slice::ParallelSliceMut;

            pool.install(|| {
                target
                    .data_mut()
                    .par_chunks_mut(band_len)
                    .enumerate()
                    .for_each(run_band);
            });
            return;
        }

        target
            .data_mut()
            .chunks_mut(band_len)
            .enumerate()
            .for_each(run_band);
    }
}

fn raster_band<S: TileShader>(
    shader: &S,
    tiles: &[PreparedTile],
    band: &mut [[f32; 4]],
    y0: usize,
    width: usize,
    clamp: bool,
) {
    let y1 = y0 + band.len() / width;
    let overlapping: SmallVec<[&PreparedTile; 32]> = tiles
        .iter()
        .filter(|tile| tile.overlaps_rows(y0, y1))
        .collect();

    // Tiles are visited in order, so later tiles land on top of earlier ones.
    for tile in overlapping {
        let ty0 = usize::from(tile.bounds[1]).max(y0);
        let ty1 = usize::from(tile.bounds[3]).min(y1);

        for y in ty0..ty1 {
            let row = &mut band[(y - y0) * width..][..width];

            for x in tile.bounds[0]..tile.bounds[2] {
                let Some(input) = tile.fragment(x, y as u16) else {
                    continue;
                };
                let pixel = &mut row[usize::from(x)];
                *pixel = finish(shader.shade(&input, *pixel), clamp);
            }
        }
    }
}

#[inline(always)]
fn finish(color: [f32; 4], clamp: bool) -> [f32; 4] {
    if clamp {
        color.map(|c| c.clamp(0.0, 1.0))
    } else {
        color
    }
}
