// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render targets and the destination buffer used by blend modes.

use crate::Error;
use crate::texture::Texture;
use peniko::color::{PremulColor, PremulRgba8, Srgb};

/// A framebuffer of premultiplied RGBA values with `f32` channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Framebuffer {
    width: u16,
    height: u16,
    buf: Vec<[f32; 4]>,
}

impl Framebuffer {
    /// Create a new framebuffer with the given width and height in pixels.
    ///
    /// All pixels are initialized to transparent black.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            buf: vec![[0.0; 4]; usize::from(width) * usize::from(height)],
        }
    }

    /// Create a framebuffer from row-major premultiplied colors.
    pub fn from_parts(
        data: Vec<PremulColor<Srgb>>,
        width: u16,
        height: u16,
    ) -> Result<Self, Error> {
        let len = data.len();
        if usize::from(width) * usize::from(height) != len {
            return Err(Error::TextureSize { width, height, len });
        }

        Ok(Self {
            width,
            height,
            buf: data.into_iter().map(|c| c.components).collect(),
        })
    }

    /// Width of the framebuffer in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height of the framebuffer in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The framebuffer size as a vector, as used to normalize window coordinates.
    pub fn size(&self) -> [f32; 2] {
        [f32::from(self.width), f32::from(self.height)]
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: PremulColor<Srgb>) {
        self.buf.fill(color.components);
    }

    /// The pixel at the given coordinates.
    pub fn pixel(&self, x: u16, y: u16) -> PremulColor<Srgb> {
        PremulColor::new(self.buf[self.index(x, y)])
    }

    /// Overwrite the pixel at the given coordinates.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: PremulColor<Srgb>) {
        let idx = self.index(x, y);
        self.buf[idx] = color.components;
    }

    /// The raw pixel components in row-major order.
    pub fn data(&self) -> &[[f32; 4]] {
        &self.buf
    }

    /// The raw pixel components in row-major order.
    pub fn data_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.buf
    }

    /// Convert the framebuffer to 8-bit premultiplied pixels, e.g. to fill a `Pixmap`.
    pub fn to_rgba8(&self) -> Vec<PremulRgba8> {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;

        self.buf
            .iter()
            .map(|&[r, g, b, a]| PremulRgba8 {
                r: quantize(r),
                g: quantize(g),
                b: quantize(b),
                a: quantize(a),
            })
            .collect()
    }

    fn index(&self, x: u16, y: u16) -> usize {
        debug_assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside of {}x{} framebuffer",
            self.width,
            self.height
        );
        usize::from(y) * usize::from(self.width) + usize::from(x)
    }
}

/// A read-only view of a finished framebuffer, sampled by blend modes.
#[derive(Debug, Clone, Copy)]
pub struct DestTexture<'a> {
    framebuffer: &'a Framebuffer,
}

impl<'a> DestTexture<'a> {
    /// Wrap a framebuffer that isn't being rendered to.
    pub fn new(framebuffer: &'a Framebuffer) -> Self {
        Self { framebuffer }
    }
}

impl Texture for DestTexture<'_> {
    type Texel = [f32; 4];

    fn width(&self) -> u16 {
        self.framebuffer.width
    }

    fn height(&self) -> u16 {
        self.framebuffer.height
    }

    #[inline]
    fn texel(&self, x: u16, y: u16) -> [f32; 4] {
        self.framebuffer.buf[self.framebuffer.index(x, y)]
    }
}

/// The draw target of a pass that reads the destination, plus the snapshot it reads.
#[derive(Debug)]
pub struct DrawPass<'a> {
    /// The framebuffer written by the pass.
    pub target: &'a mut Framebuffer,
    /// A copy of `target` taken before the pass started.
    pub dest: DestTexture<'a>,
}

/// A draw target with a second buffer for destination reads.
///
/// Blend modes read the pixels they are about to overwrite. Instead of sampling the target while
/// it is being written, a pass that needs the destination first copies the target into the
/// second buffer and samples that copy. The borrows handed out by [`RenderTargets::begin_pass`]
/// guarantee the two never alias, and that the copy is complete before the pass starts.
#[derive(Debug, Clone)]
pub struct RenderTargets {
    draw: Framebuffer,
    // Allocated on demand, see `reserve_dest_buffer`.
    dest: Option<Framebuffer>,
}

impl RenderTargets {
    /// Create targets of the given size, cleared to transparent black.
    pub fn new(width: u16, height: u16) -> Self {
        Self::from_framebuffer(Framebuffer::new(width, height))
    }

    /// Render onto an existing framebuffer.
    pub fn from_framebuffer(draw: Framebuffer) -> Self {
        Self { draw, dest: None }
    }

    /// The current contents of the draw target.
    pub fn framebuffer(&self) -> &Framebuffer {
        &self.draw
    }

    /// Mutable access to the draw target, for passes that don't read the destination.
    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.draw
    }

    /// Consume the targets, returning the draw target.
    pub fn into_framebuffer(self) -> Framebuffer {
        self.draw
    }

    /// Whether the destination buffer has been allocated.
    pub fn has_dest_buffer(&self) -> bool {
        self.dest.is_some()
    }

    /// Allocate the destination buffer ahead of the first pass that reads it.
    pub fn reserve_dest_buffer(&mut self) {
        if self.dest.is_none() {
            log::debug!(
                "allocating {}x{} destination buffer",
                self.draw.width,
                self.draw.height
            );
            self.dest = Some(Framebuffer::new(self.draw.width, self.draw.height));
        }
    }

    /// Start a pass that reads the destination.
    ///
    /// The draw target is copied into the destination buffer first, and the returned pass
    /// carries a view of that copy.
    pub fn begin_pass(&mut self) -> DrawPass<'_> {
        let dest = match &mut self.dest {
            Some(dest) => {
                dest.width = self.draw.width;
                dest.height = self.draw.height;
                dest.buf.clone_from(&self.draw.buf);
                dest
            }
            none => none.insert(self.draw.clone()),
        };
        log::trace!(
            "copied {}x{} draw target to destination buffer",
            dest.width,
            dest.height
        );

        DrawPass {
            target: &mut self.draw,
            dest: DestTexture::new(dest),
        }
    }
}
