// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositing of source colors onto the destination.
//!
//! There are two families of operations:
//!
//! - [`BlendMode`]s go through [`composite`], the separable blend mode equation from
//!   <https://www.w3.org/TR/compositing-1/#generalformula>. They need to read the destination.
//! - [`CompositeOp`]s are Porter-Duff operators expressed as a pair of [`BlendFactor`]s, the way
//!   fixed-function GPU blending applies them. They never need to read the destination.
//!
//! [`Blend`] selects one of the two per draw.

use crate::Error;
use crate::blend::{BlendMode, MixKernel, Rgb};
use peniko::{Compose, Mix};

/// The shared compositing equation.
///
/// `src` is the color produced by the fragment stage: the straight paint color with an alpha of
/// `paint.a * coverage * opacity`. `dest` is the premultiplied destination color. `blended` is
/// the blend mode's combination of the two straight colors.
///
/// ```text
/// out.rgb = src.a * (1 - dest.a) * src.rgb
///         + src.a * dest.a * blended
///         + (1 - src.a) * dest.a * dest.rgb
/// out.a = 1
/// ```
#[inline(always)]
pub fn composite(dest: [f32; 4], src: [f32; 4], blended: Rgb) -> [f32; 4] {
    let src_a = src[3];
    let dest_a = dest[3];
    let dest_rgb = unpremultiply(dest);

    let mut out = [0.0, 0.0, 0.0, 1.0];

    for i in 0..3 {
        out[i] = src_a * (1.0 - dest_a) * src[i]
            + src_a * dest_a * blended[i]
            + (1.0 - src_a) * dest_a * dest_rgb[i];
    }

    out
}

/// Run [`composite`] with the blended term of the kernel `K`.
#[inline(always)]
pub fn composite_with<K: MixKernel>(dest: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let dest_rgb = unpremultiply(dest);
    let blended = K::combine(dest_rgb, [src[0], src[1], src[2]]);

    composite(dest, src, blended)
}

/// The straight color channels of a premultiplied color.
///
/// Fully transparent colors yield black.
#[inline(always)]
pub fn unpremultiply(color: [f32; 4]) -> Rgb {
    let alpha = color[3];

    if alpha == 0.0 {
        [0.0; 3]
    } else {
        [color[0] / alpha, color[1] / alpha, color[2] / alpha]
    }
}

/// Premultiply a straight color by its alpha.
#[inline(always)]
pub fn premultiply(color: [f32; 4]) -> [f32; 4] {
    let alpha = color[3];

    [color[0] * alpha, color[1] * alpha, color[2] * alpha, alpha]
}

/// A Porter-Duff compositing operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositeOp {
    /// No regions are enabled.
    Clear,
    /// Only the source will be present.
    Copy,
    /// The source is placed over the destination.
    #[default]
    SrcOver,
    /// The destination is placed over the source.
    DestOver,
    /// The source that overlaps the destination replaces the destination.
    SrcIn,
    /// The destination that overlaps the source replaces the source.
    DestIn,
    /// The source is placed where it falls outside of the destination.
    SrcOut,
    /// The destination is placed where it falls outside of the source.
    DestOut,
    /// The source that overlaps the destination replaces the destination, the destination is
    /// placed elsewhere.
    SrcAtop,
    /// The destination that overlaps the source replaces the source, the source is placed
    /// elsewhere.
    DestAtop,
    /// The non-overlapping regions of source and destination are combined.
    Xor,
    /// Source and destination are added together.
    Lighter,
}

impl CompositeOp {
    /// All composite operators, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Clear,
        Self::Copy,
        Self::SrcOver,
        Self::DestOver,
        Self::SrcIn,
        Self::DestIn,
        Self::SrcOut,
        Self::DestOut,
        Self::SrcAtop,
        Self::DestAtop,
        Self::Xor,
        Self::Lighter,
    ];

    /// The blend factors implementing this operator.
    pub fn blend_state(self) -> BlendState {
        use BlendFactor::*;

        let (src_factor, dest_factor) = match self {
            Self::Clear => (Zero, Zero),
            Self::Copy => (One, Zero),
            Self::SrcOver => (One, OneMinusSrcAlpha),
            Self::DestOver => (OneMinusDestAlpha, One),
            Self::SrcIn => (DestAlpha, Zero),
            Self::DestIn => (Zero, SrcAlpha),
            Self::SrcOut => (OneMinusDestAlpha, Zero),
            Self::DestOut => (Zero, OneMinusSrcAlpha),
            Self::SrcAtop => (DestAlpha, OneMinusSrcAlpha),
            Self::DestAtop => (OneMinusDestAlpha, SrcAlpha),
            Self::Xor => (OneMinusDestAlpha, OneMinusSrcAlpha),
            Self::Lighter => (One, One),
        };

        BlendState {
            src_factor,
            dest_factor,
        }
    }
}

/// A multiplier applied to one side of a fixed-function blend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
    DestAlpha,
    OneMinusDestAlpha,
}

impl BlendFactor {
    #[inline(always)]
    fn resolve(self, src_a: f32, dest_a: f32) -> f32 {
        match self {
            Self::Zero => 0.0,
            Self::One => 1.0,
            Self::SrcAlpha => src_a,
            Self::OneMinusSrcAlpha => 1.0 - src_a,
            Self::DestAlpha => dest_a,
            Self::OneMinusDestAlpha => 1.0 - dest_a,
        }
    }
}

/// `out = src * src_factor + dest * dest_factor` over premultiplied colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Factor applied to the source.
    pub src_factor: BlendFactor,
    /// Factor applied to the destination.
    pub dest_factor: BlendFactor,
}

impl BlendState {
    /// Blend the premultiplied `src` onto the premultiplied `dest`.
    #[inline(always)]
    pub fn apply(&self, src: [f32; 4], dest: [f32; 4]) -> [f32; 4] {
        let fs = self.src_factor.resolve(src[3], dest[3]);
        let fd = self.dest_factor.resolve(src[3], dest[3]);

        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = src[i] * fs + dest[i] * fd;
        }

        out
    }
}

/// How a draw is combined with the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Blend {
    /// Fixed-function Porter-Duff compositing.
    Composite(CompositeOp),
    /// A blend mode evaluated in the fragment stage against a snapshot of the destination.
    Mix(BlendMode),
}

impl Default for Blend {
    fn default() -> Self {
        Self::Composite(CompositeOp::SrcOver)
    }
}

impl Blend {
    /// Whether draws with this blend have to sample the destination.
    ///
    /// Such draws need a second buffer holding a copy of the draw target, since a target can't
    /// be read while it is being rendered to.
    pub fn needs_readable_framebuffer(self) -> bool {
        matches!(self, Self::Mix(_))
    }

    /// Whether the destination is irrelevant where the source is fully opaque.
    pub fn occludes_backdrop(self) -> bool {
        matches!(
            self,
            Self::Composite(CompositeOp::SrcOver | CompositeOp::Clear | CompositeOp::Copy)
        )
    }
}

impl From<CompositeOp> for Blend {
    fn from(op: CompositeOp) -> Self {
        Self::Composite(op)
    }
}

impl From<BlendMode> for Blend {
    fn from(mode: BlendMode) -> Self {
        Self::Mix(mode)
    }
}

impl From<BlendMode> for Mix {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::Normal => Self::Normal,
            BlendMode::Multiply => Self::Multiply,
            BlendMode::Screen => Self::Screen,
            BlendMode::Overlay => Self::Overlay,
            BlendMode::Darken => Self::Darken,
            BlendMode::Lighten => Self::Lighten,
            BlendMode::ColorDodge => Self::ColorDodge,
            BlendMode::ColorBurn => Self::ColorBurn,
            BlendMode::HardLight => Self::HardLight,
            BlendMode::SoftLight => Self::SoftLight,
            BlendMode::Difference => Self::Difference,
            BlendMode::Exclusion => Self::Exclusion,
            BlendMode::Hue => Self::Hue,
            BlendMode::Saturation => Self::Saturation,
            BlendMode::Color => Self::Color,
            BlendMode::Luminosity => Self::Luminosity,
        }
    }
}

impl From<CompositeOp> for Compose {
    fn from(op: CompositeOp) -> Self {
        match op {
            CompositeOp::Clear => Self::Clear,
            CompositeOp::Copy => Self::Copy,
            CompositeOp::SrcOver => Self::SrcOver,
            CompositeOp::DestOver => Self::DestOver,
            CompositeOp::SrcIn => Self::SrcIn,
            CompositeOp::DestIn => Self::DestIn,
            CompositeOp::SrcOut => Self::SrcOut,
            CompositeOp::DestOut => Self::DestOut,
            CompositeOp::SrcAtop => Self::SrcAtop,
            CompositeOp::DestAtop => Self::DestAtop,
            CompositeOp::Xor => Self::Xor,
            CompositeOp::Lighter => Self::Plus,
        }
    }
}

impl From<Blend> for peniko::BlendMode {
    fn from(blend: Blend) -> Self {
        match blend {
            Blend::Composite(op) => Self::new(Mix::Normal, op.into()),
            Blend::Mix(mode) => Self::new(mode.into(), Compose::SrcOver),
        }
    }
}

impl TryFrom<peniko::BlendMode> for Blend {
    type Error = Error;

    /// Normal mixing maps to a [`CompositeOp`], any other mix mode is only supported with
    /// source-over composition.
    fn try_from(blend: peniko::BlendMode) -> Result<Self, Error> {
        let unsupported = || Error::UnsupportedBlend(blend);

        if blend.mix == Mix::Normal {
            let op = match blend.compose {
                Compose::Clear => CompositeOp::Clear,
                Compose::Copy => CompositeOp::Copy,
                Compose::SrcOver => CompositeOp::SrcOver,
                Compose::DestOver => CompositeOp::DestOver,
                Compose::SrcIn => CompositeOp::SrcIn,
                Compose::DestIn => CompositeOp::DestIn,
                Compose::SrcOut => CompositeOp::SrcOut,
                Compose::DestOut => CompositeOp::DestOut,
                Compose::SrcAtop => CompositeOp::SrcAtop,
                Compose::DestAtop => CompositeOp::DestAtop,
                Compose::Xor => CompositeOp::Xor,
                Compose::Plus => CompositeOp::Lighter,
                _ => return Err(unsupported()),
            };

            return Ok(Self::Composite(op));
        }

        if blend.compose != Compose::SrcOver {
            return Err(unsupported());
        }

        let mode = match blend.mix {
            Mix::Multiply => BlendMode::Multiply,
            Mix::Screen => BlendMode::Screen,
            Mix::Overlay => BlendMode::Overlay,
            Mix::Darken => BlendMode::Darken,
            Mix::Lighten => BlendMode::Lighten,
            Mix::ColorDodge => BlendMode::ColorDodge,
            Mix::ColorBurn => BlendMode::ColorBurn,
            Mix::HardLight => BlendMode::HardLight,
            Mix::SoftLight => BlendMode::SoftLight,
            Mix::Difference => BlendMode::Difference,
            Mix::Exclusion => BlendMode::Exclusion,
            Mix::Hue => BlendMode::Hue,
            Mix::Saturation => BlendMode::Saturation,
            Mix::Color => BlendMode::Color,
            Mix::Luminosity => BlendMode::Luminosity,
            _ => return Err(unsupported()),
        };

        Ok(Self::Mix(mode))
    }
}
