// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-channel blend functions. See <https://www.w3.org/TR/compositing-1/#blending> for
//! the corresponding formulas.
//!
//! Every [`BlendMode`] is backed by a zero-sized kernel type implementing [`MixKernel`].
//! The compositing equation in [`compose`](crate::compose) is generic over the kernel, so
//! each mode ends up as its own monomorphized variant of the fragment stage. The
//! [`BlendMode`] identifier selects the variant at draw time through [`BlendMode::dispatch`].

/// A straight (non-premultiplied) RGB triple.
pub type Rgb = [f32; 3];

/// The blend modes that are computed in the fragment stage from a destination read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// The source color replaces the destination color.
    #[default]
    Normal,
    /// The source color is multiplied by the destination color.
    Multiply,
    /// Complements of source and destination are multiplied, then complemented.
    Screen,
    /// Multiplies or screens the colors, depending on the destination color.
    Overlay,
    /// The darker of source and destination, per channel.
    Darken,
    /// The lighter of source and destination, per channel.
    Lighten,
    /// Brightens the destination color to reflect the source color.
    ColorDodge,
    /// Darkens the destination color to reflect the source color.
    ColorBurn,
    /// Multiplies or screens the colors, depending on the source color.
    HardLight,
    /// Darkens or lightens the colors, depending on the source color.
    SoftLight,
    /// The absolute difference of source and destination, per channel.
    Difference,
    /// Like [`BlendMode::Difference`], but with lower contrast.
    Exclusion,
    /// The hue of the source with the saturation and luminosity of the destination.
    Hue,
    /// The saturation of the source with the hue and luminosity of the destination.
    Saturation,
    /// The hue and saturation of the source with the luminosity of the destination.
    Color,
    /// The luminosity of the source with the hue and saturation of the destination.
    Luminosity,
}

impl BlendMode {
    /// All blend modes, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Normal,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
        Self::Hue,
        Self::Saturation,
        Self::Color,
        Self::Luminosity,
    ];

    /// Whether the blend function operates on each channel independently.
    pub fn is_separable(self) -> bool {
        !matches!(
            self,
            Self::Hue | Self::Saturation | Self::Color | Self::Luminosity
        )
    }

    /// Compute the blended term for this mode.
    ///
    /// This goes through [`BlendMode::dispatch`], so it evaluates exactly the same kernel
    /// as the monomorphized rendering path.
    pub fn combine(self, dest: Rgb, src: Rgb) -> Rgb {
        struct Combine(Rgb, Rgb);

        impl MixVisitor for Combine {
            type Output = Rgb;

            fn visit<K: MixKernel>(self) -> Rgb {
                K::combine(self.0, self.1)
            }
        }

        self.dispatch(Combine(dest, src))
    }

    /// Select the kernel for this mode and hand it to `visitor`.
    pub fn dispatch<V: MixVisitor>(self, visitor: V) -> V::Output {
        match self {
            Self::Normal => visitor.visit::<Normal>(),
            Self::Multiply => visitor.visit::<Multiply>(),
            Self::Screen => visitor.visit::<Screen>(),
            Self::Overlay => visitor.visit::<Overlay>(),
            Self::Darken => visitor.visit::<Darken>(),
            Self::Lighten => visitor.visit::<Lighten>(),
            Self::ColorDodge => visitor.visit::<ColorDodge>(),
            Self::ColorBurn => visitor.visit::<ColorBurn>(),
            Self::HardLight => visitor.visit::<HardLight>(),
            Self::SoftLight => visitor.visit::<SoftLight>(),
            Self::Difference => visitor.visit::<Difference>(),
            Self::Exclusion => visitor.visit::<Exclusion>(),
            Self::Hue => visitor.visit::<Hue>(),
            Self::Saturation => visitor.visit::<Saturation>(),
            Self::Color => visitor.visit::<Color>(),
            Self::Luminosity => visitor.visit::<Luminosity>(),
        }
    }
}

/// A pure blend function over the destination and source colors.
///
/// Both inputs are straight colors. The result is the `blended` term of the compositing
/// equation, which only applies where source and destination overlap.
pub trait MixKernel {
    /// The identifier this kernel implements.
    const MODE: BlendMode;

    /// Combine the destination and source colors.
    fn combine(dest: Rgb, src: Rgb) -> Rgb;
}

/// Receives the kernel selected by [`BlendMode::dispatch`].
pub trait MixVisitor {
    /// The value produced by the visit.
    type Output;

    /// Called with the kernel matching the dispatched mode.
    fn visit<K: MixKernel>(self) -> Self::Output;
}

macro_rules! separable_mix {
    ($(#[$attr:meta])* $name:ident, $calc:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl MixKernel for $name {
            const MODE: BlendMode = BlendMode::$name;

            #[inline(always)]
            fn combine(dest: Rgb, src: Rgb) -> Rgb {
                let calc: fn(f32, f32) -> f32 = $calc;

                [
                    calc(dest[0], src[0]),
                    calc(dest[1], src[1]),
                    calc(dest[2], src[2]),
                ]
            }
        }
    };
}

macro_rules! non_separable_mix {
    ($(#[$attr:meta])* $name:ident, $calc:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl MixKernel for $name {
            const MODE: BlendMode = BlendMode::$name;

            #[inline(always)]
            fn combine(dest: Rgb, src: Rgb) -> Rgb {
                let calc: fn(Rgb, Rgb) -> Rgb = $calc;
                calc(dest, src)
            }
        }
    };
}

#[inline(always)]
fn multiply(cb: f32, cs: f32) -> f32 {
    cb * cs
}

#[inline(always)]
fn screen(cb: f32, cs: f32) -> f32 {
    cb + cs - cb * cs
}

#[inline(always)]
fn hard_light(cb: f32, cs: f32) -> f32 {
    if cs <= 0.5 {
        multiply(cb, 2.0 * cs)
    } else {
        screen(cb, 2.0 * cs - 1.0)
    }
}

separable_mix!(
    /// The source color.
    Normal,
    |_, cs| cs
);
separable_mix!(Multiply, multiply);
separable_mix!(Screen, screen);
separable_mix!(
    /// Hard light with the roles of source and destination swapped.
    Overlay,
    |cb, cs| hard_light(cs, cb)
);
separable_mix!(Darken, |cb: f32, cs: f32| cb.min(cs));
separable_mix!(Lighten, |cb: f32, cs: f32| cb.max(cs));
separable_mix!(ColorDodge, |cb, cs| {
    if cb == 0.0 {
        0.0
    } else if cs == 1.0 {
        1.0
    } else {
        (cb / (1.0 - cs)).min(1.0)
    }
});
separable_mix!(ColorBurn, |cb, cs| {
    if cb == 1.0 {
        1.0
    } else if cs == 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - cb) / cs).min(1.0)
    }
});
separable_mix!(HardLight, hard_light);
separable_mix!(SoftLight, |cb: f32, cs: f32| {
    let d = if cb <= 0.25 {
        ((16.0 * cb - 12.0) * cb + 4.0) * cb
    } else {
        cb.sqrt()
    };

    if cs <= 0.5 {
        cb - (1.0 - 2.0 * cs) * cb * (1.0 - cb)
    } else {
        cb + (2.0 * cs - 1.0) * (d - cb)
    }
});
separable_mix!(
    /// `|dest - src|` per channel.
    Difference,
    |cb: f32, cs: f32| (cb - cs).abs()
);
separable_mix!(
    /// `dest + src - 2 * dest * src` per channel.
    Exclusion,
    |cb, cs| (cb + cs) - 2.0 * (cb * cs)
);

non_separable_mix!(Hue, |cb, cs| set_lum(set_sat(cs, sat(cb)), lum(cb)));
non_separable_mix!(Saturation, |cb, cs| set_lum(
    set_sat(cb, sat(cs)),
    lum(cb)
));
non_separable_mix!(Color, |cb, cs| set_lum(cs, lum(cb)));
non_separable_mix!(Luminosity, |cb, cs| set_lum(cb, lum(cs)));

fn lum(c: Rgb) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn sat(c: Rgb) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn clip_color(mut c: Rgb) -> Rgb {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);

    for c in &mut c {
        if n < 0.0 {
            *c = l + (((*c - l) * l) / (l - n));
        }

        if x > 1.0 {
            *c = l + (((*c - l) * (1.0 - l)) / (x - l));
        }
    }

    c
}

fn set_lum(c: Rgb, l: f32) -> Rgb {
    let d = l - lum(c);

    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

// Maps the minimum channel to 0 and the maximum to `s`, scaling the middle one proportionally.
fn set_sat(c: Rgb, s: f32) -> Rgb {
    let min = c[0].min(c[1]).min(c[2]);
    let max = c[0].max(c[1]).max(c[2]);
    let range = max - min;

    c.map(|c| {
        if range == 0.0 {
            0.0
        } else {
            (c - min) * s / range
        }
    })
}
