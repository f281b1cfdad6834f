//! In-memory raster helpers: named color channels, luma and the
//! non-transparent bounding box of a photo.
//!
//! Rasters are straight-alpha RGBA, 8 bits per channel, in the channel order
//! the `image` crate uses. Code that touches individual color channels goes
//! through [`Channel`] rather than positional indices.

use image::{Rgba, RgbaImage};

/// Four-channel, straight-alpha raster.
pub type Raster = RgbaImage;

/// Index of the alpha channel within a pixel.
pub const ALPHA: usize = 3;

/// A color channel of a [`Raster`] pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// The three color channels, in storage order.
    pub const COLOR: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Position of this channel within an RGBA pixel.
    pub const fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    /// Weight of this channel in perceptual luma (BT.601).
    pub const fn luma_weight(self) -> f32 {
        match self {
            Channel::Red => 0.299,
            Channel::Green => 0.587,
            Channel::Blue => 0.114,
        }
    }
}

/// Reads one color channel of a pixel.
#[inline]
pub fn channel(px: &Rgba<u8>, ch: Channel) -> u8 {
    px.0[ch.index()]
}

/// Perceptual luma of a pixel in `0.0..=255.0`, ignoring alpha.
pub fn luma(px: &Rgba<u8>) -> f32 {
    Channel::COLOR
        .iter()
        .map(|&ch| ch.luma_weight() * f32::from(channel(px, ch)))
        .sum()
}

/// Rewrites every color channel of every pixel through `f(x, y, channel, value)`.
///
/// Alpha is never passed to `f` and is left untouched.
pub fn for_each_channel<F>(raster: &mut Raster, mut f: F)
where
    F: FnMut(u32, u32, Channel, u8) -> u8,
{
    for (x, y, px) in raster.enumerate_pixels_mut() {
        for ch in Channel::COLOR {
            let i = ch.index();
            px.0[i] = f(x, y, ch, px.0[i]);
        }
    }
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BoundingBox {
    /// The whole of a `width x height` raster.
    pub fn full(width: u32, height: u32) -> Self {
        Self { x0: 0, y0: 0, x1: width, y1: height }
    }

    /// Tight box around every pixel with non-zero alpha.
    ///
    /// Falls back to the full raster when nothing is visible, so an opaque or
    /// fully transparent photo is processed as a whole.
    pub fn of_visible(raster: &Raster) -> Self {
        let mut bounds: Option<Self> = None;
        for (x, y, px) in raster.enumerate_pixels() {
            if px.0[ALPHA] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => Self { x0: x, y0: y, x1: x + 1, y1: y + 1 },
                Some(b) => Self {
                    x0: b.x0.min(x),
                    y0: b.y0.min(y),
                    x1: b.x1.max(x + 1),
                    y1: b.y1.max(y + 1),
                },
            });
        }
        bounds.unwrap_or_else(|| Self::full(raster.width(), raster.height()))
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Copies the boxed region out of `raster`.
    pub fn crop(&self, raster: &Raster) -> Raster {
        image::imageops::crop_imm(raster, self.x0, self.y0, self.width(), self.height()).to_image()
    }

    /// Writes `region` back over `raster` at this box's origin.
    pub fn paste(&self, raster: &mut Raster, region: &Raster) {
        image::imageops::replace(raster, region, i64::from(self.x0), i64::from(self.y0));
    }
}
