//! Color-distance background keying.
//!
//! Pixels close to a reference color (white, black or one picked from the
//! design's corners) have their alpha faded out over a soft band. Color
//! channels are never touched.

use std::str::FromStr;

use tracing::debug;

use crate::raster::{channel, luma, Channel, Raster, ALPHA};

/// Width of the soft band, as a multiple of the removal threshold.
pub const SOFT_BAND_FACTOR: f32 = 1.6;
/// Bounds of the square corner patch sampled in [`BackgroundMode::Auto`].
pub const AUTO_PATCH_MIN: u32 = 6;
pub const AUTO_PATCH_MAX: u32 = 20;
/// Mean corner luma above which the background is taken to be white.
pub const AUTO_WHITE_LUMA: f32 = 127.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundMode {
    None,
    #[default]
    Auto,
    White,
    Black,
}

impl FromStr for BackgroundMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "auto" => Ok(Self::Auto),
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            other => Err(format!("unknown bg_mode {other:?} (expected none, auto, white or black)")),
        }
    }
}

/// Returns a copy of `design` with alpha reduced where its color is within
/// `threshold` percent of the background color.
pub fn key_background(design: &Raster, mode: BackgroundMode, threshold: u8) -> Raster {
    let reference: [f32; 3] = match mode {
        BackgroundMode::None => return design.clone(),
        BackgroundMode::White => [255.0; 3],
        BackgroundMode::Black => [0.0; 3],
        BackgroundMode::Auto => {
            if corner_luma(design) > AUTO_WHITE_LUMA {
                [255.0; 3]
            } else {
                [0.0; 3]
            }
        }
    };
    debug!(?mode, ?reference, threshold, "Keying design background");

    let t0 = f32::from(threshold.min(100)) / 100.0 * 255.0;
    let t1 = t0 * SOFT_BAND_FACTOR;

    let mut out = design.clone();
    for px in out.pixels_mut() {
        let distance = Channel::COLOR
            .iter()
            .map(|&ch| {
                let d = f32::from(channel(px, ch)) - reference[ch.index()];
                d * d
            })
            .sum::<f32>()
            .sqrt();
        let keep = soft_keep(distance, t0, t1);
        px.0[ALPHA] = (f32::from(px.0[ALPHA]) * keep).round() as u8;
    }
    out
}

/// Alpha multiplier for a pixel `distance` away from the background color.
fn soft_keep(distance: f32, t0: f32, t1: f32) -> f32 {
    if t1 - t0 <= f32::EPSILON {
        // Zero-width band: hard cut at t0.
        return if distance > t0 { 1.0 } else { 0.0 };
    }
    ((distance - t0) / (t1 - t0)).clamp(0.0, 1.0)
}

/// Mean luma over the four corner patches of `design`.
fn corner_luma(design: &Raster) -> f32 {
    let (w, h) = design.dimensions();
    let patch = (w.min(h) / 10)
        .clamp(AUTO_PATCH_MIN, AUTO_PATCH_MAX)
        .min(w)
        .min(h);
    let origins = [(0, 0), (w - patch, 0), (0, h - patch), (w - patch, h - patch)];

    let mut sum = 0.0f64;
    let mut count = 0u64;
    for (ox, oy) in origins {
        for y in oy..oy + patch {
            for x in ox..ox + patch {
                sum += f64::from(luma(design.get_pixel(x, y)));
                count += 1;
            }
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64) as f32
}
