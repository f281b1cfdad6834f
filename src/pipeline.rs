//! One mockup request, from uploaded bytes to encoded PNG.

use tracing::{debug, instrument};

use crate::codec;
use crate::composite::{composite, Blend};
use crate::error::{RenderError, Upload};
use crate::geometry::{PhotoSpace, Quad};
use crate::keying::{key_background, BackgroundMode};

pub const DEFAULT_OPACITY: f32 = 0.95;
pub const DEFAULT_SHADING_STRENGTH: f32 = 0.6;
pub const DEFAULT_BG_THRESHOLD: u8 = 35;

/// Caller-tunable rendering options.
///
/// Construct through [`RenderConfig::new`] (or `default()`) so every numeric
/// field is within range; out-of-range input is clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub opacity: f32,
    pub shading: bool,
    pub shading_strength: f32,
    pub bg_mode: BackgroundMode,
    pub bg_threshold: u8,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            shading: true,
            shading_strength: DEFAULT_SHADING_STRENGTH,
            bg_mode: BackgroundMode::Auto,
            bg_threshold: DEFAULT_BG_THRESHOLD,
        }
    }
}

impl RenderConfig {
    pub fn new(
        opacity: f32,
        shading: bool,
        shading_strength: f32,
        bg_mode: BackgroundMode,
        bg_threshold: f64,
    ) -> Self {
        let bg_threshold = if bg_threshold.is_nan() {
            DEFAULT_BG_THRESHOLD
        } else {
            bg_threshold.round().clamp(0.0, 100.0) as u8
        };
        Self {
            opacity: unit_or(opacity, DEFAULT_OPACITY),
            shading,
            shading_strength: unit_or(shading_strength, DEFAULT_SHADING_STRENGTH),
            bg_mode,
            bg_threshold,
        }
    }
}

/// Clamps to `0.0..=1.0`, substituting `fallback` for NaN.
fn unit_or(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Renders `design` onto `photo` inside `quad` and returns the PNG bytes.
///
/// Pure CPU work; call it from a blocking context.
#[instrument(skip(photo, design), fields(photo_bytes = photo.len(), design_bytes = design.len()))]
pub fn render(
    photo: &[u8],
    design: &[u8],
    quad: &Quad<PhotoSpace>,
    config: &RenderConfig,
) -> Result<Vec<u8>, RenderError> {
    let photo = codec::decode(photo).map_err(|source| RenderError::Decode { upload: Upload::Photo, source })?;
    let design = codec::decode(design).map_err(|source| RenderError::Decode { upload: Upload::Design, source })?;

    let design = key_background(&design, config.bg_mode, config.bg_threshold);
    let blend = Blend {
        opacity: config.opacity,
        shading: config.shading,
        shading_strength: config.shading_strength,
    };
    let out = composite(&photo, &design, quad, &blend)?;

    let png = codec::encode(&out)?;
    debug!(bytes = png.len(), "Mockup rendered");
    Ok(png)
}
