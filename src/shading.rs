//! Surface-detail shading.
//!
//! The photo's grayscale is divided by a heavily blurred copy of itself,
//! which leaves the local fold and weave texture while cancelling the overall
//! lighting. Multiplying the design by that ratio makes it follow the fabric
//! without darkening or washing it out as a whole.

use image::{ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::raster::{for_each_channel, luma, Raster, ALPHA};

/// Sigma of the low-frequency lighting estimate.
pub const LIGHTING_SIGMA: f32 = 15.0;
/// Sigma of the denoising pass over the detail ratio.
pub const DETAIL_SIGMA: f32 = 1.2;
/// Floor for the lighting estimate before dividing by it.
const MIN_LIGHTING: f32 = 1e-3;
/// Bounds of the detail ratio.
pub const DETAIL_MIN: f32 = 0.75;
pub const DETAIL_MAX: f32 = 1.25;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Per-pixel multiplier field derived from the surface's local texture.
///
/// Values are `1.0` everywhere at `strength == 0`, and lie within
/// `DETAIL_MIN..=DETAIL_MAX` at full strength.
pub fn shade_field(surface: &Raster, strength: f32) -> GrayF32 {
    let strength = strength.clamp(0.0, 1.0);
    let (w, h) = surface.dimensions();
    let gray: GrayF32 = ImageBuffer::from_fn(w, h, |x, y| Luma([luma(surface.get_pixel(x, y)) / 255.0]));

    let lighting = gaussian_blur_f32(&gray, LIGHTING_SIGMA);
    let ratio: GrayF32 = ImageBuffer::from_fn(w, h, |x, y| {
        let g = gray.get_pixel(x, y).0[0];
        let l = lighting.get_pixel(x, y).0[0].max(MIN_LIGHTING);
        Luma([g / l])
    });

    let mut field = gaussian_blur_f32(&ratio, DETAIL_SIGMA);
    for px in field.pixels_mut() {
        let detail = px.0[0].clamp(DETAIL_MIN, DETAIL_MAX);
        px.0[0] = (1.0 - strength) + strength * detail;
    }
    field
}

/// Imprints the texture of `surface` onto `design`.
///
/// Only pixels where the design has non-zero alpha are shaded; everything
/// else, and alpha itself, is returned unchanged. `surface` must have the
/// same dimensions as `design`.
pub fn apply_surface_detail(design: &Raster, surface: &Raster, strength: f32) -> Raster {
    debug_assert_eq!(design.dimensions(), surface.dimensions());
    let field = shade_field(surface, strength);
    debug!(strength, "Applying surface detail");

    let mut out = design.clone();
    for_each_channel(&mut out, |x, y, _, v| {
        if design.get_pixel(x, y).0[ALPHA] == 0 {
            return v;
        }
        let shade = field.get_pixel(x, y).0[0];
        (f32::from(v) * shade).round().clamp(0.0, 255.0) as u8
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Mid-gray surface with dark vertical creases every 8 pixels.
    fn creased_surface(w: u32, h: u32) -> Raster {
        Raster::from_fn(w, h, |x, _| {
            if x % 8 == 0 {
                Rgba([70, 70, 70, 255])
            } else {
                Rgba([150, 150, 150, 255])
            }
        })
    }

    #[test]
    fn zero_strength_is_identity() {
        let design = Raster::from_pixel(32, 32, Rgba([200, 100, 50, 255]));
        let out = apply_surface_detail(&design, &creased_surface(32, 32), 0.0);
        assert_eq!(out, design);
    }

    #[test]
    fn flat_surface_leaves_design_nearly_unchanged() {
        let design = Raster::from_pixel(32, 32, Rgba([200, 100, 50, 255]));
        let surface = Raster::from_pixel(32, 32, Rgba([90, 90, 90, 255]));
        let out = apply_surface_detail(&design, &surface, 1.0);
        for p in out.pixels() {
            assert!(p.0[0].abs_diff(200) <= 1 && p.0[1].abs_diff(100) <= 1 && p.0[2].abs_diff(50) <= 1);
            assert_eq!(p.0[ALPHA], 255);
        }
    }

    #[test]
    fn creases_darken_the_design() {
        let design = Raster::from_pixel(48, 48, Rgba([200, 200, 200, 255]));
        let out = apply_surface_detail(&design, &creased_surface(48, 48), 1.0);
        let crease = out.get_pixel(24, 24).0[0];
        let flat = out.get_pixel(28, 24).0[0];
        assert!(crease < flat, "crease {crease} should be darker than {flat}");
        // The ratio is bounded, so shading never goes below 75%.
        assert!(crease >= 149);
    }

    #[test]
    fn field_stays_within_bounds() {
        let field = shade_field(&creased_surface(40, 40), 0.6);
        let lo = 0.4 + 0.6 * DETAIL_MIN;
        let hi = 0.4 + 0.6 * DETAIL_MAX;
        assert!(field.pixels().all(|p| p.0[0] >= lo - 1e-6 && p.0[0] <= hi + 1e-6));
    }

    #[test]
    fn transparent_pixels_are_not_shaded() {
        let mut design = Raster::from_pixel(32, 32, Rgba([200, 200, 200, 255]));
        for y in 0..32 {
            for x in 0..16 {
                design.put_pixel(x, y, Rgba([200, 200, 200, 0]));
            }
        }
        let out = apply_surface_detail(&design, &creased_surface(32, 32), 1.0);
        for (x, y, p) in out.enumerate_pixels() {
            if x < 16 {
                assert_eq!(p, design.get_pixel(x, y));
            } else {
                assert_eq!(p.0[ALPHA], 255);
            }
        }
        // Column 24 is a crease inside the footprint.
        assert_ne!(out.get_pixel(24, 10), design.get_pixel(24, 10));
    }
}
