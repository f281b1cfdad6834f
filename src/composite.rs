//! Region-restricted compositing of the warped design into the photo.
//!
//! All work happens inside the photo's non-transparent bounding box. The
//! box is fully opaque in the result; everything outside it is copied from
//! the input photo untouched.

use tracing::{debug, instrument};

use crate::error::RenderError;
use crate::geometry::{PhotoSpace, Quad};
use crate::raster::{BoundingBox, Channel, Raster, ALPHA};
use crate::shading::apply_surface_detail;
use crate::warp::warp_design;

/// Opacity below which shading is switched off even when requested; shading
/// a faint design reads as noise rather than texture.
pub const MIN_SHADING_OPACITY: f32 = 0.75;

/// How the warped design is blended into the photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blend {
    pub opacity: f32,
    pub shading: bool,
    pub shading_strength: f32,
}

impl Blend {
    /// Whether the shading pass actually runs for this blend.
    pub fn shading_enabled(&self) -> bool {
        self.shading && self.opacity >= MIN_SHADING_OPACITY
    }
}

/// Paints `design` onto `photo` so that its corners land on `quad`.
#[instrument(skip_all, fields(photo = ?photo.dimensions(), design = ?design.dimensions()))]
pub fn composite(
    photo: &Raster,
    design: &Raster,
    quad: &Quad<PhotoSpace>,
    blend: &Blend,
) -> Result<Raster, RenderError> {
    let bbox = BoundingBox::of_visible(photo);
    let crop = bbox.crop(photo);
    debug!(?bbox, "Compositing inside photo bounding box");

    let dst = quad.to_crop_space(&bbox);
    let mut warped = warp_design(design, &dst, crop.width(), crop.height())?;

    let opacity = blend.opacity.clamp(0.0, 1.0);
    for px in warped.pixels_mut() {
        px.0[ALPHA] = (f32::from(px.0[ALPHA]) * opacity).round() as u8;
    }

    if blend.shading_enabled() {
        // Shading leaves alpha as it found it.
        warped = apply_surface_detail(&warped, &crop, blend.shading_strength);
    } else if blend.shading {
        debug!(opacity, "Shading skipped at low opacity");
    }

    let mut region = crop;
    for (px, design_px) in region.pixels_mut().zip(warped.pixels()) {
        let a = f32::from(design_px.0[ALPHA]) / 255.0;
        for ch in Channel::COLOR {
            let i = ch.index();
            let mixed = f32::from(px.0[i]) * (1.0 - a) + f32::from(design_px.0[i]) * a;
            px.0[i] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        px.0[ALPHA] = u8::MAX;
    }

    let mut out = photo.clone();
    bbox.paste(&mut out, &region);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use image::Rgba;

    const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Quad<PhotoSpace> {
        Quad::new([
            Point2D::new(x0, y0),
            Point2D::new(x1, y0),
            Point2D::new(x1, y1),
            Point2D::new(x0, y1),
        ])
    }

    fn blend(opacity: f32, shading: bool) -> Blend {
        Blend { opacity, shading, shading_strength: 0.6 }
    }

    /// 60x60 photo: transparent border of 10px around a textured opaque body.
    fn padded_photo() -> Raster {
        Raster::from_fn(60, 60, |x, y| {
            if (10..50).contains(&x) && (10..50).contains(&y) {
                let v = if (x + y) % 6 == 0 { 90 } else { 160 };
                Rgba([v, v, v + 20, 255])
            } else {
                Rgba([x as u8, y as u8, 7, 0])
            }
        })
    }

    #[test]
    fn red_square_on_gray_photo() {
        let photo = Raster::from_pixel(100, 100, GRAY);
        let design = Raster::from_pixel(50, 50, RED);
        let out = composite(&photo, &design, &square(25.0, 25.0, 75.0, 75.0), &blend(1.0, false)).unwrap();

        for (x, y, p) in out.enumerate_pixels() {
            let covered = (25..=75).contains(&x) && (25..=75).contains(&y);
            let want = if covered { RED } else { GRAY };
            assert_eq!(*p, want, "({x}, {y})");
        }
    }

    #[test]
    fn pixels_outside_bounding_box_are_untouched() {
        let photo = padded_photo();
        let design = Raster::from_pixel(20, 20, RED);
        // The quad spills over the transparent border on purpose.
        let quad = square(0.0, 5.0, 45.0, 55.0);
        let out = composite(&photo, &design, &quad, &blend(0.9, true)).unwrap();

        let bbox = BoundingBox { x0: 10, y0: 10, x1: 50, y1: 50 };
        for (x, y, p) in out.enumerate_pixels() {
            if bbox.contains(x, y) {
                assert_eq!(p.0[ALPHA], 255);
            } else {
                assert_eq!(p, photo.get_pixel(x, y), "({x}, {y})");
            }
        }
    }

    #[test]
    fn zero_opacity_keeps_crop_colors() {
        let photo = padded_photo();
        let design = Raster::from_pixel(20, 20, RED);
        let quad = square(12.0, 12.0, 48.0, 48.0);
        let out = composite(&photo, &design, &quad, &blend(0.0, true)).unwrap();
        for (x, y, p) in out.enumerate_pixels() {
            assert_eq!(&p.0[..3], &photo.get_pixel(x, y).0[..3]);
        }
    }

    #[test]
    fn higher_opacity_shows_more_design() {
        let photo = Raster::from_pixel(40, 40, GRAY);
        let design = Raster::from_pixel(20, 20, RED);
        let quad = square(5.0, 5.0, 35.0, 35.0);
        let mut last_red = 0u8;
        let mut last_green = u8::MAX;
        for opacity in [0.0, 0.2, 0.5, 0.8, 1.0] {
            let out = composite(&photo, &design, &quad, &blend(opacity, false)).unwrap();
            let p = out.get_pixel(20, 20);
            assert!(p.0[0] >= last_red && p.0[1] <= last_green, "opacity {opacity}: {p:?}");
            last_red = p.0[0];
            last_green = p.0[1];
        }
        assert_eq!(last_red, 255);
    }

    #[test]
    fn low_opacity_ignores_shading_request() {
        let photo = padded_photo();
        let design = Raster::from_pixel(20, 20, Rgba([30, 160, 220, 255]));
        let quad = square(12.0, 14.0, 47.0, 45.0);
        let requested = composite(&photo, &design, &quad, &blend(0.6, true)).unwrap();
        let explicit = composite(&photo, &design, &quad, &blend(0.6, false)).unwrap();
        assert_eq!(requested, explicit);
        assert!(!blend(0.6, true).shading_enabled());
        assert!(blend(0.75, true).shading_enabled());
    }

    #[test]
    fn shading_does_not_touch_uncovered_pixels() {
        let photo = padded_photo();
        let design = Raster::from_pixel(20, 20, Rgba([30, 160, 220, 255]));
        let quad = square(20.0, 20.0, 40.0, 40.0);
        let shaded = composite(&photo, &design, &quad, &blend(1.0, true)).unwrap();
        let flat = composite(&photo, &design, &quad, &blend(1.0, false)).unwrap();

        let bbox = BoundingBox::of_visible(&photo);
        let warped = warp_design(&design, &quad.to_crop_space(&bbox), bbox.width(), bbox.height()).unwrap();
        let mut differs = false;
        for (x, y, w) in warped.enumerate_pixels() {
            let (px, py) = (x + bbox.x0, y + bbox.y0);
            if w.0[ALPHA] == 0 {
                assert_eq!(shaded.get_pixel(px, py), flat.get_pixel(px, py), "({px}, {py})");
            } else {
                differs |= shaded.get_pixel(px, py) != flat.get_pixel(px, py);
            }
        }
        assert!(differs, "shading had no visible effect");
    }

    #[test]
    fn degenerate_quad_is_an_error() {
        let photo = Raster::from_pixel(20, 20, GRAY);
        let design = Raster::from_pixel(10, 10, RED);
        let quad = square(5.0, 5.0, 5.0, 15.0);
        assert!(matches!(
            composite(&photo, &design, &quad, &blend(1.0, false)),
            Err(RenderError::DegenerateQuad(_))
        ));
    }
}
