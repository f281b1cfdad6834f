//! Perspective warp of the design onto a destination quadrilateral.

use image::Rgba;
use tracing::debug;

use crate::error::RenderError;
use crate::geometry::{CropSpace, DesignSpace, Point2D, Quad};
use crate::raster::Raster;

/// Pixel written wherever the warp has no design coverage.
const UNMAPPED: Rgba<u8> = Rgba([0, 0, 0, 0]);
/// Inverse-mapped coordinates this close to the design edge are snapped onto it.
const EDGE_SNAP: f64 = 1e-6;

/// Projective transform from design pixels to crop pixels, row-major with
/// the bottom-right entry fixed at 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: [f64; 9],
}

impl Homography {
    /// Solves for the transform taking each `src` corner onto the matching
    /// `dst` corner.
    pub fn from_quads(src: &Quad<DesignSpace>, dst: &Quad<CropSpace>) -> Result<Self, RenderError> {
        if src.is_degenerate() {
            return Err(RenderError::DegenerateQuad("design corners are collinear"));
        }
        if dst.is_degenerate() {
            return Err(RenderError::DegenerateQuad("three destination points are collinear"));
        }

        // h33 = 1 leaves eight unknowns, two equations per correspondence.
        let mut a = [[0.0f64; 9]; 8];
        for (i, (s, d)) in src.corners.iter().zip(&dst.corners).enumerate() {
            a[2 * i] = [s.x, s.y, 1.0, 0.0, 0.0, 0.0, -s.x * d.x, -s.y * d.x, d.x];
            a[2 * i + 1] = [0.0, 0.0, 0.0, s.x, s.y, 1.0, -s.x * d.y, -s.y * d.y, d.y];
        }
        let h = solve_augmented(a).ok_or(RenderError::DegenerateQuad("no unique perspective transform"))?;

        let m = [h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0];
        if m.iter().any(|v| !v.is_finite()) {
            return Err(RenderError::DegenerateQuad("perspective transform is not finite"));
        }
        Ok(Self { m })
    }

    /// Maps a design-space point into crop space.
    pub fn apply(&self, p: Point2D<DesignSpace>) -> Point2D<CropSpace> {
        let m = &self.m;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        Point2D::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        )
    }

    /// The transform taking crop pixels back into the design.
    pub fn inverse(&self) -> Result<InverseHomography, RenderError> {
        let [a, b, c, d, e, f, g, h, i] = self.m;
        let det = a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g);
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(RenderError::DegenerateQuad("perspective transform is not invertible"));
        }
        let adj = [
            e * i - f * h,
            c * h - b * i,
            b * f - c * e,
            f * g - d * i,
            a * i - c * g,
            c * d - a * f,
            d * h - e * g,
            b * g - a * h,
            a * e - b * d,
        ];
        Ok(InverseHomography { m: adj.map(|v| v / det) })
    }
}

/// Projective transform from crop pixels back to design pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseHomography {
    m: [f64; 9],
}

impl InverseHomography {
    pub fn apply(&self, p: Point2D<CropSpace>) -> Point2D<DesignSpace> {
        let m = &self.m;
        let w = m[6] * p.x + m[7] * p.y + m[8];
        Point2D::new(
            (m[0] * p.x + m[1] * p.y + m[2]) / w,
            (m[3] * p.x + m[4] * p.y + m[5]) / w,
        )
    }
}

/// Gauss-Jordan elimination with partial pivoting on an 8x9 augmented matrix.
fn solve_augmented(mut a: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    const PIVOT_EPS: f64 = 1e-12;
    for col in 0..8 {
        let pivot = (col..8).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPS {
            return None;
        }
        a.swap(col, pivot);

        let lead = a[col][col];
        for v in &mut a[col][col..] {
            *v /= lead;
        }
        let pivot_row = a[col];
        for (r, row) in a.iter_mut().enumerate() {
            if r == col || row[col] == 0.0 {
                continue;
            }
            let factor = row[col];
            for (v, p) in row[col..].iter_mut().zip(&pivot_row[col..]) {
                *v -= factor * p;
            }
        }
    }
    let mut x = [0.0; 8];
    for (xi, row) in x.iter_mut().zip(&a) {
        *xi = row[8];
    }
    Some(x)
}

/// Resamples `design` into a transparent `width x height` canvas so that its
/// corners land on `dst`.
///
/// Bilinear interpolation; canvas pixels that map outside the design are
/// left fully transparent, not black.
pub fn warp_design(
    design: &Raster,
    dst: &Quad<CropSpace>,
    width: u32,
    height: u32,
) -> Result<Raster, RenderError> {
    let src = Quad::design_bounds(design.width(), design.height());
    let inverse = Homography::from_quads(&src, dst)?.inverse()?;
    debug!(?dst, width, height, "Warping design");

    Ok(Raster::from_fn(width, height, |x, y| {
        let p = inverse.apply(Point2D::new(f64::from(x), f64::from(y)));
        sample_bilinear(design, p).unwrap_or(UNMAPPED)
    }))
}

/// Bilinear sample at a design-space position, `None` outside the design.
///
/// Positions within [`EDGE_SNAP`] of the outer rows and columns count as on
/// them, and taps past the last row or column reuse it.
fn sample_bilinear(design: &Raster, p: Point2D<DesignSpace>) -> Option<Rgba<u8>> {
    let (max_x, max_y) = (f64::from(design.width() - 1), f64::from(design.height() - 1));
    let inside = |v: f64, max: f64| v.is_finite() && v >= -EDGE_SNAP && v <= max + EDGE_SNAP;
    if !inside(p.x, max_x) || !inside(p.y, max_y) {
        return None;
    }
    let (u, v) = (p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y));

    let (x0, y0) = (u.floor(), v.floor());
    let (fx, fy) = (u - x0, v - y0);
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(design.width() - 1);
    let y1 = (y0 + 1).min(design.height() - 1);

    let (tl, tr) = (design.get_pixel(x0, y0), design.get_pixel(x1, y0));
    let (bl, br) = (design.get_pixel(x0, y1), design.get_pixel(x1, y1));
    let mut out = [0u8; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let top = f64::from(tl.0[i]) * (1.0 - fx) + f64::from(tr.0[i]) * fx;
        let bottom = f64::from(bl.0[i]) * (1.0 - fx) + f64::from(br.0[i]) * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [(f64, f64); 4]) -> Quad<CropSpace> {
        Quad::new(points.map(|(x, y)| Point2D::new(x, y)))
    }

    #[test]
    fn corners_map_onto_destination() {
        let src = Quad::design_bounds(120, 80);
        let dst = quad([(13.0, 7.5), (210.0, 30.0), (190.5, 160.0), (20.0, 140.0)]);
        let h = Homography::from_quads(&src, &dst).unwrap();
        for (s, d) in src.corners.iter().zip(&dst.corners) {
            let got = h.apply(*s);
            assert!((got.x - d.x).abs() < 1e-6, "{got:?} vs {d:?}");
            assert!((got.y - d.y).abs() < 1e-6, "{got:?} vs {d:?}");
        }
    }

    #[test]
    fn rejects_collinear_destination() {
        let design = Raster::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        let dst = quad([(0.0, 0.0), (5.0, 5.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(matches!(
            warp_design(&design, &dst, 20, 20),
            Err(RenderError::DegenerateQuad(_))
        ));
    }

    #[test]
    fn rejects_one_pixel_wide_design() {
        let design = Raster::from_pixel(1, 10, Rgba([255, 0, 0, 255]));
        let dst = quad([(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(matches!(
            warp_design(&design, &dst, 20, 20),
            Err(RenderError::DegenerateQuad(_))
        ));
    }

    #[test]
    fn unmapped_canvas_is_transparent() {
        let design = Raster::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let dst = quad([(10.0, 10.0), (29.0, 10.0), (29.0, 29.0), (10.0, 29.0)]);
        let warped = warp_design(&design, &dst, 40, 40).unwrap();
        assert_eq!(warped.dimensions(), (40, 40));
        assert_eq!(warped.get_pixel(2, 2).0, [0, 0, 0, 0]);
        assert_eq!(warped.get_pixel(35, 20).0, [0, 0, 0, 0]);
        assert_eq!(warped.get_pixel(20, 20).0, [0, 0, 0, 255]);
    }

    #[test]
    fn quad_may_extend_past_canvas() {
        let design = Raster::from_pixel(8, 8, Rgba([0, 200, 0, 255]));
        let dst = quad([(-20.0, -20.0), (60.0, -20.0), (60.0, 60.0), (-20.0, 60.0)]);
        let warped = warp_design(&design, &dst, 30, 30).unwrap();
        assert!(warped.pixels().all(|p| p.0 == [0, 200, 0, 255]));
    }

    #[test]
    fn inverse_undoes_forward_mapping() {
        let src = Quad::design_bounds(64, 48);
        let dst = quad([(5.0, 3.0), (90.0, 12.0), (80.0, 70.0), (2.0, 55.0)]);
        let h = Homography::from_quads(&src, &dst).unwrap();
        let inv = h.inverse().unwrap();
        for (s, d) in src.corners.iter().zip(&dst.corners) {
            let back = inv.apply(*d);
            assert!((back.x - s.x).abs() < 1e-9 && (back.y - s.y).abs() < 1e-9, "{back:?} vs {s:?}");
        }
    }

    #[test]
    fn integer_scale_covers_destination_edges() {
        let design = Raster::from_pixel(10, 10, Rgba([255, 0, 0, 255]));
        // Design pixel 0 lands on 4, pixel 9 on 22: a scale of exactly 2.
        let dst = quad([(4.0, 6.0), (22.0, 6.0), (22.0, 24.0), (4.0, 24.0)]);
        let warped = warp_design(&design, &dst, 30, 30).unwrap();
        for (x, y, p) in warped.enumerate_pixels() {
            let covered = (4..=22).contains(&x) && (6..=24).contains(&y);
            let want = if covered { [255, 0, 0, 255] } else { [0, 0, 0, 0] };
            assert_eq!(p.0, want, "({x}, {y})");
        }
    }

    #[test]
    fn interpolates_between_design_pixels() {
        let design = Raster::from_fn(2, 2, |x, _| {
            if x == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        });
        let dst = quad([(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        let warped = warp_design(&design, &dst, 3, 3).unwrap();
        assert_eq!(warped.get_pixel(0, 1).0, [0, 0, 0, 255]);
        assert_eq!(warped.get_pixel(1, 1).0, [128, 128, 128, 255]);
        assert_eq!(warped.get_pixel(2, 1).0, [255, 255, 255, 255]);
    }
}
