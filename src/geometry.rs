//! Points tagged with the coordinate frame they live in.
//!
//! Callers supply quadrilateral corners in full-photo pixels, while warping
//! happens inside the photo's bounding-box crop. Tagging each point with its
//! frame makes mixing the two a type error; [`to_crop_space`] is the only way
//! across.

use std::fmt;
use std::marker::PhantomData;

use crate::raster::BoundingBox;

/// Full-photo pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSpace;

/// Coordinates relative to the photo's bounding-box crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSpace;

/// Pixel coordinates of the design raster itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesignSpace;

#[derive(Clone, Copy, PartialEq)]
pub struct Point2D<F> {
    pub x: f64,
    pub y: f64,
    frame: PhantomData<F>,
}

impl<F> Point2D<F> {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, frame: PhantomData }
    }
}

impl<F> fmt::Debug for Point2D<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Re-expresses a photo-space point relative to `bbox`'s origin.
pub fn to_crop_space(p: Point2D<PhotoSpace>, bbox: &BoundingBox) -> Point2D<CropSpace> {
    Point2D::new(p.x - f64::from(bbox.x0), p.y - f64::from(bbox.y0))
}

/// Four corners ordered top-left, top-right, bottom-right, bottom-left.
///
/// Convexity and winding are the caller's business and are not checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad<F> {
    pub corners: [Point2D<F>; 4],
}

impl<F> Quad<F> {
    pub fn new(corners: [Point2D<F>; 4]) -> Self {
        Self { corners }
    }

    /// Whether any three corners are (nearly) collinear, which includes
    /// repeated corners. Such a quad has no well-defined homography.
    pub fn is_degenerate(&self) -> bool {
        const MIN_TWICE_AREA: f64 = 1e-6;
        let c = &self.corners;
        let triples = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
        triples.iter().any(|&(a, b, d)| {
            let cross = (c[b].x - c[a].x) * (c[d].y - c[a].y) - (c[b].y - c[a].y) * (c[d].x - c[a].x);
            !cross.is_finite() || cross.abs() < MIN_TWICE_AREA
        })
    }
}

impl Quad<PhotoSpace> {
    pub fn to_crop_space(&self, bbox: &BoundingBox) -> Quad<CropSpace> {
        Quad::new(self.corners.map(|p| to_crop_space(p, bbox)))
    }
}

impl Quad<DesignSpace> {
    /// The corner pixels of a `width x height` design.
    pub fn design_bounds(width: u32, height: u32) -> Self {
        let (r, b) = (f64::from(width) - 1.0, f64::from(height) - 1.0);
        Self::new([
            Point2D::new(0.0, 0.0),
            Point2D::new(r, 0.0),
            Point2D::new(r, b),
            Point2D::new(0.0, b),
        ])
    }
}

/// Why a `points` form field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointsError {
    #[error("points must have 8 numbers (x0,y0,...,x3,y3), got {0}")]
    WrongCount(usize),

    #[error("points contains a non-numeric value: {0:?}")]
    NotANumber(String),
}

/// Parses `x0,y0,x1,y1,x2,y2,x3,y3` into a photo-space quad.
///
/// Literal `\n` sequences count as whitespace and empty tokens are skipped,
/// matching what browser clients tend to send.
pub fn parse_points(raw: &str) -> Result<Quad<PhotoSpace>, PointsError> {
    let cleaned = raw.replace("\\n", " ");
    let tokens: Vec<&str> = cleaned.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
    if tokens.len() != 8 {
        return Err(PointsError::WrongCount(tokens.len()));
    }

    let mut nums = [0.0f64; 8];
    for (slot, token) in nums.iter_mut().zip(&tokens) {
        *slot = token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| PointsError::NotANumber((*token).to_string()))?;
    }

    Ok(Quad::new([
        Point2D::new(nums[0], nums[1]),
        Point2D::new(nums[2], nums[3]),
        Point2D::new(nums[4], nums[5]),
        Point2D::new(nums[6], nums[7]),
    ]))
}
