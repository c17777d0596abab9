use std::cmp::Ordering;

use nalgebra::Point2;
use tracing::debug;

use crate::error::{CorrectionError, Result};

/// Regions (before or after clipping) with less area than this, in square
/// pixels, are treated as degenerate.
pub const AREA_EPSILON: f64 = 1e-6;

/// Pixel extent of the source image. Continuous coordinates run over
/// `[0, width] x [0, height]`; pixel `(i, j)` covers `[i, i+1) x [j, j+1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp a point into the closed image rectangle.
    pub fn clamp(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            p.x.clamp(0.0, self.width as f64),
            p.y.clamp(0.0, self.height as f64),
        )
    }

    /// Clip a simple polygon to the image rectangle (Sutherland-Hodgman).
    /// The result is empty when nothing of the polygon lies inside.
    pub fn clip_polygon(&self, points: &[Point2<f64>]) -> Vec<Point2<f64>> {
        let (w, h) = (self.width as f64, self.height as f64);
        // (nx, ny, c): inside where nx * x + ny * y + c >= 0.
        let edges = [
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (-1.0, 0.0, w),
            (0.0, -1.0, h),
        ];

        let mut polygon = points.to_vec();
        for (nx, ny, c) in edges {
            if polygon.is_empty() {
                break;
            }
            let dist = |p: Point2<f64>| nx * p.x + ny * p.y + c;
            let n = polygon.len();
            let mut next = Vec::with_capacity(n + 1);
            for i in 0..n {
                let prev = polygon[(i + n - 1) % n];
                let cur = polygon[i];
                let (dp, dc) = (dist(prev), dist(cur));
                if (dp >= 0.0) != (dc >= 0.0) {
                    next.push(prev + (cur - prev) * (dp / (dp - dc)));
                }
                if dc >= 0.0 {
                    next.push(cur);
                }
            }
            polygon = next;
        }
        polygon
    }
}

/// Caller-supplied area of interest, in the source image's pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// Axis-aligned rectangle with its top-left corner at `(x, y)`.
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Rectangle rotated clockwise (y points down) about its centre.
    Rotated {
        center: Point2<f64>,
        width: f64,
        height: f64,
        angle_degrees: f64,
    },
    /// Arbitrary quadrilateral; the points may come in any order.
    Quad([Point2<f64>; 4]),
}

impl Region {
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        Region::Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole image.
    pub fn full(bounds: ImageBounds) -> Self {
        Region::rect(0.0, 0.0, bounds.width as f64, bounds.height as f64)
    }

    pub fn rotated(center: (f64, f64), width: f64, height: f64, angle_degrees: f64) -> Self {
        Region::Rotated {
            center: Point2::new(center.0, center.1),
            width,
            height,
            angle_degrees,
        }
    }

    pub fn quad(points: [(f64, f64); 4]) -> Self {
        Region::Quad(points.map(|(x, y)| Point2::new(x, y)))
    }

    /// The region's four vertices in its own order.
    pub fn vertices(&self) -> [Point2<f64>; 4] {
        match *self {
            Region::Rect {
                x,
                y,
                width,
                height,
            } => [
                Point2::new(x, y),
                Point2::new(x + width, y),
                Point2::new(x + width, y + height),
                Point2::new(x, y + height),
            ],
            Region::Rotated {
                center,
                width,
                height,
                angle_degrees,
            } => {
                let (sin, cos) = angle_degrees.to_radians().sin_cos();
                let (hw, hh) = (width / 2.0, height / 2.0);
                [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(lx, ly)| {
                    Point2::new(
                        center.x + lx * cos - ly * sin,
                        center.y + lx * sin + ly * cos,
                    )
                })
            }
            Region::Quad(points) => points,
        }
    }
}

/// Four corners in top-left, top-right, bottom-right, bottom-left order
/// (clockwise on screen).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet {
    corners: [Point2<f64>; 4],
}

impl CornerSet {
    /// Trust the given order as TL, TR, BR, BL.
    pub fn new(corners: [Point2<f64>; 4]) -> Self {
        Self { corners }
    }

    /// Order arbitrary points into a simple polygon, starting from the corner
    /// nearest the origin.
    pub fn from_unordered(points: [Point2<f64>; 4]) -> Self {
        let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
        let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

        let mut sorted = points;
        // Ascending atan2 with y down walks clockwise on screen.
        sorted.sort_by(|a, b| {
            let ta = (a.y - cy).atan2(a.x - cx);
            let tb = (b.y - cy).atan2(b.x - cx);
            ta.total_cmp(&tb)
        });

        let first = (0..4)
            .min_by(|&i, &j| first_corner_order(&sorted[i], &sorted[j]))
            .unwrap_or(0);
        sorted.rotate_left(first);

        Self { corners: sorted }
    }

    pub fn top_left(&self) -> Point2<f64> {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point2<f64> {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point2<f64> {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point2<f64> {
        self.corners[3]
    }

    pub fn as_array(&self) -> &[Point2<f64>; 4] {
        &self.corners
    }

    /// Same quadrilateral, relabelled so that a rectification comes out
    /// turned 90° clockwise: the old left edge becomes the top edge.
    pub fn rotated_clockwise(&self) -> Self {
        let [tl, tr, br, bl] = self.corners;
        Self {
            corners: [bl, tl, tr, br],
        }
    }

    /// Unsigned polygon area.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.corners)
    }
}

/// Smallest `x + y` first, ties broken by `y`, then `x`.
fn first_corner_order(a: &Point2<f64>, b: &Point2<f64>) -> Ordering {
    (a.x + a.y)
        .total_cmp(&(b.x + b.y))
        .then(a.y.total_cmp(&b.y))
        .then(a.x.total_cmp(&b.x))
}

/// Area of a simple polygon via the shoelace formula.
pub fn shoelace_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// Derive the ordered corner set for `region`, clipped to `bounds`.
///
/// The region must overlap the image with positive area. Its corners are
/// then clamped individually into the image rectangle, which for an
/// axis-aligned rectangle is exactly the intersection.
pub fn extract_corners(region: &Region, bounds: ImageBounds) -> Result<CornerSet> {
    let vertices = region.vertices();
    if vertices.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(CorrectionError::invalid("region has non-finite coordinates"));
    }

    let raw = CornerSet::from_unordered(vertices);
    if raw.area() < AREA_EPSILON {
        return Err(CorrectionError::DegenerateRegion);
    }

    let overlap = shoelace_area(&bounds.clip_polygon(raw.as_array()));
    if overlap < AREA_EPSILON {
        let tl = raw.top_left();
        return Err(CorrectionError::invalid(format!(
            "region at ({:.1}, {:.1}) does not overlap the {}x{} image",
            tl.x, tl.y, bounds.width, bounds.height
        )));
    }

    let clipped = CornerSet::from_unordered(vertices.map(|p| bounds.clamp(p)));
    let area = clipped.area();
    if area < AREA_EPSILON {
        return Err(CorrectionError::DegenerateRegion);
    }

    debug!(
        top_left = ?clipped.top_left(),
        top_right = ?clipped.top_right(),
        bottom_right = ?clipped.bottom_right(),
        bottom_left = ?clipped.bottom_left(),
        area,
        "Corners extracted"
    );
    Ok(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    fn assert_close(a: Point2<f64>, b: Point2<f64>) {
        assert!((a - b).norm() < 1e-9, "expected {:?}, got {:?}", b, a);
    }

    #[test]
    fn test_rect_corners_in_winding_order() {
        let bounds = ImageBounds::new(100, 80);
        let corners = extract_corners(&Region::rect(10.0, 20.0, 30.0, 40.0), bounds).unwrap();
        assert_eq!(
            corners.as_array(),
            &[p(10.0, 20.0), p(40.0, 20.0), p(40.0, 60.0), p(10.0, 60.0)]
        );
    }

    #[test]
    fn test_unordered_quad_is_reordered() {
        let shuffled = [p(90.0, 85.0), p(5.0, 10.0), p(8.0, 70.0), p(95.0, 3.0)];
        let corners = CornerSet::from_unordered(shuffled);
        assert_eq!(corners.top_left(), p(5.0, 10.0));
        assert_eq!(corners.top_right(), p(95.0, 3.0));
        assert_eq!(corners.bottom_right(), p(90.0, 85.0));
        assert_eq!(corners.bottom_left(), p(8.0, 70.0));
    }

    #[test]
    fn test_first_corner_tie_prefers_smaller_y() {
        // A diamond: left and top vertices share x + y = 10.
        let diamond = [p(10.0, 0.0), p(20.0, 10.0), p(10.0, 20.0), p(0.0, 10.0)];
        let corners = CornerSet::from_unordered(diamond);
        assert_eq!(corners.top_left(), p(10.0, 0.0));
        assert_eq!(corners.top_right(), p(20.0, 10.0));
    }

    #[test]
    fn test_rotated_region_corners() {
        let region = Region::rotated((50.0, 50.0), 40.0, 20.0, 90.0);
        let corners = extract_corners(&region, ImageBounds::new(100, 100)).unwrap();
        // Turned a quarter, the 40x20 box spans 20 wide and 40 tall.
        assert_close(corners.top_left(), p(40.0, 30.0));
        assert_close(corners.top_right(), p(60.0, 30.0));
        assert_close(corners.bottom_right(), p(60.0, 70.0));
        assert_close(corners.bottom_left(), p(40.0, 70.0));
    }

    #[test]
    fn test_rect_partially_outside_is_clipped() {
        let bounds = ImageBounds::new(50, 50);
        let corners = extract_corners(&Region::rect(-10.0, 30.0, 30.0, 40.0), bounds).unwrap();
        assert_eq!(
            corners.as_array(),
            &[p(0.0, 30.0), p(20.0, 30.0), p(20.0, 50.0), p(0.0, 50.0)]
        );
    }

    #[test]
    fn test_point_and_line_are_degenerate() {
        let bounds = ImageBounds::new(50, 50);
        let point = Region::rect(10.0, 10.0, 0.0, 0.0);
        let line = Region::rect(10.0, 10.0, 20.0, 0.0);
        let slanted = Region::quad([(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 30.0)]);
        for region in [point, line, slanted] {
            let err = extract_corners(&region, bounds).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DegenerateRegion);
        }
    }

    #[test]
    fn test_disjoint_region_is_invalid() {
        let err = extract_corners(
            &Region::rect(200.0, 200.0, 10.0, 10.0),
            ImageBounds::new(50, 50),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_region_touching_edge_is_invalid() {
        let bounds = ImageBounds::new(50, 50);
        for region in [
            Region::rect(-10.0, 5.0, 10.0, 20.0),
            Region::rect(50.0, 50.0, 5.0, 5.0),
        ] {
            let err = extract_corners(&region, bounds).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_strip_beside_image_corner_is_invalid() {
        // Bounding box overlaps the image, the strip itself stays at x + y < 0.
        let strip = Region::quad([(-10.0, 2.0), (2.0, -10.0), (3.0, -9.0), (-9.0, 3.0)]);
        let err = extract_corners(&strip, ImageBounds::new(40, 30)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_clip_polygon_keeps_inside_part() {
        let bounds = ImageBounds::new(40, 30);
        let diamond = [p(10.0, 0.0), p(0.0, 10.0), p(-10.0, 0.0), p(0.0, -10.0)];
        let inside = bounds.clip_polygon(&diamond);
        assert!((shoelace_area(&inside) - 50.0).abs() < 1e-9);

        let rect = [p(5.0, 5.0), p(15.0, 5.0), p(15.0, 10.0), p(5.0, 10.0)];
        assert_eq!(bounds.clip_polygon(&rect), rect.to_vec());

        let outside = [p(50.0, 5.0), p(60.0, 5.0), p(60.0, 10.0), p(50.0, 10.0)];
        assert!(bounds.clip_polygon(&outside).is_empty());
    }

    #[test]
    fn test_non_finite_region_is_invalid() {
        let err = extract_corners(
            &Region::rect(f64::NAN, 0.0, 10.0, 10.0),
            ImageBounds::new(50, 50),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_rotated_clockwise_relabels() {
        let corners = CornerSet::new([p(0.0, 0.0), p(4.0, 0.0), p(4.0, 2.0), p(0.0, 2.0)]);
        let turned = corners.rotated_clockwise();
        assert_eq!(turned.top_left(), p(0.0, 2.0));
        assert_eq!(turned.top_right(), p(0.0, 0.0));
        assert_eq!(turned.area(), corners.area());
    }

    #[test]
    fn test_shoelace_area_rectangle() {
        let area = shoelace_area(&[p(0.0, 0.0), p(10.0, 0.0), p(10.0, 5.0), p(0.0, 5.0)]);
        assert!((area - 50.0).abs() < 1e-12);
    }
}
