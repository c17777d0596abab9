use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use tracing::debug;

use crate::error::{CorrectionError, Result};
use crate::geometry::CornerSet;

/// Projective denominators closer to zero than this map to infinity.
const W_EPSILON: f64 = 1e-12;

/// A 3x3 projective transform, normalised so that `h[(2, 2)] == 1` whenever
/// that entry is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

/// Rectifying transform for one corner set together with the size of the
/// rectangle it maps onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub homography: Homography,
    pub width: u32,
    pub height: u32,
}

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        let scale = matrix[(2, 2)];
        if scale.abs() > W_EPSILON {
            Self(matrix / scale)
        } else {
            Self(matrix)
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn as_array(&self) -> [[f64; 3]; 3] {
        let m = &self.0;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Map a point; `None` when it lands at (or numerically near) infinity.
    pub fn project(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        project_xy(&self.0, p.x, p.y).map(|(x, y)| Point2::new(x, y))
    }

    pub fn inverse(&self) -> Option<Homography> {
        self.0.try_inverse().map(Homography::from_matrix)
    }
}

/// Dehomogenise `m * [x, y, 1]`.
pub(crate) fn project_xy(m: &Matrix3<f64>, x: f64, y: f64) -> Option<(f64, f64)> {
    let v = m * Vector3::new(x, y, 1.0);
    let w = v.z;
    if !w.is_finite() || w.abs() <= W_EPSILON {
        return None;
    }
    let (px, py) = (v.x / w, v.y / w);
    if px.is_finite() && py.is_finite() {
        Some((px, py))
    } else {
        None
    }
}

/// Size of the destination rectangle: the longer of each pair of opposite
/// edges, rounded to whole pixels.
pub fn output_size(corners: &CornerSet) -> Result<(u32, u32)> {
    let [tl, tr, br, bl] = *corners.as_array();
    let width = (tr - tl).norm().max((br - bl).norm()).round();
    let height = (bl - tl).norm().max((br - tr).norm()).round();

    if !(width >= 1.0 && height >= 1.0) {
        return Err(CorrectionError::DegenerateRegion);
    }
    // `as` saturates; oversized results are caught by the resampler's budget.
    Ok((width as u32, height as u32))
}

/// Compute the homography taking `corners` onto the axis-aligned rectangle
/// `(0,0) (W,0) (W,H) (0,H)`, along with `W` and `H`.
pub fn solve(corners: &CornerSet, singularity_epsilon: f64) -> Result<Solution> {
    let src = corners.as_array();
    if src.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(CorrectionError::invalid("corner set has non-finite coordinates"));
    }
    if has_collinear_triple(src, singularity_epsilon) {
        debug!(?src, "Corner set has three collinear points");
        return Err(CorrectionError::SingularTransform);
    }
    if !is_convex(src) {
        debug!(?src, "Corner set is not a convex quadrilateral");
        return Err(CorrectionError::SingularTransform);
    }

    let (width, height) = output_size(corners)?;
    let (w, h) = (width as f64, height as f64);
    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];

    let homography = homography_from_points(src, &dst, singularity_epsilon)?;
    debug!(width, height, matrix = ?homography.as_array(), "Homography solved");

    Ok(Solution {
        homography,
        width,
        height,
    })
}

/// Exact four-point homography with `dst[i] ~ H * src[i]`.
///
/// Both point sets are normalised (centroid at the origin, unit spread per
/// axis) before the 8x8 system is built, so the determinant threshold does
/// not depend on image scale or aspect ratio.
pub fn homography_from_points(
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
    singularity_epsilon: f64,
) -> Result<Homography> {
    let (t_src, _, src_n) = normalize_points(src);
    let (_, t_dst_inv, dst_n) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let (x, y) = (src_n[i].x, src_n[i].y);
        let (u, v) = (dst_n[i].x, dst_n[i].y);

        // u * (h31 x + h32 y + 1) = h11 x + h12 y + h13
        let r = 2 * i;
        a[(r, 0)] = x;
        a[(r, 1)] = y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -x * u;
        a[(r, 7)] = -y * u;
        b[r] = u;

        // v * (h31 x + h32 y + 1) = h21 x + h22 y + h23
        let r = 2 * i + 1;
        a[(r, 3)] = x;
        a[(r, 4)] = y;
        a[(r, 5)] = 1.0;
        a[(r, 6)] = -x * v;
        a[(r, 7)] = -y * v;
        b[r] = v;
    }

    let det = a.determinant();
    if !det.is_finite() || det.abs() <= singularity_epsilon {
        debug!(det, "Normalised correspondence system is singular");
        return Err(CorrectionError::SingularTransform);
    }

    let h = a.lu().solve(&b).ok_or(CorrectionError::SingularTransform)?;
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

    let h_det = h_norm.determinant();
    if !h_det.is_finite() || h_det.abs() <= singularity_epsilon {
        debug!(h_det, "Normalised homography is not invertible");
        return Err(CorrectionError::SingularTransform);
    }

    Ok(Homography::from_matrix(t_dst_inv * h_norm * t_src))
}

/// Affine map moving the centroid to the origin and scaling each axis so the
/// mean absolute offset along it is 1, its inverse, and the mapped points.
///
/// Per-axis scaling keeps long thin regions (plates, receipts) as well
/// conditioned as square ones.
fn normalize_points(
    pts: &[Point2<f64>; 4],
) -> (Matrix3<f64>, Matrix3<f64>, [Point2<f64>; 4]) {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let spread_x = pts.iter().map(|p| (p.x - cx).abs()).sum::<f64>() / 4.0;
    let spread_y = pts.iter().map(|p| (p.y - cy).abs()).sum::<f64>() / 4.0;

    let sx = if spread_x > 1e-15 { 1.0 / spread_x } else { 1.0 };
    let sy = if spread_y > 1e-15 { 1.0 / spread_y } else { 1.0 };

    let t = Matrix3::new(sx, 0.0, -sx * cx, 0.0, sy, -sy * cy, 0.0, 0.0, 1.0);
    let t_inv = Matrix3::new(1.0 / sx, 0.0, cx, 0.0, 1.0 / sy, cy, 0.0, 0.0, 1.0);
    let normalized = pts.map(|p| Point2::new(sx * (p.x - cx), sy * (p.y - cy)));

    (t, t_inv, normalized)
}

/// True if any three of the four points are (nearly) collinear, measured by
/// the sine of the angle they span. Coincident points count as collinear.
fn has_collinear_triple(pts: &[Point2<f64>; 4], epsilon: f64) -> bool {
    (0..4).any(|i| {
        let a = pts[i];
        let b = pts[(i + 1) % 4];
        let c = pts[(i + 2) % 4];
        let (ab, ac) = (b - a, c - a);
        let lengths = ab.norm() * ac.norm();
        if lengths <= f64::MIN_POSITIVE {
            return true;
        }
        let sine = (ab.x * ac.y - ab.y * ac.x).abs() / lengths;
        sine <= epsilon
    })
}

/// True if every corner turns the same way, so the points in their given
/// order form a convex quadrilateral. Reflex corners and bow-ties fail.
fn is_convex(pts: &[Point2<f64>; 4]) -> bool {
    let turns = [0, 1, 2, 3].map(|i| {
        let (a, b, c) = (pts[i], pts[(i + 1) % 4], pts[(i + 2) % 4]);
        let (ab, bc) = (b - a, c - b);
        ab.x * bc.y - ab.y * bc.x
    });
    turns.iter().all(|&t| t > 0.0) || turns.iter().all(|&t| t < 0.0)
}
