//! Calibration transform estimation and point reprojection.
//!
//! Board fiducials and template fiducials come in as two equally long,
//! identically ordered point lists. Two correspondences give a closed-form
//! similarity fit; three or more give a full planar homography via DLT.

use nalgebra::{DMatrix, Matrix2, Matrix3, Point2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors raised while fitting a calibration transform.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("no fiducials found on the board")]
    NoFiducials,
    #[error("at least 2 fiducial correspondences required (got {got})")]
    TooFewCorrespondences { got: usize },
    #[error("fiducial count mismatch: board has {board}, template has {template}")]
    CountMismatch { board: usize, template: usize },
    #[error("degenerate fiducial configuration, transform fit failed")]
    DegenerateFit,
}

/// 2D affine map: uniform scale + rotation, then translation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    pub linear: Matrix2<f64>,
    pub translation: Vector2<f64>,
}

impl Affine2 {
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(self.linear * p.coords + self.translation)
    }
}

/// Projective 2D transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }
}

/// Fitted calibration transform, chosen by correspondence count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoardTransform {
    /// Similarity fit from exactly two correspondences.
    Affine(Affine2),
    /// DLT homography from three or more correspondences.
    Projective(Homography),
}

impl BoardTransform {
    /// Reproject a single point. Pure; the transform is fitted once per
    /// board, never re-derived per point.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        match self {
            BoardTransform::Affine(a) => a.apply(p),
            BoardTransform::Projective(h) => h.apply(p),
        }
    }
}

/// Fit the transform mapping board fiducials onto template fiducials.
///
/// The two lists must be equally long and consistently ordered (both sorted
/// by distance from the origin upstream). Two points select the similarity
/// path, three or more the homography path.
pub fn fit_transform(
    board: &[Point2<f64>],
    template: &[Point2<f64>],
) -> Result<BoardTransform, CalibrationError> {
    if board.len() != template.len() {
        return Err(CalibrationError::CountMismatch {
            board: board.len(),
            template: template.len(),
        });
    }
    if board.len() < 2 {
        return Err(CalibrationError::TooFewCorrespondences { got: board.len() });
    }

    if board.len() == 2 {
        fit_similarity(board, template).map(BoardTransform::Affine)
    } else {
        fit_homography_dlt(board, template).map(BoardTransform::Projective)
    }
}

fn centroid(pts: &[Point2<f64>]) -> Vector2<f64> {
    let mut c = Vector2::zeros();
    for p in pts {
        c += p.coords;
    }
    c / pts.len() as f64
}

/// Closed-form similarity fit (Umeyama-style): rotation from the SVD of the
/// cross-covariance of the centered sets, scale from the variance ratio,
/// translation from the centroids.
fn fit_similarity(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Result<Affine2, CalibrationError> {
    let src_mean = centroid(src);
    let dst_mean = centroid(dst);

    let mut cov = Matrix2::zeros();
    let mut src_var = 0.0;
    for (s, d) in src.iter().zip(dst) {
        let sc = s.coords - src_mean;
        let dc = d.coords - dst_mean;
        cov += dc * sc.transpose();
        src_var += sc.norm_squared();
    }
    if src_var < 1e-12 {
        return Err(CalibrationError::DegenerateFit);
    }

    let svd = cov.svd(true, true);
    let u = svd.u.ok_or(CalibrationError::DegenerateFit)?;
    let v_t = svd.v_t.ok_or(CalibrationError::DegenerateFit)?;

    // Keep a proper rotation: flip the sign of the weakest direction when
    // the raw product would be a reflection.
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.set_column(1, &(-u.column(1)));
        rotation = u_fixed * v_t;
    }

    let mut proj = 0.0;
    for (s, d) in src.iter().zip(dst) {
        let sc = s.coords - src_mean;
        let dc = d.coords - dst_mean;
        proj += dc.dot(&(rotation * sc));
    }
    let scale = proj / src_var;

    let linear = rotation * scale;
    let translation = dst_mean - linear * src_mean;
    Ok(Affine2 {
        linear,
        translation,
    })
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let c = centroid(pts);

    let mut mean_dist = 0.0;
    for p in pts {
        mean_dist += (p.coords - c).norm();
    }
    mean_dist /= n;

    let t = hartley_normalization(c.x, c.y, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Classical DLT: stack two constraint rows per correspondence into a 2N x 9
/// system and take the right singular vector of the smallest singular value.
fn fit_homography_dlt(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<Homography, CalibrationError> {
    let (s, t_src) = normalize_points(src);
    let (d, t_dst) = normalize_points(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (s[k].x, s[k].y);
        let (u, v) = (d[k].x, d[k].y);

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    let svd = a.svd(true, true);
    let v_t = svd.v_t.ok_or(CalibrationError::DegenerateFit)?;
    let last = v_t.nrows() - 1;
    let h = v_t.row(last);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    // Denormalize: H = T_dst^{-1} * Hn * T_src, then pin h33 = 1.
    let t_dst_inv = t_dst.try_inverse().ok_or(CalibrationError::DegenerateFit)?;
    let h_full = t_dst_inv * hn * t_src;
    let pivot = h_full[(2, 2)];
    if pivot.abs() < 1e-12 {
        return Err(CalibrationError::DegenerateFit);
    }
    Ok(Homography::new(h_full / pivot))
}
