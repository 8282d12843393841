use glam::{DMat3, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::camera::{pixel_residual, CameraIntrinsics};
use crate::correspondence::Correspondence;
use crate::pose::Pose;
use crate::triangulation::{parallax_angle, triangulate_correspondences};

/// Error types for quality assessment.
#[derive(Debug, thiserror::Error)]
pub enum QualityError {
    /// Two parallel inputs have different lengths.
    #[error("Length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch {
        /// Length of the reference input.
        expected: usize,
        /// Length of the other input.
        actual: usize,
    },

    /// Not enough points for the metric.
    #[error("Need at least {required} points, got {actual}")]
    InsufficientPoints {
        /// Minimum number of points.
        required: usize,
        /// Number of points provided.
        actual: usize,
    },
}

/// Thresholds used to classify triangulated points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParams {
    /// Parallax above which a point counts as well conditioned, in degrees.
    pub min_parallax_deg: f64,
    /// Pixel residual below which a point counts as good, in both views.
    pub max_reprojection_error: f64,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            min_parallax_deg: 3.0,
            max_reprojection_error: 20.0,
        }
    }
}

/// Summed pixel reprojection error of triangulated points in both views.
///
/// `points[i]` is compared with `correspondences[i]`: `(x0, y0)` against its projection
/// through `reference` and `(x1, y1)` against its projection through `pose`. Each
/// projection is divided by its own depth, so points at zero depth yield NaN or inf.
pub fn reprojection_error(
    pose: &Pose,
    reference: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    points: &[DVec4],
) -> Result<f64, QualityError> {
    ensure_same_len(correspondences.len(), points.len())?;

    let p0 = intrinsics.projection_matrix(reference);
    let p1 = intrinsics.projection_matrix(pose);
    let error = points
        .iter()
        .zip(correspondences.iter())
        .map(|(x, c)| {
            pixel_residual(p0 * *x, c.primary()) + pixel_residual(p1 * *x, c.secondary())
        })
        .sum();
    Ok(error)
}

/// Distance between estimated and true structure after scale alignment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionError {
    /// Sum of per-point distances.
    pub total: f64,
    /// Median per-point distance.
    pub median: f64,
}

/// Compare a triangulated reconstruction with ground-truth points.
///
/// The estimate is only known up to scale. A single factor is taken from the first two
/// points, `|true0 - true1| / |est0 - est1|`, and applied to every estimated point before
/// measuring its Euclidean distance to the truth. Coincident anchor points give a
/// non-finite scale which propagates to the result.
pub fn reconstruction_error(
    estimated: &[DVec4],
    truth: &[DVec3],
) -> Result<ReconstructionError, QualityError> {
    ensure_same_len(truth.len(), estimated.len())?;
    if estimated.len() < 2 {
        return Err(QualityError::InsufficientPoints {
            required: 2,
            actual: estimated.len(),
        });
    }

    let est = estimated.iter().map(|x| x.truncate()).collect::<Vec<_>>();
    let scale = (truth[0] - truth[1]).length() / (est[0] - est[1]).length();

    let mut distances = est
        .iter()
        .zip(truth.iter())
        .map(|(e, t)| (*e * scale - *t).length())
        .collect::<Vec<_>>();
    let total = distances.iter().sum();
    distances.sort_by(|a, b| a.total_cmp(b));

    Ok(ReconstructionError {
        total,
        median: distances[distances.len() / 2],
    })
}

/// Ground-truth-free conditioning statistics of a reconstruction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParallaxStats {
    /// Number of points whose parallax exceeds the threshold.
    pub num_high_parallax: usize,
    /// Number of points in front of both cameras with small residuals in both views.
    pub num_good: usize,
    /// Median parallax in degrees, NaN for an empty set.
    pub median_parallax_deg: f64,
}

/// Count well-conditioned and good points.
///
/// A point has high parallax when the angle between the rays to both camera centers
/// exceeds `params.min_parallax_deg`. It is good when it has positive depth in both
/// cameras and both pixel residuals are below `params.max_reprojection_error`.
pub fn parallax_and_good_points(
    primary: &Pose,
    secondary: &Pose,
    intrinsics: &CameraIntrinsics,
    points: &[DVec4],
    correspondences: &[Correspondence],
    params: &QualityParams,
) -> Result<ParallaxStats, QualityError> {
    ensure_same_len(correspondences.len(), points.len())?;

    let p0 = intrinsics.projection_matrix(primary);
    let p1 = intrinsics.projection_matrix(secondary);

    let mut num_high_parallax = 0;
    let mut num_good = 0;
    let mut parallaxes = Vec::with_capacity(points.len());

    for (x, c) in points.iter().zip(correspondences.iter()) {
        let parallax = parallax_angle(x.truncate(), primary, secondary);
        if parallax > params.min_parallax_deg {
            num_high_parallax += 1;
        }
        parallaxes.push(parallax);

        let a = p0 * *x;
        let b = p1 * *x;
        if a.z > 0.0
            && b.z > 0.0
            && pixel_residual(a, c.primary()) < params.max_reprojection_error
            && pixel_residual(b, c.secondary()) < params.max_reprojection_error
        {
            num_good += 1;
        }
    }

    parallaxes.sort_by(|a, b| a.total_cmp(b));
    let median_parallax_deg = parallaxes
        .get(parallaxes.len() / 2)
        .copied()
        .unwrap_or(f64::NAN);

    Ok(ParallaxStats {
        num_high_parallax,
        num_good,
        median_parallax_deg,
    })
}

/// Frobenius norm of `a - b`.
pub fn chordal_distance(a: &DMat3, b: &DMat3) -> f64 {
    let d = *a - *b;
    (d.x_axis.length_squared() + d.y_axis.length_squared() + d.z_axis.length_squared()).sqrt()
}

/// Distance between the directions of two translations.
///
/// Both vectors are normalized first, so the result ignores scale. A zero vector stays
/// zero.
pub fn translation_chordal_distance(a: DVec3, b: DVec3) -> f64 {
    (a.normalize_or_zero() - b.normalize_or_zero()).length()
}

/// Ground truth available for an assessment.
#[derive(Clone, Copy, Debug, Default)]
pub struct GroundTruth<'a> {
    /// True world points, one per correspondence.
    pub points: Option<&'a [DVec3]>,
    /// True pose of the secondary camera.
    pub pose: Option<&'a Pose>,
    /// True fundamental matrix of the pair, recovered and scored like an estimated one.
    pub fundamental: Option<DMat3>,
}

/// Quality of one reconstruction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Summed pixel reprojection error over both views.
    pub reprojection_error: f64,
    /// Number of triangulated points.
    pub num_points: usize,
    /// Number of points with parallax above the threshold.
    pub num_high_parallax: usize,
    /// Number of points in front of both cameras with small residuals.
    pub num_good_points: usize,
    /// Median parallax in degrees.
    pub median_parallax_deg: f64,
    /// Summed distance to the true points after scale alignment.
    pub total_reconstruction_error: Option<f64>,
    /// Median distance to the true points after scale alignment.
    pub median_reconstruction_error: Option<f64>,
    /// Chordal distance between the estimated and the true relative rotation.
    pub rotation_error: Option<f64>,
    /// Chordal distance between the estimated and the true relative translation directions.
    pub translation_error: Option<f64>,
}

impl QualityReport {
    /// Column names of the flat representation, in order.
    pub const COLUMNS: [&'static str; 9] = [
        "reprojection_error",
        "num_points",
        "num_high_parallax",
        "num_good_points",
        "median_parallax_deg",
        "total_reconstruction_error",
        "median_reconstruction_error",
        "rotation_error",
        "translation_error",
    ];

    /// Flattens the report in [`QualityReport::COLUMNS`] order.
    pub fn to_columns(&self) -> [Option<f64>; 9] {
        [
            Some(self.reprojection_error),
            Some(self.num_points as f64),
            Some(self.num_high_parallax as f64),
            Some(self.num_good_points as f64),
            Some(self.median_parallax_deg),
            self.total_reconstruction_error,
            self.median_reconstruction_error,
            self.rotation_error,
            self.translation_error,
        ]
    }

    /// Rebuilds a report from [`QualityReport::COLUMNS`]-ordered values.
    ///
    /// Extra trailing values are ignored. Missing values read as NaN for metrics and
    /// zero for counts, and as `None` for the ground-truth fields.
    pub fn from_columns(columns: &[Option<f64>]) -> Self {
        let get = |i: usize| columns.get(i).copied().flatten();
        let count = |i: usize| {
            get(i)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(0.0) as usize
        };
        Self {
            reprojection_error: get(0).unwrap_or(f64::NAN),
            num_points: count(1),
            num_high_parallax: count(2),
            num_good_points: count(3),
            median_parallax_deg: get(4).unwrap_or(f64::NAN),
            total_reconstruction_error: get(5),
            median_reconstruction_error: get(6),
            rotation_error: get(7),
            translation_error: get(8),
        }
    }
}

/// Triangulate every correspondence with the given poses and score the reconstruction.
///
/// Ground-truth fields of the report are filled only for the parts of `truth` that are
/// present. The true pose is compared with `secondary` relative to `primary`. Both the
/// triangulated and the true points are expressed relative to the primary camera center
/// before [`reconstruction_error`] aligns their scale, since that is the fixed point of
/// an unknown baseline length.
///
/// # Arguments
///
/// * `primary` - Pose of the camera observing `(x0, y0)`.
/// * `secondary` - Candidate pose of the camera observing `(x1, y1)`.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondences` - The matched pixel pairs.
/// * `truth` - Whatever ground truth is available, possibly none.
/// * `params` - Parallax and residual thresholds.
pub fn assess(
    primary: &Pose,
    secondary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    truth: &GroundTruth<'_>,
    params: &QualityParams,
) -> Result<QualityReport, QualityError> {
    let points = triangulate_correspondences(secondary, primary, intrinsics, correspondences);

    let reprojection =
        reprojection_error(secondary, primary, intrinsics, correspondences, &points)?;
    let stats =
        parallax_and_good_points(primary, secondary, intrinsics, &points, correspondences, params)?;

    let origin = primary.center();
    let reconstruction = truth
        .points
        .map(|true_points| {
            let estimated = points
                .iter()
                .map(|x| (x.truncate() - origin).extend(1.0))
                .collect::<Vec<_>>();
            let expected = true_points.iter().map(|p| *p - origin).collect::<Vec<_>>();
            reconstruction_error(&estimated, &expected)
        })
        .transpose()?;

    let (rotation_error, translation_error) = match truth.pose {
        Some(true_pose) => {
            let estimated = secondary.relative_to(primary);
            let expected = true_pose.relative_to(primary);
            (
                Some(chordal_distance(&estimated.rotation, &expected.rotation)),
                Some(translation_chordal_distance(
                    estimated.translation,
                    expected.translation,
                )),
            )
        }
        None => (None, None),
    };

    log::debug!(
        "reprojection error {reprojection:.3e}, {} good, {} high parallax of {} points",
        stats.num_good,
        stats.num_high_parallax,
        points.len()
    );

    Ok(QualityReport {
        reprojection_error: reprojection,
        num_points: points.len(),
        num_high_parallax: stats.num_high_parallax,
        num_good_points: stats.num_good,
        median_parallax_deg: stats.median_parallax_deg,
        total_reconstruction_error: reconstruction.map(|r| r.total),
        median_reconstruction_error: reconstruction.map(|r| r.median),
        rotation_error,
        translation_error,
    })
}

fn ensure_same_len(expected: usize, actual: usize) -> Result<(), QualityError> {
    if expected != actual {
        return Err(QualityError::LengthMismatch { expected, actual });
    }
    Ok(())
}
