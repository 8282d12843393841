use glam::DMat3;

use crate::camera::CameraIntrinsics;
use crate::correspondence::Correspondence;

/// Minimum correspondences for the seven-point fundamental solver.
pub const MIN_CORRESPONDENCES_FUNDAMENTAL: usize = 7;

/// Minimum correspondences for the four-point homography solver.
pub const MIN_CORRESPONDENCES_HOMOGRAPHY: usize = 4;

/// Minimum correspondences for the five-point essential solver.
pub const MIN_CORRESPONDENCES_ESSENTIAL: usize = 5;

/// Error types for geometric model estimation.
#[derive(Debug, thiserror::Error)]
pub enum EstimationError {
    /// Not enough correspondences for the minimal solver.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },

    /// The estimator ran but produced no model.
    #[error("Estimation failed: {0}")]
    Failed(String),
}

/// Robust estimators for the three two-view models.
///
/// Implementations typically wrap a RANSAC loop around the minimal solvers. Every
/// method returns the model mapping primary pixels to secondary pixels, i.e.
/// `x1^T F x0 = 0`, `x1 ~ H x0` and `x1n^T E x0n = 0` for normalized coordinates.
pub trait GeometricModelEstimator {
    /// Estimate the fundamental matrix.
    fn fundamental(
        &mut self,
        correspondences: &[Correspondence],
        intrinsics: &CameraIntrinsics,
    ) -> Result<DMat3, EstimationError>;

    /// Estimate the homography.
    fn homography(
        &mut self,
        correspondences: &[Correspondence],
        intrinsics: &CameraIntrinsics,
    ) -> Result<DMat3, EstimationError>;

    /// Estimate the essential matrix.
    fn essential(
        &mut self,
        correspondences: &[Correspondence],
        intrinsics: &CameraIntrinsics,
    ) -> Result<DMat3, EstimationError>;
}

/// Check that `correspondences` is large enough for a solver needing `required` points.
pub fn ensure_min_correspondences(
    correspondences: &[Correspondence],
    required: usize,
) -> Result<(), EstimationError> {
    if correspondences.len() < required {
        return Err(EstimationError::InsufficientData {
            required,
            actual: correspondences.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_min_correspondences() {
        let c = vec![Correspondence::new(0.0, 0.0, 1.0, 1.0); 4];
        assert!(ensure_min_correspondences(&c, MIN_CORRESPONDENCES_HOMOGRAPHY).is_ok());
        let err = ensure_min_correspondences(&c, MIN_CORRESPONDENCES_ESSENTIAL).unwrap_err();
        assert!(matches!(
            err,
            EstimationError::InsufficientData {
                required: 5,
                actual: 4
            }
        ));
        assert_eq!(err.to_string(), "Need at least 5 correspondences, got 4");
    }
}
