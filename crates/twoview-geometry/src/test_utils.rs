//! Synthetic scenes shared by the unit tests.

use glam::{DMat3, DVec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{CameraIntrinsics, Correspondence, Pose};

pub(crate) fn synthetic_intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::new(540.0, 540.0, 320.0, 240.0, 640, 480)
}

/// Project a world point into both views, `None` if it is behind either camera.
pub(crate) fn project_correspondence(
    intrinsics: &CameraIntrinsics,
    primary: &Pose,
    secondary: &Pose,
    point: DVec3,
) -> Option<Correspondence> {
    let p0 = intrinsics.project(primary, point.extend(1.0))?;
    let p1 = intrinsics.project(secondary, point.extend(1.0))?;
    Some(Correspondence::from_pixels(p0, p1))
}

/// Random points in a box in front of the primary camera, kept only when visible in
/// both views.
pub(crate) fn synthetic_scene(
    seed: u64,
    num_points: usize,
    intrinsics: &CameraIntrinsics,
    primary: &Pose,
    secondary: &Pose,
) -> (Vec<DVec3>, Vec<Correspondence>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(num_points);
    let mut correspondences = Vec::with_capacity(num_points);
    while points.len() < num_points {
        let x = DVec3::new(
            rng.random_range(-1.5..1.5),
            rng.random_range(-1.0..1.0),
            rng.random_range(4.0..8.0),
        );
        if let Some(c) = project_correspondence(intrinsics, primary, secondary, x) {
            points.push(x);
            correspondences.push(c);
        }
    }
    (points, correspondences)
}

/// Secondary camera used by most tests: small yaw and a sideways baseline.
pub(crate) fn sideways_secondary() -> Pose {
    Pose::from_center(DMat3::from_rotation_y(-0.05), DVec3::new(0.4, 0.02, 0.05))
}

/// Skew-symmetric matrix such that `skew(t) * v = t x v`.
pub(crate) fn skew(t: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, t.z, -t.y),
        DVec3::new(-t.z, 0.0, t.x),
        DVec3::new(t.y, -t.x, 0.0),
    )
}

/// Essential matrix of a relative pose, `[t]x R`.
pub(crate) fn essential_from_pose(pose: &Pose) -> DMat3 {
    skew(pose.translation) * pose.rotation
}
