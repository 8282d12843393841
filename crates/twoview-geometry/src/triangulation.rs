use glam::{DMat4, DVec3, DVec4};

use crate::camera::{pixel_residual, CameraIntrinsics};
use crate::correspondence::Correspondence;
use crate::pose::Pose;

/// A triangulated point together with the quantities available while solving for it.
#[derive(Debug, Clone, Copy)]
pub struct Triangulation {
    /// Homogeneous world point with the fourth coordinate set to one.
    pub point: DVec4,
    /// Angle in degrees between the rays from both camera centers to the point.
    pub parallax_deg: f64,
    /// Depth of the point in the primary camera.
    pub depth_primary: f64,
    /// Depth of the point in the secondary camera.
    pub depth_secondary: f64,
    /// Pixel distance between the observation and the reprojection in the primary view.
    pub reprojection_error_primary: f64,
    /// Pixel distance between the observation and the reprojection in the secondary view.
    pub reprojection_error_secondary: f64,
}

/// Triangulate one correspondence with the Direct Linear Transform.
///
/// Each view contributes the rows `x * P[2] - P[0]` and `y * P[2] - P[1]`, with
/// `P = K4 * pose`. The point is the right singular vector of the stacked 4x4 system
/// with the smallest singular value, scaled so that its fourth coordinate is one.
///
/// When both rays coincide (no baseline) the system has rank two and its null space is
/// spanned by the primary camera center and the viewing ray. The point is then placed
/// on that ray at unit depth in the primary camera. A point at infinity yields
/// non-finite coordinates rather than an error.
///
/// # Arguments
///
/// * `secondary` - Pose of the camera observing `(x1, y1)`.
/// * `primary` - Pose of the camera observing `(x0, y0)`.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondence` - The matched pixel pair.
pub fn triangulate(
    secondary: &Pose,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondence: &Correspondence,
) -> DVec4 {
    let p0 = intrinsics.projection_matrix(primary);
    let p1 = intrinsics.projection_matrix(secondary);
    triangulate_dlt(&p0, &p1, primary.center(), correspondence)
}

/// Triangulate one correspondence and report parallax, depths and residuals.
pub fn triangulate_with_diagnostics(
    secondary: &Pose,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondence: &Correspondence,
) -> Triangulation {
    let p0 = intrinsics.projection_matrix(primary);
    let p1 = intrinsics.projection_matrix(secondary);
    let point = triangulate_dlt(&p0, &p1, primary.center(), correspondence);

    let proj0 = p0 * point;
    let proj1 = p1 * point;

    Triangulation {
        point,
        parallax_deg: parallax_angle(point.truncate(), primary, secondary),
        depth_primary: proj0.z,
        depth_secondary: proj1.z,
        reprojection_error_primary: pixel_residual(proj0, correspondence.primary()),
        reprojection_error_secondary: pixel_residual(proj1, correspondence.secondary()),
    }
}

/// Triangulate every correspondence, one point per input in the same order.
pub fn triangulate_correspondences(
    secondary: &Pose,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> Vec<DVec4> {
    let p0 = intrinsics.projection_matrix(primary);
    let p1 = intrinsics.projection_matrix(secondary);
    let center = primary.center();
    correspondences
        .iter()
        .map(|c| triangulate_dlt(&p0, &p1, center, c))
        .collect()
}

/// Angle in degrees, seen from `point`, between the two camera centers.
///
/// Returns NaN when the point coincides with a camera center.
pub fn parallax_angle(point: DVec3, primary: &Pose, secondary: &Pose) -> f64 {
    let u = point - primary.center();
    let v = point - secondary.center();
    let cos_angle = (u.dot(v) / (u.length() * v.length())).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Relative size of the third singular value below which the DLT system is rank two.
const RANK_TOLERANCE: f64 = 1e-10;

fn triangulate_dlt(p0: &DMat4, p1: &DMat4, center: DVec3, c: &Correspondence) -> DVec4 {
    let mut a = faer::Mat::<f64>::zeros(4, 4);
    write_dlt_row(&mut a, 0, c.x0, p0.row(2), p0.row(0));
    write_dlt_row(&mut a, 1, c.y0, p0.row(2), p0.row(1));
    write_dlt_row(&mut a, 2, c.x1, p1.row(2), p1.row(0));
    write_dlt_row(&mut a, 3, c.y1, p1.row(2), p1.row(1));

    let svd = a.svd();
    let s = svd.s_diagonal();
    let v = svd.v();
    let column = |j: usize| DVec4::new(v.read(0, j), v.read(1, j), v.read(2, j), v.read(3, j));

    if s[2] <= RANK_TOLERANCE * s[0] {
        return point_on_primary_ray(p0, center, [column(2), column(3)]);
    }

    let xh = column(3);
    DVec4::new(xh.x / xh.w, xh.y / xh.w, xh.z / xh.w, 1.0)
}

/// Picks the point at unit primary depth on the ray spanned, together with the
/// camera center, by a two-dimensional null space.
fn point_on_primary_ray(p0: &DMat4, center: DVec3, null_space: [DVec4; 2]) -> DVec4 {
    let c = center.extend(1.0);
    let [a, b] = null_space.map(|n| n - c * (n.dot(c) / c.dot(c)));
    let q = if a.length_squared() >= b.length_squared() { a } else { b };

    // q = alpha * (C, 1) + (d, 0), keep the direction d
    let direction = q.truncate() - q.w * center;
    let depth = (*p0 * direction.extend(0.0)).z;
    (center + direction / depth).extend(1.0)
}

fn write_dlt_row(a: &mut faer::Mat<f64>, row: usize, x: f64, p3: DVec4, p1: DVec4) {
    let r = x * p3 - p1;
    for j in 0..4 {
        a.write(row, j, r[j]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{project_correspondence, synthetic_intrinsics};
    use approx::assert_relative_eq;
    use glam::DMat3;

    #[test]
    fn test_triangulate_roundtrip() {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::IDENTITY;
        let secondary = Pose::from_center(
            DMat3::from_rotation_y(-0.1),
            DVec3::new(0.4, 0.05, -0.1),
        );
        for x in [
            DVec3::new(0.2, -0.3, 4.0),
            DVec3::new(-1.0, 0.5, 6.5),
            DVec3::new(0.0, 0.0, 2.0),
        ] {
            let c = project_correspondence(&intrinsics, &primary, &secondary, x)
                .expect("point visible in both views");
            let point = triangulate(&secondary, &primary, &intrinsics, &c);
            assert_eq!(point.w, 1.0);
            assert_relative_eq!(point.x, x.x, epsilon = 1e-8);
            assert_relative_eq!(point.y, x.y, epsilon = 1e-8);
            assert_relative_eq!(point.z, x.z, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_triangulate_with_non_identity_primary() {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::from_center(DMat3::from_rotation_x(0.05), DVec3::new(-0.3, 0.0, 0.0));
        let secondary = Pose::from_center(DMat3::from_rotation_y(0.08), DVec3::new(0.3, 0.1, 0.2));
        let x = DVec3::new(0.1, 0.2, 5.0);
        let c = project_correspondence(&intrinsics, &primary, &secondary, x)
            .expect("point visible in both views");
        let point = triangulate(&secondary, &primary, &intrinsics, &c);
        assert_relative_eq!((point.truncate() - x).length(), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_diagnostics() {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::IDENTITY;
        let secondary = Pose::from_center(DMat3::IDENTITY, DVec3::new(1.0, 0.0, 0.0));
        // point equidistant from both centers, rays meet at 2 * atan(0.5 / 2)
        let x = DVec3::new(0.5, 0.0, 2.0);
        let c = project_correspondence(&intrinsics, &primary, &secondary, x)
            .expect("point visible in both views");
        let tri = triangulate_with_diagnostics(&secondary, &primary, &intrinsics, &c);

        let expected = 2.0 * (0.5f64 / 2.0).atan().to_degrees();
        assert_relative_eq!(tri.parallax_deg, expected, epsilon = 1e-6);
        assert_relative_eq!(tri.depth_primary, 2.0, epsilon = 1e-8);
        assert_relative_eq!(tri.depth_secondary, 2.0, epsilon = 1e-8);
        assert!(tri.reprojection_error_primary < 1e-8);
        assert!(tri.reprojection_error_secondary < 1e-8);
    }

    #[test]
    fn test_zero_motion_lands_on_the_viewing_ray() {
        let intrinsics = synthetic_intrinsics();
        let pose = Pose::from_center(DMat3::from_rotation_z(0.1), DVec3::new(0.3, -0.2, 1.0));
        for x in [DVec3::new(0.5, 0.1, 6.0), DVec3::new(-0.4, 0.3, 3.0)] {
            let c = project_correspondence(&intrinsics, &pose, &pose, x)
                .expect("point visible in both views");
            let tri = triangulate_with_diagnostics(&pose, &pose, &intrinsics, &c);
            assert!(tri.point.is_finite());
            assert_relative_eq!(tri.depth_primary, 1.0, epsilon = 1e-9);
            assert!(tri.depth_secondary > 0.0);
            assert!(tri.reprojection_error_primary < 1e-6);
            assert!(tri.reprojection_error_secondary < 1e-6);
            assert!(tri.parallax_deg.is_finite() && tri.parallax_deg < 1e-3);

            // the recovered point lies on the ray through the true point
            let ray = (x - pose.center()).normalize();
            let found = (tri.point.truncate() - pose.center()).normalize();
            assert_relative_eq!(ray.dot(found), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_pure_rotation_lands_on_the_viewing_ray() {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::IDENTITY;
        let secondary = Pose::from_center(DMat3::from_rotation_y(0.1), DVec3::ZERO);
        let x = DVec3::new(0.2, -0.1, 5.0);
        let c = project_correspondence(&intrinsics, &primary, &secondary, x)
            .expect("point visible in both views");
        let tri = triangulate_with_diagnostics(&secondary, &primary, &intrinsics, &c);
        assert!(tri.point.is_finite());
        assert!(tri.depth_primary > 0.0 && tri.depth_secondary > 0.0);
        assert!(tri.reprojection_error_primary < 1e-6);
        assert!(tri.reprojection_error_secondary < 1e-6);
        assert!(tri.parallax_deg < 1e-3);
    }

    #[test]
    fn test_parallax_same_center_is_zero() {
        let pose = Pose::from_center(DMat3::IDENTITY, DVec3::new(0.2, 0.0, 0.0));
        let parallax = parallax_angle(DVec3::new(1.0, 2.0, 5.0), &pose, &pose);
        assert_relative_eq!(parallax, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_triangulate_correspondences_keeps_order() {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::IDENTITY;
        let secondary = Pose::from_center(DMat3::IDENTITY, DVec3::new(0.5, 0.0, 0.0));
        let points = [DVec3::new(0.0, 0.0, 3.0), DVec3::new(1.0, 1.0, 8.0)];
        let correspondences = points
            .iter()
            .filter_map(|x| project_correspondence(&intrinsics, &primary, &secondary, *x))
            .collect::<Vec<_>>();
        let triangulated =
            triangulate_correspondences(&secondary, &primary, &intrinsics, &correspondences);
        assert_eq!(triangulated.len(), 2);
        for (est, truth) in triangulated.iter().zip(points.iter()) {
            assert_relative_eq!((est.truncate() - *truth).length(), 0.0, epsilon = 1e-8);
        }
    }
}
