use glam::{DMat3, DMat4, DVec2, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::pose::Pose;

/// A struct representing the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in x direction (pixels).
    pub fx: f64,
    /// Focal length in y direction (pixels).
    pub fy: f64,
    /// Principal point x coordinate (pixels).
    pub cx: f64,
    /// Principal point y coordinate (pixels).
    pub cy: f64,
    /// Axis skew.
    pub skew: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl CameraIntrinsics {
    /// Creates zero-skew intrinsics from focal lengths, principal point and image size.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
            width,
            height,
        }
    }

    /// Returns a copy of the intrinsics with the given skew.
    pub fn with_skew(self, skew: f64) -> Self {
        Self { skew, ..self }
    }

    /// Returns the 3x3 camera matrix K.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.fx, 0.0, 0.0),
            DVec3::new(self.skew, self.fy, 0.0),
            DVec3::new(self.cx, self.cy, 1.0),
        )
    }

    /// Returns K embedded in the upper-left block of a 4x4 identity.
    ///
    /// Multiplying `K4 * [R | t] * X` gives `(u*z, v*z, z, w)`: the third element is the
    /// camera-frame depth and the fourth the homogeneous weight of `X`.
    pub fn matrix4(&self) -> DMat4 {
        DMat4::from_cols(
            DVec4::new(self.fx, 0.0, 0.0, 0.0),
            DVec4::new(self.skew, self.fy, 0.0, 0.0),
            DVec4::new(self.cx, self.cy, 1.0, 0.0),
            DVec4::W,
        )
    }

    /// Returns the lifted projection matrix `K4 * pose`.
    pub fn projection_matrix(&self, pose: &Pose) -> DMat4 {
        self.matrix4() * pose.matrix()
    }

    /// Projects a homogeneous world point without dividing by depth.
    pub fn project_homogeneous(&self, pose: &Pose, point: DVec4) -> DVec4 {
        self.projection_matrix(pose) * point
    }

    /// Projects a homogeneous world point to pixel coordinates.
    ///
    /// Returns `None` when the point has non-positive depth in the camera.
    pub fn project(&self, pose: &Pose, point: DVec4) -> Option<DVec2> {
        let x = self.project_homogeneous(pose, point);
        if x.z > 0.0 {
            Some(dehomogenize(x))
        } else {
            None
        }
    }
}

/// Divide the pixel part of a lifted projection by its depth.
pub(crate) fn dehomogenize(x: DVec4) -> DVec2 {
    DVec2::new(x.x / x.z, x.y / x.z)
}

/// Pixel distance between a lifted projection and an observation.
pub(crate) fn pixel_residual(x: DVec4, observed: DVec2) -> f64 {
    (dehomogenize(x) - observed).length()
}
