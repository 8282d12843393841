use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Rigid world-to-camera transform.
///
/// A world point `X` maps to camera coordinates as `R * X + t`. The translation is the
/// extrinsic one, `t = -R * C`, where `C` is the camera center in the world frame; use
/// [`Pose::from_center`] and [`Pose::center`] to move between the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-to-camera rotation.
    pub rotation: DMat3,
    /// Extrinsic translation `-R * C`.
    pub translation: DVec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// Camera at the world origin looking down +Z.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Creates a pose from a rotation and an extrinsic translation.
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates a pose from a rotation and the camera center in world coordinates.
    pub fn from_center(rotation: DMat3, center: DVec3) -> Self {
        Self {
            rotation,
            translation: -(rotation * center),
        }
    }

    /// Creates a pose from a world-to-camera quaternion and the camera center.
    ///
    /// The quaternion is normalized before use.
    pub fn from_quaternion(quaternion: DQuat, center: DVec3) -> Self {
        Self::from_center(DMat3::from_quat(quaternion.normalize()), center)
    }

    /// Returns the camera center `C = -R^T * t` in world coordinates.
    pub fn center(&self) -> DVec3 {
        -(self.rotation.transpose() * self.translation)
    }

    /// Returns the rotation as a unit quaternion.
    pub fn quaternion(&self) -> DQuat {
        DQuat::from_mat3(&self.rotation)
    }

    /// Returns the homogeneous 4x4 matrix `[R | t; 0 1]`.
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_cols(
            self.rotation.x_axis.extend(0.0),
            self.rotation.y_axis.extend(0.0),
            self.rotation.z_axis.extend(0.0),
            self.translation.extend(1.0),
        )
    }

    /// Reads a pose from the upper 3x4 block of a homogeneous matrix.
    pub fn from_matrix(m: &DMat4) -> Self {
        Self {
            rotation: DMat3::from_mat4(*m),
            translation: m.w_axis.truncate(),
        }
    }

    /// Maps a world point into camera coordinates.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Returns `self ∘ other`: the transform that applies `other` first, then `self`.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Returns the inverse transform (camera-to-world).
    pub fn inverse(&self) -> Pose {
        let rt = self.rotation.transpose();
        Pose {
            rotation: rt,
            translation: -(rt * self.translation),
        }
    }

    /// Returns the pose of this camera relative to `reference`, i.e. `self ∘ reference⁻¹`.
    pub fn relative_to(&self, reference: &Pose) -> Pose {
        self.compose(&reference.inverse())
    }
}
