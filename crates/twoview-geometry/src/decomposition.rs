use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::pose::Pose;

/// Build an essential matrix from a fundamental matrix, both views sharing `intrinsics`.
///
/// E = K^T * F * K
pub fn essential_from_fundamental(f: &DMat3, intrinsics: &CameraIntrinsics) -> DMat3 {
    let k = intrinsics.matrix();
    k.transpose() * *f * k
}

/// Fundamental matrix of a relative pose, both views sharing `intrinsics`.
///
/// F = K^-T * [t]x * R * K^-1, so that `x1^T * F * x0 = 0` for pixels `x0` in the
/// reference view and `x1` in the view at `relative`.
pub fn fundamental_from_pose(relative: &Pose, intrinsics: &CameraIntrinsics) -> DMat3 {
    let t = relative.translation;
    let t_cross = DMat3::from_cols(
        DVec3::new(0.0, t.z, -t.y),
        DVec3::new(-t.z, 0.0, t.x),
        DVec3::new(t.y, -t.x, 0.0),
    );
    let k_inv = intrinsics.matrix().inverse();
    k_inv.transpose() * t_cross * relative.rotation * k_inv
}

/// The two rotations and the translation direction encoded by an essential matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EssentialDecomposition {
    /// First rotation, `U * W * V^T`.
    pub r1: DMat3,
    /// Second rotation, `U * W^T * V^T`.
    pub r2: DMat3,
    /// Unit translation direction, last column of `U`.
    pub t: DVec3,
}

impl EssentialDecomposition {
    /// The four pose hypotheses in the fixed order `R1t1, R1t2, R2t1, R2t2`,
    /// where `t2 = -t1`.
    pub fn hypotheses(&self) -> [Pose; 4] {
        [
            Pose::new(self.r1, self.t),
            Pose::new(self.r1, -self.t),
            Pose::new(self.r2, self.t),
            Pose::new(self.r2, -self.t),
        ]
    }
}

/// Decompose an essential matrix into two rotations and a unit translation.
pub fn decompose_essential(e: &DMat3) -> EssentialDecomposition {
    let (mut u, _, mut v) = svd3(e);

    if u.determinant() < 0.0 {
        u.z_axis = -u.z_axis;
    }
    if v.determinant() < 0.0 {
        v.z_axis = -v.z_axis;
    }

    let w = DMat3::from_cols(
        DVec3::new(0.0, 1.0, 0.0),
        DVec3::new(-1.0, 0.0, 0.0),
        DVec3::new(0.0, 0.0, 1.0),
    );

    EssentialDecomposition {
        r1: u * w * v.transpose(),
        r2: u * w.transpose() * v.transpose(),
        t: u.z_axis,
    }
}

/// One `(R, T, N)` solution of a homography decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomographyDecomposition {
    /// Relative pose; the translation is scaled by the inverse plane distance.
    pub pose: Pose,
    /// Unit plane normal in the primary camera frame.
    pub normal: DVec3,
}

/// Decompose a pixel homography into its candidate relative poses.
///
/// The calibrated homography `K^-1 * H * K` is normalized by its middle singular value
/// and its sign fixed so that it reads `R + T * N^T`. The result holds four solutions in
/// the order `(R1, T1, N1), (R1, -T1, -N1), (R2, T2, N2), (R2, -T2, -N2)`; two of them
/// place the plane in front of both cameras.
///
/// When the homography is a pure rotation (equal singular values) a single candidate
/// with zero translation is returned.
pub fn decompose_homography(
    h: &DMat3,
    intrinsics: &CameraIntrinsics,
) -> Vec<HomographyDecomposition> {
    let k = intrinsics.matrix();
    let hc = k.inverse() * *h * k;

    let (_, s, mut v) = svd3(&hc);
    let mut hn = hc * (1.0 / s.y);
    if hn.determinant() < 0.0 {
        hn = -hn;
    }
    if v.determinant() < 0.0 {
        v = -v;
    }

    let s1 = (s.x / s.y).powi(2);
    let s3 = (s.z / s.y).powi(2);
    let spread = s1 - s3;
    if spread < 1e-10 {
        return vec![HomographyDecomposition {
            pose: Pose::new(hn, DVec3::ZERO),
            normal: DVec3::ZERO,
        }];
    }

    let (v1, v2, v3) = (v.x_axis, v.y_axis, v.z_axis);
    let a = (1.0 - s3).max(0.0).sqrt();
    let b = (s1 - 1.0).max(0.0).sqrt();
    let norm = spread.sqrt();
    let u1 = (a * v1 + b * v3) / norm;
    let u2 = (a * v1 - b * v3) / norm;

    let solve = |u: DVec3| -> (DMat3, DVec3, DVec3) {
        let hv2 = hn * v2;
        let hu = hn * u;
        let basis = DMat3::from_cols(v2, u, v2.cross(u));
        let image = DMat3::from_cols(hv2, hu, hv2.cross(hu));
        let r = image * basis.transpose();
        let n = v2.cross(u);
        let t = (hn - r) * n;
        (r, t, n)
    };

    let (r1, t1, n1) = solve(u1);
    let (r2, t2, n2) = solve(u2);

    vec![
        HomographyDecomposition {
            pose: Pose::new(r1, t1),
            normal: n1,
        },
        HomographyDecomposition {
            pose: Pose::new(r1, -t1),
            normal: -n1,
        },
        HomographyDecomposition {
            pose: Pose::new(r2, t2),
            normal: n2,
        },
        HomographyDecomposition {
            pose: Pose::new(r2, -t2),
            normal: -n2,
        },
    ]
}

/// Singular value decomposition of a 3x3 matrix, `m = U * diag(s) * V^T`,
/// singular values in decreasing order.
pub(crate) fn svd3(m: &DMat3) -> (DMat3, DVec3, DMat3) {
    let a = faer::mat![
        [m.x_axis.x, m.y_axis.x, m.z_axis.x],
        [m.x_axis.y, m.y_axis.y, m.z_axis.y],
        [m.x_axis.z, m.y_axis.z, m.z_axis.z]
    ];
    let svd = a.svd();
    let s = svd.s_diagonal();
    (
        from_faer_mat3(svd.u()),
        DVec3::new(s[0], s[1], s[2]),
        from_faer_mat3(svd.v()),
    )
}

fn from_faer_mat3(m: faer::MatRef<'_, f64>) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(m.read(0, 0), m.read(1, 0), m.read(2, 0)),
        DVec3::new(m.read(0, 1), m.read(1, 1), m.read(2, 1)),
        DVec3::new(m.read(0, 2), m.read(1, 2), m.read(2, 2)),
    )
}
