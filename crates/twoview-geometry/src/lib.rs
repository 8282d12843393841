#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera intrinsics and projection.
pub mod camera;

/// Pixel correspondences between two views.
pub mod correspondence;

/// Essential and homography matrix decompositions.
pub mod decomposition;

/// Selection of the physically valid pose among algebraic candidates.
pub mod disambiguation;

/// Interface to external two-view model estimators.
pub mod estimator;

/// Rigid camera poses.
pub mod pose;

/// Reconstruction quality metrics.
pub mod quality;

/// Linear triangulation of correspondences.
pub mod triangulation;

#[cfg(test)]
pub(crate) mod test_utils;

pub use camera::CameraIntrinsics;
pub use correspondence::Correspondence;
pub use pose::Pose;
