//! Selection of the physically valid pose among the candidates of a matrix decomposition.
//!
//! An essential matrix yields four `(R, t)` candidates and a homography up to four
//! `(R, T, N)` triples; only one of them places the scene in front of both cameras and
//! explains the observations. The functions here score every candidate and return the
//! winner together with the per-candidate scores.

mod essential;
mod homography;

pub use essential::{
    cheirality_votes, select_essential_hypothesis, select_essential_hypothesis_with_rng,
    CheiralityVotes, EssentialParams,
};
pub use homography::select_homography_hypothesis;

use glam::DMat3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::correspondence::Correspondence;
use crate::decomposition::{decompose_essential, decompose_homography, essential_from_fundamental};
use crate::pose::Pose;

/// Error types for hypothesis disambiguation.
#[derive(Debug, thiserror::Error)]
pub enum DisambiguationError {
    /// Not enough correspondences to score the hypotheses.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },

    /// The candidate list does not have the expected size.
    #[error("Expected {expected} pose hypotheses, got {actual}")]
    InvalidHypothesisCount {
        /// Expected number of hypotheses.
        expected: usize,
        /// Number of hypotheses provided.
        actual: usize,
    },
}

/// Score of one candidate pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisScore {
    /// The candidate relative pose.
    pub pose: Pose,
    /// Number of scored correspondences triangulated in front of both cameras.
    pub votes: usize,
    /// Summed pixel reprojection error in the secondary view over the scored correspondences.
    pub reprojection_error: f64,
    /// Whether the candidate survived the cheirality filter.
    pub passed: bool,
}

/// Outcome of a disambiguation: the winner and the scores of every candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disambiguation {
    /// Index of the winning candidate in `hypotheses`.
    pub selected: usize,
    /// Per-candidate scores in input order.
    pub hypotheses: Vec<HypothesisScore>,
    /// Number of scored correspondences for which more than one candidate passed cheirality.
    pub ambiguous_samples: usize,
    /// True when the scores could not separate the candidates.
    ///
    /// The lowest-index candidate is selected in that case.
    pub degenerate: bool,
}

impl Disambiguation {
    /// The selected relative pose.
    pub fn pose(&self) -> Pose {
        self.hypotheses[self.selected].pose
    }

    /// Scores of the candidates that survived the cheirality filter.
    pub fn passed(&self) -> impl Iterator<Item = &HypothesisScore> {
        self.hypotheses.iter().filter(|h| h.passed)
    }
}

/// Decompose an essential matrix and select the valid relative pose.
pub fn pose_from_essential(
    e: &DMat3,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    params: &EssentialParams,
) -> Result<Disambiguation, DisambiguationError> {
    let hypotheses = decompose_essential(e).hypotheses();
    select_essential_hypothesis(&hypotheses, intrinsics, correspondences, params)
}

/// Upgrade a fundamental matrix to an essential matrix and select the valid relative pose.
pub fn pose_from_fundamental(
    f: &DMat3,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    params: &EssentialParams,
) -> Result<Disambiguation, DisambiguationError> {
    let e = essential_from_fundamental(f, intrinsics);
    pose_from_essential(&e, intrinsics, correspondences, params)
}

/// Decompose a homography and select the valid relative pose.
///
/// The translation of the returned pose is scaled by the inverse distance to the plane.
pub fn pose_from_homography(
    h: &DMat3,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> Result<Disambiguation, DisambiguationError> {
    let hypotheses = decompose_homography(h, intrinsics)
        .into_iter()
        .map(|d| d.pose)
        .collect::<Vec<_>>();
    select_homography_hypothesis(&hypotheses, primary, intrinsics, correspondences)
}
