use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Disambiguation, DisambiguationError, HypothesisScore};
use crate::camera::{pixel_residual, CameraIntrinsics};
use crate::correspondence::Correspondence;
use crate::pose::Pose;
use crate::triangulation::triangulate;

/// Parameters of the essential-matrix cheirality vote.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EssentialParams {
    /// Number of correspondences drawn for the vote, fewer if the set is smaller.
    pub max_samples: usize,
    /// Optional RNG seed for deterministic runs.
    pub random_seed: Option<u64>,
}

impl Default for EssentialParams {
    fn default() -> Self {
        Self {
            max_samples: 32,
            random_seed: Some(0),
        }
    }
}

/// Vote tally of a cheirality test.
#[derive(Clone, Debug, PartialEq)]
pub struct CheiralityVotes {
    /// Votes per hypothesis, in input order.
    pub votes: Vec<usize>,
    /// Summed secondary-view reprojection error per hypothesis.
    pub reprojection_errors: Vec<f64>,
    /// Number of correspondences that voted for more than one hypothesis.
    pub ambiguous_samples: usize,
}

/// Count, for every relative pose, the correspondences it places in front of both cameras.
///
/// Each correspondence is triangulated with the primary camera at the identity and the
/// hypothesis as secondary camera. It votes for the hypothesis when the point has
/// positive depth in the primary camera and, mapped through the hypothesis, in the
/// secondary camera as well.
pub fn cheirality_votes(
    hypotheses: &[Pose],
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> CheiralityVotes {
    let primary = Pose::IDENTITY;
    let mut votes = vec![0usize; hypotheses.len()];
    let mut reprojection_errors = vec![0.0f64; hypotheses.len()];
    let mut ambiguous_samples = 0;

    for c in correspondences {
        let mut passing = 0;
        for (i, hyp) in hypotheses.iter().enumerate() {
            let x = triangulate(hyp, &primary, intrinsics, c);
            let point = x.truncate();
            reprojection_errors[i] +=
                pixel_residual(intrinsics.project_homogeneous(hyp, x), c.secondary());
            if point.z > 0.0 && hyp.transform_point(point).z > 0.0 {
                votes[i] += 1;
                passing += 1;
            }
        }
        if passing > 1 {
            ambiguous_samples += 1;
        }
    }

    CheiralityVotes {
        votes,
        reprojection_errors,
        ambiguous_samples,
    }
}

/// Select the valid relative pose among the four candidates of an essential matrix.
///
/// The candidates must be in the order `R1t1, R1t2, R2t1, R2t2` (see
/// [`crate::decomposition::EssentialDecomposition::hypotheses`]). The sampler is seeded
/// from `params.random_seed`, or from the thread RNG when no seed is given.
///
/// # Arguments
///
/// * `hypotheses` - The four candidate relative poses.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondences` - The matched pixel pairs to vote with.
/// * `params` - Sample budget and optional seed.
pub fn select_essential_hypothesis(
    hypotheses: &[Pose],
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    params: &EssentialParams,
) -> Result<Disambiguation, DisambiguationError> {
    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => {
            let mut tr = rand::rng();
            StdRng::from_rng(&mut tr)
        }
    };
    select_essential_hypothesis_with_rng(
        hypotheses,
        intrinsics,
        correspondences,
        params.max_samples,
        &mut rng,
    )
}

/// Like [`select_essential_hypothesis`], drawing samples from `rng`.
///
/// `min(max_samples, correspondences.len())` correspondences are drawn with replacement.
/// The hypothesis with the most cheirality votes wins; ties go to the lowest index. If
/// every hypothesis collects the same number of votes the result is flagged degenerate.
///
/// # Arguments
///
/// * `hypotheses` - The four candidate relative poses.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondences` - The matched pixel pairs to vote with.
/// * `max_samples` - Upper bound on the number of drawn correspondences.
/// * `rng` - Source of the sample indices.
pub fn select_essential_hypothesis_with_rng<R: Rng + ?Sized>(
    hypotheses: &[Pose],
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    max_samples: usize,
    rng: &mut R,
) -> Result<Disambiguation, DisambiguationError> {
    if hypotheses.len() != 4 {
        return Err(DisambiguationError::InvalidHypothesisCount {
            expected: 4,
            actual: hypotheses.len(),
        });
    }
    if correspondences.is_empty() {
        return Err(DisambiguationError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let num_samples = max_samples.min(correspondences.len());
    let samples = (0..num_samples)
        .map(|_| correspondences[rng.random_range(0..correspondences.len())])
        .collect::<Vec<_>>();

    let tally = cheirality_votes(hypotheses, intrinsics, &samples);
    log::debug!("cheirality votes: {:?}", tally.votes);

    let mut selected = 0;
    for (i, &v) in tally.votes.iter().enumerate() {
        if v > tally.votes[selected] {
            selected = i;
        }
    }
    let best = tally.votes[selected];
    let degenerate = tally.votes.iter().all(|&v| v == best);

    if tally.ambiguous_samples > 0 {
        log::warn!(
            "{} of {} samples passed cheirality for more than one hypothesis",
            tally.ambiguous_samples,
            num_samples
        );
    }
    if degenerate {
        log::warn!(
            "cheirality vote did not separate the hypotheses ({} votes each)",
            best
        );
    }

    let scores = hypotheses
        .iter()
        .zip(tally.votes.iter().zip(tally.reprojection_errors.iter()))
        .map(|(pose, (&votes, &reprojection_error))| HypothesisScore {
            pose: *pose,
            votes,
            reprojection_error,
            passed: best > 0 && votes == best,
        })
        .collect();

    Ok(Disambiguation {
        selected,
        hypotheses: scores,
        ambiguous_samples: tally.ambiguous_samples,
        degenerate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::decompose_essential;
    use crate::quality::{chordal_distance, translation_chordal_distance};
    use crate::test_utils::{
        essential_from_pose, sideways_secondary, synthetic_intrinsics, synthetic_scene,
    };

    #[test]
    fn test_selects_true_pose() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let secondary = sideways_secondary();
        let (_, correspondences) =
            synthetic_scene(7, 40, &intrinsics, &Pose::IDENTITY, &secondary);

        let hypotheses = decompose_essential(&essential_from_pose(&secondary)).hypotheses();
        let result = select_essential_hypothesis(
            &hypotheses,
            &intrinsics,
            &correspondences,
            &EssentialParams::default(),
        )?;

        let pose = result.pose();
        assert!(chordal_distance(&pose.rotation, &secondary.rotation) < 1e-8);
        assert!(translation_chordal_distance(pose.translation, secondary.translation) < 1e-8);
        assert!(!result.degenerate);
        assert_eq!(result.hypotheses[result.selected].votes, 32);
        assert_eq!(result.passed().count(), 1);
        assert!(result.hypotheses[result.selected].reprojection_error < 1e-6);
        Ok(())
    }

    #[test]
    fn test_sample_budget() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let secondary = sideways_secondary();
        let (_, correspondences) =
            synthetic_scene(3, 5, &intrinsics, &Pose::IDENTITY, &secondary);
        let hypotheses = decompose_essential(&essential_from_pose(&secondary)).hypotheses();

        let mut rng = StdRng::seed_from_u64(42);
        let result = select_essential_hypothesis_with_rng(
            &hypotheses,
            &intrinsics,
            &correspondences,
            32,
            &mut rng,
        )?;
        // the budget is capped at the size of the set
        assert_eq!(result.hypotheses[result.selected].votes, 5);
        Ok(())
    }

    #[test]
    fn test_seed_is_reproducible() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let secondary = sideways_secondary();
        let (_, correspondences) =
            synthetic_scene(11, 60, &intrinsics, &Pose::IDENTITY, &secondary);
        let hypotheses = decompose_essential(&essential_from_pose(&secondary)).hypotheses();
        let params = EssentialParams {
            max_samples: 32,
            random_seed: Some(5),
        };
        let a = select_essential_hypothesis(&hypotheses, &intrinsics, &correspondences, &params)?;
        let b = select_essential_hypothesis(&hypotheses, &intrinsics, &correspondences, &params)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_tie_goes_to_lowest_index() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let secondary = sideways_secondary();
        let (_, correspondences) =
            synthetic_scene(1, 10, &intrinsics, &Pose::IDENTITY, &secondary);
        let hypotheses = [secondary; 4];
        let result = select_essential_hypothesis(
            &hypotheses,
            &intrinsics,
            &correspondences,
            &EssentialParams::default(),
        )?;
        assert_eq!(result.selected, 0);
        assert!(result.degenerate);
        assert_eq!(result.ambiguous_samples, 10);
        Ok(())
    }

    #[test]
    fn test_invalid_input() {
        let intrinsics = synthetic_intrinsics();
        let c = [Correspondence::new(1.0, 2.0, 3.0, 4.0)];
        let res = select_essential_hypothesis(
            &[Pose::IDENTITY; 3],
            &intrinsics,
            &c,
            &EssentialParams::default(),
        );
        assert!(matches!(
            res,
            Err(DisambiguationError::InvalidHypothesisCount {
                expected: 4,
                actual: 3
            })
        ));

        let res = select_essential_hypothesis(
            &[Pose::IDENTITY; 4],
            &intrinsics,
            &[],
            &EssentialParams::default(),
        );
        assert!(matches!(
            res,
            Err(DisambiguationError::InsufficientData { .. })
        ));
    }
}
