use super::{Disambiguation, DisambiguationError, HypothesisScore};
use crate::camera::{pixel_residual, CameraIntrinsics};
use crate::correspondence::Correspondence;
use crate::pose::Pose;
use crate::triangulation::triangulate;

/// Select the valid relative pose among the candidates of a homography decomposition.
///
/// Every candidate is composed with `primary` and scored over all correspondences: the
/// cheirality score counts points triangulated in front of both cameras and the error
/// sums the pixel reprojection error in the secondary view. Candidates whose score
/// exceeds the mean score pass (normally the two members of the twisted pair); among
/// those the one with the lowest error wins, NaN errors ranking last.
///
/// A single candidate (pure rotation) is returned as is. When no candidate exceeds the
/// mean the first one is returned and the result is flagged degenerate.
///
/// # Arguments
///
/// * `hypotheses` - Candidate relative poses from the homography decomposition.
/// * `primary` - Pose of the camera observing `(x0, y0)`.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondences` - The matched pixel pairs to score with.
pub fn select_homography_hypothesis(
    hypotheses: &[Pose],
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> Result<Disambiguation, DisambiguationError> {
    if hypotheses.is_empty() {
        return Err(DisambiguationError::InvalidHypothesisCount {
            expected: 4,
            actual: 0,
        });
    }
    if correspondences.is_empty() {
        return Err(DisambiguationError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let mut scores = hypotheses
        .iter()
        .map(|hyp| score_hypothesis(hyp, primary, intrinsics, correspondences))
        .collect::<Vec<_>>();

    if scores.len() == 1 {
        scores[0].passed = true;
        return Ok(Disambiguation {
            selected: 0,
            hypotheses: scores,
            ambiguous_samples: 0,
            degenerate: false,
        });
    }

    let mean = scores.iter().map(|s| s.votes as f64).sum::<f64>() / scores.len() as f64;
    for s in scores.iter_mut() {
        s.passed = s.votes as f64 > mean;
    }
    log::debug!(
        "homography cheirality scores {:?}, mean {mean}",
        scores.iter().map(|s| s.votes).collect::<Vec<_>>()
    );

    let num_passed = scores.iter().filter(|s| s.passed).count();
    if num_passed == 0 {
        log::warn!("no homography hypothesis exceeds the mean cheirality score");
        return Ok(Disambiguation {
            selected: 0,
            hypotheses: scores,
            ambiguous_samples: 0,
            degenerate: true,
        });
    }
    if num_passed != 2 {
        log::warn!("{num_passed} homography hypotheses passed cheirality, expected 2");
    }

    let mut selected = None;
    let mut best_error = f64::INFINITY;
    for (i, s) in scores.iter().enumerate() {
        if !s.passed {
            continue;
        }
        let error = if s.reprojection_error.is_nan() {
            f64::INFINITY
        } else {
            s.reprojection_error
        };
        if selected.is_none() || error < best_error {
            selected = Some(i);
            best_error = error;
        }
    }

    Ok(Disambiguation {
        selected: selected.unwrap_or(0),
        hypotheses: scores,
        ambiguous_samples: 0,
        degenerate: false,
    })
}

fn score_hypothesis(
    hypothesis: &Pose,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
) -> HypothesisScore {
    let secondary = hypothesis.compose(primary);
    let p1 = intrinsics.projection_matrix(&secondary);

    let mut votes = 0;
    let mut reprojection_error = 0.0;
    for c in correspondences {
        let x = triangulate(&secondary, primary, intrinsics, c);
        let b = p1 * x;
        if b.z > 0.0 && primary.transform_point(x.truncate()).z > 0.0 {
            votes += 1;
        }
        reprojection_error += pixel_residual(b, c.secondary());
    }

    HypothesisScore {
        pose: *hypothesis,
        votes,
        reprojection_error,
        passed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decomposition::decompose_homography;
    use crate::quality::chordal_distance;
    use crate::test_utils::{project_correspondence, synthetic_intrinsics};
    use glam::{DMat3, DVec3};

    #[test]
    fn test_single_candidate() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let rotation = Pose::new(DMat3::from_rotation_y(0.05), DVec3::ZERO);
        let c = [Correspondence::new(300.0, 200.0, 310.0, 205.0)];
        let result =
            select_homography_hypothesis(&[rotation], &Pose::IDENTITY, &intrinsics, &c)?;
        assert_eq!(result.selected, 0);
        assert_eq!(result.pose(), rotation);
        assert!(result.hypotheses[0].passed);
        assert!(!result.degenerate);
        Ok(())
    }

    #[test]
    fn test_none_pass_is_degenerate() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let secondary = Pose::from_center(DMat3::IDENTITY, DVec3::new(0.5, 0.0, 0.0));
        let c = project_correspondence(
            &intrinsics,
            &Pose::IDENTITY,
            &secondary,
            DVec3::new(0.1, 0.2, 5.0),
        )
        .expect("point visible in both views");
        // identical candidates share one score, none exceeds the mean
        let result =
            select_homography_hypothesis(&[secondary; 4], &Pose::IDENTITY, &intrinsics, &[c])?;
        assert!(result.degenerate);
        assert_eq!(result.selected, 0);
        assert_eq!(result.passed().count(), 0);
        Ok(())
    }

    #[test]
    fn test_primary_pose_is_applied() -> Result<(), DisambiguationError> {
        let intrinsics = synthetic_intrinsics();
        let primary = Pose::from_center(DMat3::from_rotation_x(0.1), DVec3::new(1.0, -0.5, 2.0));
        let relative = Pose::from_center(DMat3::from_rotation_y(0.1), DVec3::new(0.5, 0.1, 0.0));
        let secondary = relative.compose(&primary);

        // plane at depth 5 in front of the primary camera
        let normal = DVec3::Z;
        let distance = 5.0;
        let camera_to_world = primary.inverse();
        let mut correspondences = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                let local = DVec3::new(-1.0 + 0.5 * i as f64, -0.8 + 0.4 * j as f64, distance);
                let world = camera_to_world.transform_point(local);
                if let Some(c) = project_correspondence(&intrinsics, &primary, &secondary, world) {
                    correspondences.push(c);
                }
            }
        }
        assert_eq!(correspondences.len(), 25);

        let k = intrinsics.matrix();
        let h_calibrated = relative.rotation
            + DMat3::from_cols(
                relative.translation * normal.x,
                relative.translation * normal.y,
                relative.translation * normal.z,
            ) * (1.0 / distance);
        let h = k * h_calibrated * k.inverse();

        let hypotheses = decompose_homography(&h, &intrinsics)
            .into_iter()
            .map(|d| d.pose)
            .collect::<Vec<_>>();
        let result =
            select_homography_hypothesis(&hypotheses, &primary, &intrinsics, &correspondences)?;

        assert!(!result.degenerate);
        assert_eq!(result.passed().count(), 2);
        let truth_passed = result.passed().any(|s| {
            chordal_distance(&s.pose.rotation, &relative.rotation) < 1e-8
                && (s.pose.translation - relative.translation / distance).length() < 1e-8
        });
        assert!(truth_passed);
        assert!(result.hypotheses[result.selected].passed);
        Ok(())
    }
}
