use glam::DMat3;
use serde::{Deserialize, Serialize};

use twoview_features::{degeneracy_score, CorrespondenceSummary, SummaryParams};
use twoview_geometry::disambiguation::{
    pose_from_essential, pose_from_fundamental, pose_from_homography, Disambiguation,
    DisambiguationError, EssentialParams,
};
use twoview_geometry::estimator::{EstimationError, GeometricModelEstimator};
use twoview_geometry::quality::{assess, GroundTruth, QualityError, QualityParams, QualityReport};
use twoview_geometry::{CameraIntrinsics, Correspondence, Pose};
use twoview_io::Record;

/// Errors returned by [`evaluate_pair`].
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Too few correspondences to evaluate the pair.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientData {
        /// Minimum number of correspondences.
        required: usize,
        /// Number of correspondences provided.
        actual: usize,
    },

    /// Quality assessment failed.
    #[error(transparent)]
    Quality(#[from] QualityError),

    /// Hypothesis disambiguation failed.
    #[error(transparent)]
    Disambiguation(#[from] DisambiguationError),
}

/// Configuration of the per-pair evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationParams {
    /// Pairs with fewer correspondences are rejected.
    pub min_correspondences: usize,
    /// Settings of the essential-matrix vote, also used for the fundamental matrix.
    pub essential: EssentialParams,
    /// Thresholds of the quality report.
    pub quality: QualityParams,
    /// Normalization of the correspondence summary.
    pub summary: SummaryParams,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            min_correspondences: 10,
            essential: EssentialParams::default(),
            quality: QualityParams::default(),
            summary: SummaryParams::default(),
        }
    }
}

impl EvaluationParams {
    /// Default parameters with summary scales taken from the image size of `intrinsics`.
    pub fn from_intrinsics(intrinsics: &CameraIntrinsics) -> Self {
        Self {
            summary: SummaryParams::from_intrinsics(intrinsics),
            ..Self::default()
        }
    }
}

/// Result of one model on a pair.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelOutcome {
    /// The estimator produced a model and the pose was recovered from it.
    Estimated {
        /// The estimated 3x3 model.
        model: DMat3,
        /// Scores of every pose candidate of the model.
        disambiguation: Disambiguation,
        /// The recovered secondary camera pose.
        pose: Pose,
        /// Quality of the reconstruction with that pose.
        report: QualityReport,
    },
    /// The estimator failed; no pose is reported.
    Failed(String),
}

impl ModelOutcome {
    /// The quality report, if the model was estimated.
    pub fn report(&self) -> Option<&QualityReport> {
        match self {
            ModelOutcome::Estimated { report, .. } => Some(report),
            ModelOutcome::Failed(_) => None,
        }
    }

    /// The recovered secondary pose, if the model was estimated.
    pub fn pose(&self) -> Option<&Pose> {
        match self {
            ModelOutcome::Estimated { pose, .. } => Some(pose),
            ModelOutcome::Failed(_) => None,
        }
    }
}

/// Evaluation of the three models on one image pair.
#[derive(Clone, Debug, PartialEq)]
pub struct PairEvaluation {
    /// Statistics of the correspondences.
    pub summary: CorrespondenceSummary,
    /// Tomono degeneracy score, `None` when there are too few correspondences.
    pub degeneracy: Option<f64>,
    /// Pose recovered from the fundamental matrix.
    pub fundamental: ModelOutcome,
    /// Pose recovered from the homography.
    pub homography: ModelOutcome,
    /// Pose recovered from the essential matrix.
    pub essential: ModelOutcome,
    /// Quality of the true pose, when one was supplied.
    pub truth: Option<QualityReport>,
    /// Pose recovered from the true fundamental matrix, when one was supplied.
    pub true_fundamental: Option<ModelOutcome>,
}

impl PairEvaluation {
    /// Flattens the evaluation into a record.
    ///
    /// The metrics are five blocks of [`QualityReport::COLUMNS`]: fundamental, homography,
    /// essential, true pose and true fundamental matrix. Blocks without a report are left
    /// empty.
    pub fn to_record(&self) -> Record {
        let blocks = [
            self.fundamental.report(),
            self.homography.report(),
            self.essential.report(),
            self.truth.as_ref(),
            self.true_fundamental.as_ref().and_then(ModelOutcome::report),
        ];
        let metrics = blocks
            .into_iter()
            .flat_map(|report| {
                report.map_or([None; QualityReport::COLUMNS.len()], |r| r.to_columns())
            })
            .collect();
        Record::new(self.summary, metrics)
    }
}

/// Recover and score the relative pose of one image pair with every model.
///
/// Each model is estimated by `estimator`, decomposed into its pose candidates and
/// disambiguated. The winning relative pose is composed with `primary` and assessed
/// against `truth`. A failing estimator yields [`ModelOutcome::Failed`] for that model
/// only. When `truth` carries a pose, that pose is assessed too. When it carries a
/// fundamental matrix, that matrix goes through the same recovery as an estimated one.
///
/// # Arguments
///
/// * `estimator` - Source of the fundamental matrix, homography and essential matrix.
/// * `primary` - Pose of the camera observing `(x0, y0)`.
/// * `intrinsics` - Intrinsics shared by both views.
/// * `correspondences` - The matched pixel pairs.
/// * `truth` - Whatever ground truth is available, possibly none.
/// * `params` - Thresholds, vote settings and summary normalization.
pub fn evaluate_pair<E: GeometricModelEstimator + ?Sized>(
    estimator: &mut E,
    primary: &Pose,
    intrinsics: &CameraIntrinsics,
    correspondences: &[Correspondence],
    truth: &GroundTruth<'_>,
    params: &EvaluationParams,
) -> Result<PairEvaluation, EvaluationError> {
    if correspondences.len() < params.min_correspondences {
        return Err(EvaluationError::InsufficientData {
            required: params.min_correspondences,
            actual: correspondences.len(),
        });
    }

    let summary = CorrespondenceSummary::compute(correspondences);
    let degeneracy = degeneracy_score(correspondences, &params.summary).ok();

    let scene = Scene {
        primary,
        intrinsics,
        correspondences,
        truth,
        params: &params.quality,
    };

    let fundamental = match estimator.fundamental(correspondences, intrinsics) {
        Ok(f) => {
            let d = pose_from_fundamental(&f, intrinsics, correspondences, &params.essential)?;
            scene.outcome("fundamental", f, d)?
        }
        Err(e) => failed("fundamental", e),
    };

    let homography = match estimator.homography(correspondences, intrinsics) {
        Ok(h) => {
            let d = pose_from_homography(&h, primary, intrinsics, correspondences)?;
            scene.outcome("homography", h, d)?
        }
        Err(e) => failed("homography", e),
    };

    let essential = match estimator.essential(correspondences, intrinsics) {
        Ok(e) => {
            let d = pose_from_essential(&e, intrinsics, correspondences, &params.essential)?;
            scene.outcome("essential", e, d)?
        }
        Err(e) => failed("essential", e),
    };

    let truth_report = truth
        .pose
        .map(|pose| {
            assess(
                primary,
                pose,
                intrinsics,
                correspondences,
                truth,
                &params.quality,
            )
        })
        .transpose()?;

    let true_fundamental = match truth.fundamental {
        Some(f) => {
            let d = pose_from_fundamental(&f, intrinsics, correspondences, &params.essential)?;
            Some(scene.outcome("true fundamental", f, d)?)
        }
        None => None,
    };

    Ok(PairEvaluation {
        summary,
        degeneracy,
        fundamental,
        homography,
        essential,
        truth: truth_report,
        true_fundamental,
    })
}

struct Scene<'a> {
    primary: &'a Pose,
    intrinsics: &'a CameraIntrinsics,
    correspondences: &'a [Correspondence],
    truth: &'a GroundTruth<'a>,
    params: &'a QualityParams,
}

impl Scene<'_> {
    fn outcome(
        &self,
        name: &str,
        model: DMat3,
        disambiguation: Disambiguation,
    ) -> Result<ModelOutcome, QualityError> {
        let pose = disambiguation.pose().compose(self.primary);
        let report = assess(
            self.primary,
            &pose,
            self.intrinsics,
            self.correspondences,
            self.truth,
            self.params,
        )?;
        log::debug!(
            "{name}: candidate {} of {}, {} good points, reprojection error {:.3e}",
            disambiguation.selected,
            disambiguation.hypotheses.len(),
            report.num_good_points,
            report.reprojection_error
        );
        Ok(ModelOutcome::Estimated {
            model,
            disambiguation,
            pose,
            report,
        })
    }
}

fn failed(model: &str, error: EstimationError) -> ModelOutcome {
    log::warn!("{model} estimation failed: {error}");
    ModelOutcome::Failed(error.to_string())
}
