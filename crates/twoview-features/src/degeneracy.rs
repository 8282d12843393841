use twoview_geometry::Correspondence;

use crate::summary::{SummaryError, SummaryParams};

/// Minimum number of correspondences for [`degeneracy_score`].
pub const MIN_CORRESPONDENCES: usize = 8;

/// Tomono's degeneracy measure of a correspondence set.
///
/// Every correspondence, with coordinates divided by the image size, contributes the row
/// `[u0*u1, u0*v1, u0, v0*u1, v0*v1, v0, u1, v1, 1]` of the linear fundamental-matrix
/// system. General two-view motion leaves a one-dimensional null space; a planar scene or
/// a pure rotation leaves three. The score is `sqrt(s7 * s8)` with `s7 >= s8` the seventh
/// and eighth singular values, close to zero for degenerate configurations.
pub fn degeneracy_score(
    correspondences: &[Correspondence],
    params: &SummaryParams,
) -> Result<f64, SummaryError> {
    if correspondences.len() < MIN_CORRESPONDENCES {
        return Err(SummaryError::InsufficientData {
            required: MIN_CORRESPONDENCES,
            actual: correspondences.len(),
        });
    }

    let mut a = faer::Mat::<f64>::zeros(correspondences.len(), 9);
    for (i, c) in correspondences.iter().enumerate() {
        for (j, v) in design_row(c, params).into_iter().enumerate() {
            a.write(i, j, v);
        }
    }

    let svd = a.svd();
    let s = svd.s_diagonal();
    let (s7, s8) = (s[6], s[7]);
    let score = (s7 * s8).sqrt();
    log::debug!(
        "degeneracy score {score:.3e} from {} correspondences",
        correspondences.len()
    );
    Ok(score)
}

fn design_row(c: &Correspondence, params: &SummaryParams) -> [f64; 9] {
    let u0 = c.x0 / params.image_width;
    let v0 = c.y0 / params.image_height;
    let u1 = c.x1 / params.image_width;
    let v1 = c.y1 / params.image_height;
    [u0 * u1, u0 * v1, u0, v0 * u1, v0 * v1, v0, u1, v1, 1.0]
}
