#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Tomono's degeneracy measure.
pub mod degeneracy;

/// The 23-dimensional correspondence summary.
pub mod summary;

pub use degeneracy::degeneracy_score;
pub use summary::{CorrespondenceSummary, Direction, SummaryError, SummaryParams, FEATURE_LEN};
