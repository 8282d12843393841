#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use twoview_geometry as geometry;

#[doc(inline)]
pub use twoview_features as features;

#[doc(inline)]
pub use twoview_io as io;

/// Per-pair evaluation of the three two-view models.
pub mod evaluation;

pub use evaluation::{
    evaluate_pair, EvaluationError, EvaluationParams, ModelOutcome, PairEvaluation,
};
