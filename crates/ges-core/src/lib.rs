//! # GES Core
//!
//! Greedy Equivalence Search over CPDAGs, scored with a mixed continuous/categorical BIC.

pub mod engine;
pub mod metrics;

// Re-export commonly used types
pub use engine::dag::{complete_in_place, completion, Dag, EdgeLabel};
pub use engine::dataset::Dataset;
pub use engine::errors::GesError;
pub use engine::extension::consistent_extension;
pub use engine::operators::{Operator, OperatorKind};
pub use engine::pdag::{Edge, NodeSet, Pdag};
pub use engine::scorer::{LocalScore, LocalScorer, ScorerConfig};
pub use engine::search::{
    GesSearch, MicroStep, Phase, ScoredOperator, SearchConfig, SearchOutcome, SearchState,
    StepOutcome,
};

/// Runs both phases to completion on `data` with default settings.
pub fn run_ges(data: &Dataset) -> Result<SearchOutcome, GesError> {
    GesSearch::new(data, SearchConfig::default(), ScorerConfig::default())?.run_to_completion()
}
