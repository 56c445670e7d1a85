//! Services layer
//!
//! Business workflows that span more than one store operation.

pub mod recommendations;

pub use recommendations::{
    AddRecommendationOutcome, DeleteQueryOutcome, DeleteRecommendationOutcome, Inconsistency,
    InconsistencyKind, RecommendationManager, SagaOutcome,
};
