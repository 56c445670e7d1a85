//! Recommendation routes
//!
//! Create and delete go through the [`RecommendationManager`] so the
//! owning query's counter follows; listings read the store directly.
//!
//! [`RecommendationManager`]: crate::services::RecommendationManager

use hyper::{Request, Response, StatusCode};
use serde::Serialize;

use crate::db::schemas::{Recommendation, RecommendationFilter};
use crate::routes::response::{json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::services::SagaOutcome;
use crate::types::Result;

/// Partial failures answer 500 but still carry both step results
fn saga_response<T: Serialize + SagaOutcome>(outcome: &T) -> Response<BoxBody> {
    let status = if outcome.is_partial_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    json_response(status, outcome)
}

/// POST /addRecommendation
pub async fn add_recommendation<B>(req: Request<B>, state: &AppState) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let rec: Recommendation = parse_json_body(req).await?;
    let outcome = state.recommendations.add_recommendation(rec).await?;
    Ok(saga_response(&outcome))
}

/// DELETE /recommendation/delete/:id
pub async fn delete_recommendation(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let outcome = state.recommendations.delete_recommendation(id).await?;
    Ok(saga_response(&outcome))
}

pub async fn list_recommendations(
    state: &AppState,
    filter: RecommendationFilter,
) -> Result<Response<BoxBody>> {
    let recs = state.store.list_recommendations(filter).await?;
    Ok(json_response(StatusCode::OK, &recs))
}
