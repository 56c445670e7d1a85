//! Query routes
//!
//! - GET    /Queries               - All queries, newest first
//! - POST   /Queries               - Create a query
//! - GET    /Queries/user/:email   - Queries owned by `email`
//! - GET    /Queries/:id           - One query, or `null`
//! - GET    /singleQuery/:id       - Same as above
//! - PUT    /updatedQuery/:id      - Upsert the editable fields
//! - DELETE /delete/:id            - Delete a query and its recommendations
//! - GET    /api/recent-queries    - The newest few queries

use hyper::{Request, Response, StatusCode};
use tracing::debug;

use crate::db::schemas::{Query, QueryEdit, QueryFilter, EDITABLE_QUERY_FIELDS};
use crate::routes::response::{json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::services::SagaOutcome;
use crate::types::{AppError, Result};

pub async fn list_queries(state: &AppState) -> Result<Response<BoxBody>> {
    let queries = state.store.list_queries(QueryFilter::All).await?;
    Ok(json_response(StatusCode::OK, &queries))
}

pub async fn create_query<B>(req: Request<B>, state: &AppState) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let query: Query = parse_json_body(req).await?;
    let result = state.store.insert_query(query.prepare_new()?).await?;
    debug!(id = %result.inserted_id, "Query created");
    Ok(json_response(StatusCode::OK, &result))
}

pub async fn list_user_queries(state: &AppState, email: &str) -> Result<Response<BoxBody>> {
    let queries = state
        .store
        .list_queries(QueryFilter::Owner(email.to_string()))
        .await?;
    Ok(json_response(StatusCode::OK, &queries))
}

pub async fn get_query(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let query = state.store.find_query(id).await?;
    Ok(json_response(StatusCode::OK, &query))
}

pub async fn update_query<B>(
    req: Request<B>,
    state: &AppState,
    id: &str,
) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let edit: QueryEdit = parse_json_body(req).await?;
    if edit.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Body must set at least one of: {}",
            EDITABLE_QUERY_FIELDS.join(", ")
        )));
    }

    let result = state.store.upsert_query_fields(id, edit).await?;
    Ok(json_response(StatusCode::OK, &result))
}

pub async fn delete_query(state: &AppState, id: &str) -> Result<Response<BoxBody>> {
    let outcome = state.recommendations.delete_query_cascade(id).await?;
    let status = if outcome.is_partial_failure() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok(json_response(status, &outcome))
}

pub async fn recent_queries(state: &AppState) -> Result<Response<BoxBody>> {
    let queries = state
        .store
        .recent_queries(state.args.recent_queries_limit)
        .await?;
    Ok(json_response(StatusCode::OK, &queries))
}
