//! GET /reviews - review documents exactly as stored

use hyper::{Response, StatusCode};

use crate::routes::response::{json_response, BoxBody};
use crate::server::AppState;
use crate::types::Result;

pub async fn list_reviews(state: &AppState) -> Result<Response<BoxBody>> {
    let reviews = state.store.list_reviews().await?;
    Ok(json_response(StatusCode::OK, &reviews))
}
