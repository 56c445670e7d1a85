//! HTTP routes for token cookies
//!
//! - POST /jwt    - Sign the posted identity and set it as the `token` cookie
//! - POST /logout - Expire the `token` cookie
//!
//! The cookie's cross-site attributes come from the deployment mode's
//! [`CookiePolicy`](crate::auth::CookiePolicy), never from the handler.

use hyper::header::{HeaderValue, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::auth::Identity;
use crate::routes::response::{json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::types::{AppError, Result};

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn with_cookie(mut response: Response<BoxBody>, cookie: &str) -> Result<Response<BoxBody>> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| AppError::Internal(format!("Unusable cookie value: {}", e)))?;
    response.headers_mut().insert(SET_COOKIE, value);
    Ok(response)
}

/// POST /jwt
pub async fn handle_issue_token<B>(req: Request<B>, state: &AppState) -> Result<Response<BoxBody>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let payload: Value = parse_json_body(req).await?;
    let identity = Identity::from_payload(payload)?;
    let email = identity.email().unwrap_or_default().to_string();

    let issued = state.gate.authority().issue(identity)?;
    let cookie = state
        .cookie_policy
        .token_cookie(&issued.token, issued.max_age_seconds);

    info!(email = %email, expires_at = issued.expires_at, "Issued access token");

    with_cookie(
        json_response(StatusCode::OK, &SuccessResponse { success: true }),
        &cookie,
    )
}

/// POST /logout
pub fn handle_logout(state: &AppState) -> Result<Response<BoxBody>> {
    with_cookie(
        json_response(StatusCode::OK, &SuccessResponse { success: true }),
        &state.cookie_policy.clear_cookie(),
    )
}
