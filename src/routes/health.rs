//! Liveness endpoints
//!
//! - GET /       - Plain-text banner
//! - GET /health - JSON status; always 200 while the process is serving

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::response::{json_response, text_response, BoxBody};
use crate::server::AppState;

pub const BANNER: &str = "Alternative product information system server is running";

#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    pub version: &'static str,
    /// Deployment mode
    pub mode: String,
    /// Active document store backend
    pub store: &'static str,
}

pub fn banner() -> Response<BoxBody> {
    text_response(StatusCode::OK, BANNER)
}

pub fn health_check(state: &AppState) -> Response<BoxBody> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: state.args.mode.to_string(),
        store: state.store.backend(),
    };
    json_response(StatusCode::OK, &response)
}
