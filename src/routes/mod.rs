//! HTTP route handlers
//!
//! Handlers take the parsed path parameters and shared state and return
//! `Result<Response<_>>`; the server turns errors into JSON error bodies.

pub mod auth_routes;
pub mod health;
pub mod queries;
pub mod recommendations;
pub mod response;
pub mod reviews;

pub use response::{error_response, json_response, path_param, BoxBody};
