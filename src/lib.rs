//! altprod - alternative product information system
//!
//! Users file boycott queries against products, others answer them with
//! recommended alternatives, and each query keeps a running count of its
//! recommendations. Per-user views can be gated behind a signed token
//! cookie. Storage is MongoDB behind the `DocumentStore` seam.

pub mod auth;
pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AppError, Result};
