//! Shared types for altprod

pub mod error;

pub use error::{AppError, ErrorBody, Result};
