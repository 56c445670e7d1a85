//! Error types for altprod

use hyper::StatusCode;
use serde::Serialize;

/// Main error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No token presented on a protected route
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token presented but invalid, expired, or not for this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The document store rejected or did not finish an operation
    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: &'static str,
}

impl AppError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Store(_) => "STORE_FAILURE",
            Self::Internal(_) => "INTERNAL_FAILURE",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Auth(_) => "TOKEN_ERROR",
        }
    }

    /// Convert to status code and JSON body for an HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, ErrorBody) {
        let status = self.status_code();
        let code = self.code();
        let message = match self {
            // Client-facing messages for the auth outcomes stay terse
            Self::Unauthorized(_) => "not authorized".to_string(),
            Self::Forbidden(_) => "forbidden access".to_string(),
            other => other.to_string(),
        };
        (status, ErrorBody { message, code })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for AppError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<bson::oid::Error> for AppError {
    fn from(err: bson::oid::Error) -> Self {
        Self::Store(format!("Invalid id: {}", err))
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Store(format!("Encoding failed: {}", err))
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        Self::Store(format!("Decoding failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Auth(format!("JWT error: {}", err))
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, AppError>;
