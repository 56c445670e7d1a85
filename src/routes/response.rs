//! Response and request-body helpers shared by the route handlers

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::types::{AppError, Result};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest JSON body accepted
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    full_body(Bytes::new())
}

fn with_body(status: StatusCode, content_type: &'static str, body: BoxBody) -> Response<BoxBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    match serde_json::to_vec(body) {
        Ok(json) => with_body(status, "application/json", full_body(json)),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            with_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "application/json",
                full_body(r#"{"message":"Serialization failed","code":"INTERNAL_FAILURE"}"#),
            )
        }
    }
}

pub fn text_response(status: StatusCode, text: &'static str) -> Response<BoxBody> {
    with_body(status, "text/plain; charset=utf-8", full_body(text))
}

pub fn error_response(err: AppError) -> Response<BoxBody> {
    let (status, body) = err.into_status_code_and_body();
    json_response(status, &body)
}

pub fn no_content() -> Response<BoxBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Read a JSON request body of at most [`MAX_BODY_BYTES`]
pub async fn parse_json_body<T, B>(req: Request<B>) -> Result<T>
where
    T: DeserializeOwned,
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&bytes).map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Percent-decode one path segment; emails arrive as `a%40example.com`
pub fn path_param(segment: &str) -> Result<String> {
    if segment.is_empty() || segment.contains('/') {
        return Err(AppError::NotFound(format!("No route for segment '{}'", segment)));
    }
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| AppError::BadRequest(format!("Malformed path segment: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_path_param_decodes_email() {
        assert_eq!(path_param("a%40example.com").unwrap(), "a@example.com");
        assert_eq!(path_param("plain").unwrap(), "plain");
        assert!(matches!(path_param(""), Err(AppError::NotFound(_))));
        assert!(matches!(path_param("a/b"), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_parse_json_body() {
        let req = Request::new(Full::new(Bytes::from(r#"{"email":"a@example.com"}"#)));
        let value: Value = parse_json_body(req).await.unwrap();
        assert_eq!(value, json!({ "email": "a@example.com" }));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let big = format!(r#"{{"pad":"{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let req = Request::new(Full::new(Bytes::from(big)));
        let err = parse_json_body::<Value, _>(req).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(AppError::NotFound("Query x".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
