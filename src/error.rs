//! HTTP-facing error types.
//!
//! Messages returned to clients are fixed strings. Underlying filesystem and
//! tool errors are logged where they happen and never echoed back.

use axum::{
    Json,
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{fetch::FetchError, resolver::ResolveError};

/// Failures detected while preparing a stream response, before any byte of
/// the body is sent.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid file name")]
    InvalidPath,
    #[error("file not found")]
    NotFound,
    #[error("requested range not satisfiable for {size} bytes")]
    RangeNotSatisfiable { size: u64 },
    #[error("preparing stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("building response header: {0}")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

impl From<ResolveError> for StreamError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidPath => Self::InvalidPath,
            ResolveError::NotFound => Self::NotFound,
            ResolveError::Io(err) => Self::Io(err),
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidPath => ApiError::bad_request("invalid file name").into_response(),
            Self::NotFound => ApiError::not_found("file not found").into_response(),
            Self::RangeNotSatisfiable { size } => {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
                response
                    .headers_mut()
                    .insert(header::CONTENT_RANGE, unsatisfied_range(size));
                response
            }
            Self::Io(_) | Self::Header(_) => {
                error!(error = %self, "stream request failed");
                ApiError::internal("internal server error").into_response()
            }
        }
    }
}

fn unsatisfied_range(size: u64) -> HeaderValue {
    // Digits and ASCII only, always a valid header value.
    HeaderValue::from_str(&format!("bytes */{size}"))
        .unwrap_or_else(|_| HeaderValue::from_static("bytes */0"))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::InvalidPath => Self::bad_request("invalid file name"),
            ResolveError::NotFound => Self::not_found("file not found"),
            ResolveError::Io(err) => {
                error!(error = %err, "inspecting library file failed");
                Self::internal("internal server error")
            }
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Disabled => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "remote fetching is disabled",
            ),
            FetchError::InvalidId(_) => Self::bad_request("invalid video id"),
            FetchError::Tool(err) => {
                error!(error = %format!("{err:#}"), "remote fetch failed");
                Self::new(StatusCode::BAD_GATEWAY, "remote fetch failed")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsatisfiable_range_carries_content_range() {
        let response = StreamError::RangeNotSatisfiable { size: 1_000_000 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1000000"
        );
    }

    #[test]
    fn io_failures_are_generic_500s() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/secret/path");
        let response = StreamError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn resolve_errors_map_to_client_statuses() {
        assert_eq!(
            StreamError::from(ResolveError::InvalidPath).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ResolveError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn fetch_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(FetchError::Disabled).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(FetchError::InvalidId("-x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FetchError::Tool(anyhow::anyhow!("boom"))).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
