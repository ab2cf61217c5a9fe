use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the feed relay. Every variant renders as
/// `{ "error": <message> }`; internal detail never reaches the body.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("URL parameter is required")]
    MissingUrl,

    #[error("Invalid URL parameter")]
    InvalidUrl,

    #[error("Invalid RSS format")]
    InvalidFormat,

    /// The feed host could not be reached or the body could not be read
    #[error("Failed to fetch RSS feed: {0}")]
    Upstream(String),

    /// The feed host answered with a non-success status
    #[error("Failed to fetch RSS feed: {reason}")]
    UpstreamStatus { status: u16, reason: String },

    #[error("Failed to parse RSS feed")]
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Upstream,
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::MissingUrl | RelayError::InvalidUrl | RelayError::InvalidFormat => {
                ErrorKind::BadRequest
            }
            RelayError::Upstream(_) | RelayError::UpstreamStatus { .. } => ErrorKind::Upstream,
            RelayError::Internal => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match (self.kind(), self) {
            (ErrorKind::BadRequest, _) => StatusCode::BAD_REQUEST,
            (_, RelayError::UpstreamStatus { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: RelayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_missing_url_response() {
        let (status, body) = body_json(RelayError::MissingUrl).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "URL parameter is required" }));
    }

    #[tokio::test]
    async fn test_invalid_format_response() {
        let (status, body) = body_json(RelayError::InvalidFormat).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Invalid RSS format" }));
    }

    #[tokio::test]
    async fn test_upstream_status_passed_through() {
        let err = RelayError::UpstreamStatus {
            status: 404,
            reason: "Not Found".to_string(),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Failed to fetch RSS feed: Not Found");
    }

    #[tokio::test]
    async fn test_invalid_upstream_status_becomes_bad_gateway() {
        let err = RelayError::UpstreamStatus {
            status: 42,
            reason: "Unknown status".to_string(),
        };
        let (status, _) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_transport_failure_is_server_error() {
        let (status, body) = body_json(RelayError::Upstream("connection refused".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch RSS feed: connection refused");
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let (status, body) = body_json(RelayError::Internal).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "Failed to parse RSS feed" }));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(RelayError::MissingUrl.kind(), ErrorKind::BadRequest);
        assert_eq!(RelayError::InvalidUrl.kind(), ErrorKind::BadRequest);
        assert_eq!(RelayError::Upstream(String::new()).kind(), ErrorKind::Upstream);
        assert_eq!(RelayError::Internal.kind(), ErrorKind::Internal);
    }
}
