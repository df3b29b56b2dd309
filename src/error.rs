#![forbid(unsafe_code)]

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::runner::{ToolError, ToolFailure};

/// Everything a handler can fail with. Each variant maps to one HTTP status.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("yt-dlp failed with exit code {}", .0.exit_code)]
    ToolFailed(ToolFailure),

    #[error("yt-dlp returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("yt-dlp is unavailable: {0}")]
    ToolUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ToolFailed(_) => StatusCode::BAD_REQUEST,
            Self::MalformedOutput(_) => StatusCode::BAD_GATEWAY,
            Self::ToolUnavailable(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> Value {
        match self {
            Self::Unauthorized => json!("Unauthorized"),
            Self::ToolFailed(failure) => json!(ToolFailureDetail {
                error: "yt-dlp failed",
                failure,
            }),
            Self::MalformedOutput(reason) => json!({
                "error": "yt-dlp returned malformed output",
                "reason": reason,
            }),
            Self::ToolUnavailable(reason) => json!({
                "error": "yt-dlp could not be started",
                "reason": reason,
            }),
            Self::Internal(reason) => json!({
                "error": "internal error",
                "reason": reason,
            }),
        }
    }
}

/// `ToolFailure` fields plus an `error` label, flattened into one object.
#[derive(Serialize)]
struct ToolFailureDetail<'a> {
    error: &'static str,
    #[serde(flatten)]
    failure: &'a ToolFailure,
}

impl From<ToolError> for GatewayError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Failed(failure) => Self::ToolFailed(failure),
            ToolError::Launch { .. } | ToolError::EmptyCommand => {
                Self::ToolUnavailable(err.to_string())
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: GatewayError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unauthorized_has_minimal_detail() {
        let (status, body) = body_json(GatewayError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "detail": "Unauthorized" }));
    }

    #[tokio::test]
    async fn tool_failure_is_a_bad_request_with_diagnostics() {
        let failure = ToolFailure {
            exit_code: 1,
            argv: vec!["yt-dlp".into(), "-J".into(), "u".into()],
            stderr: "ERROR: boom".into(),
            stdout: String::new(),
        };
        let (status, body) = body_json(GatewayError::ToolFailed(failure)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "detail": {
                    "error": "yt-dlp failed",
                    "returncode": 1,
                    "cmd": ["yt-dlp", "-J", "u"],
                    "stderr": "ERROR: boom",
                    "stdout": "",
                }
            })
        );
    }

    #[tokio::test]
    async fn malformed_output_is_a_bad_gateway() {
        let (status, body) =
            body_json(GatewayError::MalformedOutput("expected value".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["detail"]["reason"], "expected value");
    }

    #[test]
    fn launch_errors_become_unavailable() {
        let err = ToolError::Launch {
            program: "yt-dlp".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let mapped = GatewayError::from(err);
        assert!(matches!(mapped, GatewayError::ToolUnavailable(_)));
        assert_eq!(mapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
