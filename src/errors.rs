//! Errors surfaced to the browser on `/api/chat`
//!
//! Every variant renders as a JSON [`ErrorBody`] so that the frontend can always parse the
//! response, whatever went wrong.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Message is required")]
    MissingMessage,

    #[error("Failed to reach Guardrail Gateway")]
    Unreachable(String),

    #[error("Guardrail Gateway HTTP {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Unexpected gateway response format")]
    UnexpectedFormat(serde_json::Value),

    #[error("Backend exception")]
    Internal(String),
}

/// The JSON shape of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingMessage => StatusCode::BAD_REQUEST,
            RelayError::Unreachable(_)
            | RelayError::UpstreamStatus { .. }
            | RelayError::UnexpectedFormat(_) => StatusCode::BAD_GATEWAY,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_body(self) -> ErrorBody {
        let error = self.to_string();
        let (details, raw) = match self {
            RelayError::MissingMessage => (None, None),
            RelayError::Unreachable(details) | RelayError::Internal(details) => {
                (Some(details), None)
            }
            RelayError::UpstreamStatus { body, .. } => (Some(body), None),
            RelayError::UnexpectedFormat(raw) => (None, Some(raw)),
        };
        ErrorBody {
            error,
            details,
            raw,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.into_body())).into_response()
    }
}

/// Converts a panic caught at the router boundary into a `Backend exception` response.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic message".to_string()
    };
    error!("Handler panicked: {}", details);
    RelayError::Internal(details).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn render(err: RelayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_message_has_no_optional_fields() {
        let (status, body) = render(RelayError::MissingMessage).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Message is required"}));
    }

    #[tokio::test]
    async fn test_upstream_status_includes_code_and_body() {
        let (status, body) = render(RelayError::UpstreamStatus {
            status: 503,
            body: "overloaded".into(),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({"error": "Guardrail Gateway HTTP 503", "details": "overloaded"})
        );
    }

    #[tokio::test]
    async fn test_unexpected_format_carries_raw_body() {
        let raw = json!({"choices": []});
        let (status, body) = render(RelayError::UnexpectedFormat(raw.clone())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            body,
            json!({"error": "Unexpected gateway response format", "raw": raw})
        );
    }

    #[tokio::test]
    async fn test_panic_response_is_json() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "Backend exception", "details": "boom"}));
    }
}
