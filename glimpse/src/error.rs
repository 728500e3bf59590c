use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::v1::response::ApiError;

#[derive(Error, Debug)]
pub enum GlimpseError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Provider error ({}): {message}", status.map_or_else(|| "no status".to_string(), |s| s.to_string()))]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponseShape(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GlimpseError {
    pub fn status(&self) -> StatusCode {
        match self {
            GlimpseError::Validation(_) | GlimpseError::Decode(_) => StatusCode::BAD_REQUEST,
            GlimpseError::Provider { .. } | GlimpseError::UnexpectedResponseShape(_) => {
                StatusCode::BAD_GATEWAY
            }
            GlimpseError::Configuration(_)
            | GlimpseError::Encode(_)
            | GlimpseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller.
    ///
    /// Only client-fault errors are echoed verbatim. Everything else collapses
    /// to a generic sentence; the detail goes to the log instead.
    pub fn public_message(&self) -> String {
        match self {
            GlimpseError::Validation(msg) => msg.clone(),
            GlimpseError::Decode(_) => "The uploaded file could not be decoded as an image".to_string(),
            GlimpseError::Encode(_) => "The image could not be prepared for analysis".to_string(),
            GlimpseError::Configuration(_) => {
                "The analysis service is not configured correctly".to_string()
            }
            GlimpseError::Provider { .. } => {
                "The analysis provider rejected the request".to_string()
            }
            GlimpseError::UnexpectedResponseShape(_) => {
                "The analysis provider returned an unreadable response".to_string()
            }
            GlimpseError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for GlimpseError {
    fn into_response(self) -> Response {
        // Failures are logged where they occur, inside the request's span.
        (self.status(), Json(ApiError::from(&self))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GlimpseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::EventCounter;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn status_mapping_follows_fault_side() {
        assert_eq!(
            GlimpseError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GlimpseError::Decode("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GlimpseError::Configuration("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GlimpseError::Encode("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GlimpseError::Provider {
                status: Some(401),
                message: "x".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GlimpseError::UnexpectedResponseShape("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn provider_display_includes_status() {
        let err = GlimpseError::Provider {
            status: Some(429),
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "Provider error (429): slow down");

        let err = GlimpseError::Provider {
            status: None,
            message: "timed out".into(),
        };
        assert_eq!(err.to_string(), "Provider error (no status): timed out");
    }

    #[tokio::test]
    async fn validation_message_is_passed_through() {
        let response =
            GlimpseError::Validation("Unsupported content type: text/plain".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Unsupported content type: text/plain");
        assert_eq!(json["code"], 400);
    }

    #[tokio::test]
    async fn provider_detail_does_not_leak() {
        let response = GlimpseError::Provider {
            status: Some(401),
            message: "Access denied due to invalid subscription key sk-live-123".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(response).await;
        let message = json["error"].as_str().unwrap();
        assert!(!message.contains("sk-live-123"));
        assert_eq!(message, "The analysis provider rejected the request");
    }

    #[tokio::test]
    async fn configuration_detail_does_not_leak() {
        let response =
            GlimpseError::Configuration("VISION_API_KEY is not set".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(
            json["error"],
            "The analysis service is not configured correctly"
        );
        assert_eq!(json["code"], 500);
    }

    #[test]
    fn into_response_does_not_log() {
        let (counter, _guard) = EventCounter::install();

        let _ = GlimpseError::Internal("boom".into()).into_response();
        let _ = GlimpseError::Validation("bad".into()).into_response();

        assert_eq!(counter.info_or_above(), 0);
    }
}
