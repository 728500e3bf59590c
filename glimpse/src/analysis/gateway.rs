use std::fmt;

use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::{GlimpseError, Result};
use crate::models::{AnalysisMode, AnalysisRequest, CanonicalResult, ImagePayload, Preprocess};

use super::preprocessing::preprocess_payload;
use super::provider::ProviderSelector;

/// Where a request is in its lifecycle. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Preprocessing,
    Dispatching,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Entry point for one route: validate, optionally preprocess, dispatch.
///
/// Each call makes at most one provider request. Failures are returned to
/// the caller as-is; nothing is retried.
#[derive(Clone, Debug)]
pub struct AnalysisGateway {
    selector: ProviderSelector,
    max_upload_bytes: usize,
}

impl AnalysisGateway {
    pub fn new(selector: ProviderSelector, max_upload_bytes: usize) -> Self {
        Self {
            selector,
            max_upload_bytes,
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.selector.mode()
    }

    pub fn selector(&self) -> &ProviderSelector {
        &self.selector
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<CanonicalResult> {
        let span = info_span!(
            "analysis",
            request_id = %Uuid::new_v4(),
            mode = %self.mode(),
            mock = request.mock,
            bytes = request.payload.len(),
        );

        async move {
            let outcome = self.run(request).await;
            match &outcome {
                Ok(result) => debug!(stage = %Stage::Done, partial = result.is_partial()),
                Err(e) if e.status().is_server_error() => {
                    error!(stage = %Stage::Failed, error = %e, "Analysis failed")
                }
                Err(e) => info!(stage = %Stage::Failed, error = %e, "Request rejected"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: AnalysisRequest) -> Result<CanonicalResult> {
        let AnalysisRequest {
            payload,
            preprocess,
            mock,
        } = request;

        debug!(stage = %Stage::Validating, mime_type = payload.mime_type());
        payload.validate(self.max_upload_bytes)?;

        let payload = if preprocess == Preprocess::None {
            payload
        } else {
            debug!(stage = %Stage::Preprocessing, ?preprocess);
            run_preprocess(payload, preprocess).await?
        };

        let responder = self.selector.select(mock)?;
        debug!(stage = %Stage::Dispatching, provider = responder.label());
        let result = responder.analyze(&payload).await?;

        if result.mode() != self.mode() {
            return Err(GlimpseError::Internal(format!(
                "{} returned {} results for a {} route",
                responder.label(),
                result.mode(),
                self.mode()
            )));
        }

        Ok(result)
    }
}

async fn run_preprocess(payload: ImagePayload, preprocess: Preprocess) -> Result<ImagePayload> {
    tokio::task::spawn_blocking(move || preprocess_payload(payload, preprocess))
        .await
        .map_err(|e| GlimpseError::Internal(format!("Preprocessing task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::analysis::mock::mock_result;
    use crate::config::ProviderConfig;
    use crate::test_support::EventCounter;

    fn unconfigured(env_prefix: &'static str, provider: &str) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            endpoint: None,
            api_key: None,
            model: None,
            api_version: None,
            timeout_secs: 5,
            env_prefix,
        }
    }

    fn gateway(mode: AnalysisMode, max: usize) -> AnalysisGateway {
        let config = match mode {
            AnalysisMode::TextLines => unconfigured("OCR", "azure-vision"),
            AnalysisMode::StructuredFields => unconfigured("VISION", "azure-openai"),
        };
        let selector = ProviderSelector::new(config, mode, Duration::from_millis(500)).unwrap();
        AnalysisGateway::new(selector, max)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_bypasses_missing_config() {
        let gateway = gateway(AnalysisMode::StructuredFields, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![1, 2, 3], "image/png")).with_mock(true);

        let result = gateway.analyze(request).await.unwrap();
        assert_eq!(result, mock_result(AnalysisMode::StructuredFields));
    }

    #[tokio::test]
    async fn test_validation_runs_before_mock() {
        let gateway = gateway(AnalysisMode::TextLines, 4);
        let request =
            AnalysisRequest::new(ImagePayload::new(vec![0u8; 5], "image/png")).with_mock(true);

        let err = gateway.analyze(request).await.unwrap_err();
        assert!(matches!(err, GlimpseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_non_image_mime_is_rejected() {
        let gateway = gateway(AnalysisMode::TextLines, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![1], "text/plain"));

        let err = gateway.analyze(request).await.unwrap_err();
        assert!(matches!(err, GlimpseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_preprocess_failure_stops_before_dispatch() {
        // The config is unusable, so reaching the selector would yield a
        // Configuration error instead of Decode.
        let gateway = gateway(AnalysisMode::TextLines, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![9u8; 16], "image/jpeg"))
            .with_preprocess(Preprocess::Binary);

        let err = gateway.analyze(request).await.unwrap_err();
        assert!(matches!(err, GlimpseError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let gateway = gateway(AnalysisMode::TextLines, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![1, 2], "image/png"));

        let err = gateway.analyze(request).await.unwrap_err();
        assert!(matches!(err, GlimpseError::Configuration(_)));
        assert!(err.to_string().contains("OCR_API_KEY"));
    }

    #[tokio::test]
    async fn test_server_fault_is_logged_once_as_error() {
        let (counter, _guard) = EventCounter::install();
        let gateway = gateway(AnalysisMode::TextLines, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![1, 2], "image/png"));

        let err = gateway.analyze(request).await.unwrap_err();
        let _ = axum::response::IntoResponse::into_response(err);

        assert_eq!(counter.info_or_above(), 1);
        assert_eq!(counter.errors(), 1);
    }

    #[tokio::test]
    async fn test_client_fault_is_logged_once_below_error() {
        let (counter, _guard) = EventCounter::install();
        let gateway = gateway(AnalysisMode::TextLines, 1024);
        let request = AnalysisRequest::new(ImagePayload::new(vec![1], "text/plain"));

        let err = gateway.analyze(request).await.unwrap_err();
        let _ = axum::response::IntoResponse::into_response(err);

        assert_eq!(counter.info_or_above(), 1);
        assert_eq!(counter.errors(), 0);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Preprocessing.to_string(), "Preprocessing");
    }
}
