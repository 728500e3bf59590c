use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{GlimpseError, Result};
use crate::models::{AnalysisMode, CanonicalResult, ImagePayload};

use super::azure_vision::AzureVisionClient;
use super::chat::{ChatDialect, VisionChatClient};
use super::mock::MockResponder;

/// One backend that turns an image into a canonical result.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    fn family(&self) -> ProviderFamily;

    async fn analyze(&self, payload: &ImagePayload) -> Result<CanonicalResult>;
}

/// Backend vendor / API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// Azure AI Vision image analysis (read feature).
    AzureVision,
    /// Azure OpenAI chat completions with image input.
    AzureOpenAi,
    /// OpenAI chat completions with image input.
    OpenAi,
}

/// A configuration field a provider family may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Endpoint,
    ApiKey,
    Model,
    ApiVersion,
}

impl RequiredField {
    fn env_suffix(self) -> &'static str {
        match self {
            Self::Endpoint => "ENDPOINT",
            Self::ApiKey => "API_KEY",
            Self::Model => "MODEL",
            Self::ApiVersion => "API_VERSION",
        }
    }

    fn is_set(self, config: &ProviderConfig) -> bool {
        let value = match self {
            Self::Endpoint => &config.endpoint,
            Self::ApiKey => &config.api_key,
            Self::Model => &config.model,
            Self::ApiVersion => &config.api_version,
        };
        value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

impl ProviderFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AzureVision => "azure-vision",
            Self::AzureOpenAi => "azure-openai",
            Self::OpenAi => "openai",
        }
    }

    /// The only result shape this family can produce.
    pub fn mode(self) -> AnalysisMode {
        match self {
            Self::AzureVision => AnalysisMode::TextLines,
            Self::AzureOpenAi | Self::OpenAi => AnalysisMode::StructuredFields,
        }
    }

    pub fn required_fields(self) -> &'static [RequiredField] {
        use RequiredField::*;
        match self {
            Self::AzureVision => &[Endpoint, ApiKey, ApiVersion],
            Self::AzureOpenAi => &[Endpoint, ApiKey, Model, ApiVersion],
            Self::OpenAi => &[ApiKey, Model],
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderFamily {
    type Err = GlimpseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "azure-vision" | "azure_vision" => Ok(Self::AzureVision),
            "azure-openai" | "azure_openai" => Ok(Self::AzureOpenAi),
            "openai" => Ok(Self::OpenAi),
            other => Err(GlimpseError::Configuration(format!(
                "Unknown provider family '{other}' (expected azure-vision, azure-openai or openai)"
            ))),
        }
    }
}

/// What the selector hands back for one request.
#[derive(Clone)]
pub enum Responder {
    Mock(MockResponder),
    Live(Arc<dyn ImageAnalyzer>),
}

impl Responder {
    pub async fn analyze(&self, payload: &ImagePayload) -> Result<CanonicalResult> {
        match self {
            Responder::Mock(mock) => Ok(mock.respond().await),
            Responder::Live(adapter) => adapter.analyze(payload).await,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Responder::Mock(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Responder::Mock(_) => "mock",
            Responder::Live(adapter) => adapter.family().as_str(),
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Responder").field(&self.label()).finish()
    }
}

/// Picks the responder for a request from the route's provider config.
///
/// Holds one shared HTTP client; adapters are cheap views over it and the
/// immutable config, so building one per request is fine.
#[derive(Clone, Debug)]
pub struct ProviderSelector {
    config: Arc<ProviderConfig>,
    mode: AnalysisMode,
    mock: MockResponder,
    client: Client,
}

impl ProviderSelector {
    pub fn new(config: ProviderConfig, mode: AnalysisMode, mock_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GlimpseError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            mode,
            mock: MockResponder::new(mode, mock_delay),
            client,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    /// Resolve the family and check every field it requires.
    ///
    /// Errors name the missing environment variables, never their values.
    pub fn validate(&self) -> Result<ProviderFamily> {
        let family: ProviderFamily = self.config.provider.parse()?;

        if family.mode() != self.mode {
            return Err(GlimpseError::Configuration(format!(
                "Provider family '{family}' produces {} results, but this route needs {}",
                family.mode(),
                self.mode
            )));
        }

        let missing: Vec<String> = family
            .required_fields()
            .iter()
            .filter(|field| !field.is_set(&self.config))
            .map(|field| self.config.env_name(field.env_suffix()))
            .collect();

        if !missing.is_empty() {
            return Err(GlimpseError::Configuration(format!(
                "Provider '{family}' is missing required settings: {}",
                missing.join(", ")
            )));
        }

        Ok(family)
    }

    /// Mock requests short-circuit before the config is even looked at.
    pub fn select(&self, mock: bool) -> Result<Responder> {
        if mock {
            debug!("Mock flag set, bypassing providers");
            return Ok(Responder::Mock(self.mock.clone()));
        }

        let family = self.validate()?;
        let config = Arc::clone(&self.config);
        let client = self.client.clone();

        let adapter: Arc<dyn ImageAnalyzer> = match family {
            ProviderFamily::AzureVision => Arc::new(AzureVisionClient::new(client, config)?),
            ProviderFamily::AzureOpenAi => Arc::new(VisionChatClient::new(
                client,
                config,
                ChatDialect::AzureOpenAi,
            )?),
            ProviderFamily::OpenAi => Arc::new(VisionChatClient::new(
                client,
                config,
                ChatDialect::OpenAi,
            )?),
        };

        debug!(provider = %family, "Provider adapter selected");
        Ok(Responder::Live(adapter))
    }
}

/// Turn a transport failure into a status-less provider error.
pub(crate) fn transport_error(provider: ProviderFamily, error: reqwest::Error) -> GlimpseError {
    let message = if error.is_timeout() {
        format!("{provider} request timed out")
    } else {
        format!("{provider} request failed: {error}")
    };
    GlimpseError::Provider {
        status: None,
        message,
    }
}

/// Read the body of a 2xx response, or fail with the upstream status and body.
pub(crate) async fn success_body(
    provider: ProviderFamily,
    response: reqwest::Response,
) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !status.is_success() {
        return Err(GlimpseError::Provider {
            status: Some(status.as_u16()),
            message: format!("{provider} returned {status}: {body}"),
        });
    }

    Ok(body)
}

/// Read a field the selector has already checked.
pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GlimpseError::Configuration(format!("{name} is not set")))
}
