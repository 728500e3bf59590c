use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{GlimpseError, Result};
use crate::models::{
    CanonicalResult, ImagePayload, StructuredFields, PARTIAL_EXTRACTION_SENTINEL,
};

use super::provider::{required, success_body, transport_error, ImageAnalyzer, ProviderFamily};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You read utility meters from photographs. \
Respond with only a JSON object of the form {\"meterValue\": string or null, \"serialNumber\": string or null}. \
Use null for any value that is not clearly visible. Do not add explanations or any other text.";

const USER_PROMPT: &str =
    "Extract the current meter reading value and the meter serial number from this image.";

const MAX_TOKENS: u32 = 300;

static METER_VALUE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""?meterValue"?\s*[:=]\s*(?:"([^"\n]*)"?|([^",}\s]+))"#)
        .expect("valid meterValue pattern")
});

static SERIAL_NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""?serialNumber"?\s*[:=]\s*(?:"([^"\n]*)"?|([^",}\s]+))"#)
        .expect("valid serialNumber pattern")
});

/// How a chat-completions deployment is addressed and authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDialect {
    /// `{endpoint}/openai/deployments/{model}/chat/completions?api-version=..` with `api-key`.
    AzureOpenAi,
    /// `{endpoint}/chat/completions` with a bearer token and `model` in the body.
    OpenAi,
}

/// Structured-fields adapter over a vision-capable chat model.
#[derive(Clone, Debug)]
pub struct VisionChatClient {
    client: Client,
    config: Arc<ProviderConfig>,
    dialect: ChatDialect,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// `data:<mime>;base64,<payload>` as expected by the `image_url` content part.
pub fn data_url(payload: &ImagePayload) -> String {
    format!(
        "data:{};base64,{}",
        payload.mime_type(),
        STANDARD.encode(payload.bytes())
    )
}

/// Remove a surrounding ``` fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn field_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Quoted values run to the closing quote (or end of line when truncated);
/// bare values stop at the first whitespace or JSON delimiter.
fn capture(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| PARTIAL_EXTRACTION_SENTINEL.to_string())
}

/// Best-effort key/value scrape used when the model's text is not JSON.
///
/// Unmatched fields get the partial-extraction sentinel instead of `None`.
pub fn fallback_fields(raw: &str) -> StructuredFields {
    StructuredFields {
        meter_value: Some(capture(&METER_VALUE_PATTERN, raw)),
        serial_number: Some(capture(&SERIAL_NUMBER_PATTERN, raw)),
    }
}

/// Map the model's message text onto the two structured fields.
pub fn parse_fields(raw: &str) -> Result<StructuredFields> {
    match serde_json::from_str::<Value>(strip_code_fence(raw)) {
        Ok(Value::Object(map)) => Ok(StructuredFields {
            meter_value: field_value(map.get("meterValue")),
            serial_number: field_value(map.get("serialNumber")),
        }),
        Ok(other) => Err(GlimpseError::UnexpectedResponseShape(format!(
            "Expected a JSON object from the model, got: {other}"
        ))),
        Err(e) => {
            warn!(error = %e, "Model output is not JSON, falling back to pattern extraction");
            Ok(fallback_fields(raw))
        }
    }
}

fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        GlimpseError::UnexpectedResponseShape(format!("Invalid chat completion response: {e}"))
    })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| GlimpseError::Provider {
            status: None,
            message: "No content in chat completion response".to_string(),
        })
}

impl VisionChatClient {
    pub fn new(client: Client, config: Arc<ProviderConfig>, dialect: ChatDialect) -> Result<Self> {
        required(&config.api_key, &config.env_name("API_KEY"))?;
        required(&config.model, &config.env_name("MODEL"))?;
        if dialect == ChatDialect::AzureOpenAi {
            required(&config.endpoint, &config.env_name("ENDPOINT"))?;
            required(&config.api_version, &config.env_name("API_VERSION"))?;
        }

        Ok(Self {
            client,
            config,
            dialect,
        })
    }

    fn url(&self) -> Result<String> {
        match self.dialect {
            ChatDialect::AzureOpenAi => {
                let endpoint = required(&self.config.endpoint, &self.config.env_name("ENDPOINT"))?;
                let deployment = required(&self.config.model, &self.config.env_name("MODEL"))?;
                Ok(format!(
                    "{}/openai/deployments/{}/chat/completions",
                    endpoint.trim_end_matches('/'),
                    deployment
                ))
            }
            ChatDialect::OpenAi => {
                let base = self
                    .config
                    .endpoint
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .unwrap_or(DEFAULT_OPENAI_BASE_URL);
                Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
            }
        }
    }

    fn build_request(&self, payload: &ImagePayload) -> ChatRequest {
        let model = match self.dialect {
            ChatDialect::AzureOpenAi => None,
            ChatDialect::OpenAi => self.config.model.clone(),
        };

        ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: data_url(payload),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let api_key = required(&self.config.api_key, &self.config.env_name("API_KEY"))?;
        Ok(match self.dialect {
            ChatDialect::AzureOpenAi => {
                let api_version =
                    required(&self.config.api_version, &self.config.env_name("API_VERSION"))?;
                builder
                    .query(&[("api-version", api_version)])
                    .header("api-key", api_key)
            }
            ChatDialect::OpenAi => builder.bearer_auth(api_key),
        })
    }
}

#[async_trait]
impl ImageAnalyzer for VisionChatClient {
    fn family(&self) -> ProviderFamily {
        match self.dialect {
            ChatDialect::AzureOpenAi => ProviderFamily::AzureOpenAi,
            ChatDialect::OpenAi => ProviderFamily::OpenAi,
        }
    }

    async fn analyze(&self, payload: &ImagePayload) -> Result<CanonicalResult> {
        let request = self.build_request(payload);

        let response = self
            .authorize(self.client.post(self.url()?))?
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(self.family(), e))?;

        let body = success_body(self.family(), response).await?;
        let content = extract_content(&body)?;
        let fields = parse_fields(&content)?;

        if fields.is_partial() {
            warn!(
                provider = %self.family(),
                "Structured extraction only partially succeeded"
            );
        } else {
            debug!(provider = %self.family(), "Structured extraction completed");
        }

        Ok(CanonicalResult::StructuredFields(fields))
    }
}
