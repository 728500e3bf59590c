use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{GlimpseError, Result};
use crate::models::{CanonicalResult, ImagePayload};

use super::provider::{required, success_body, transport_error, ImageAnalyzer, ProviderFamily};

const ANALYZE_PATH: &str = "/computervision/imageanalysis:analyze";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// OCR adapter for Azure AI Vision image analysis with the `read` feature.
#[derive(Clone, Debug)]
pub struct AzureVisionClient {
    client: Client,
    config: Arc<ProviderConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    read_result: Option<ReadResult>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    blocks: Option<Vec<Block>>,
}

#[derive(Debug, Deserialize)]
struct Block {
    lines: Option<Vec<Line>>,
}

#[derive(Debug, Deserialize)]
struct Line {
    text: Option<String>,
    words: Option<Vec<Word>>,
}

#[derive(Debug, Deserialize)]
struct Word {
    text: String,
}

impl Line {
    fn render(self) -> String {
        match self.words {
            Some(words) if !words.is_empty() => {
                let joined = words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                joined.trim_end().to_string()
            }
            _ => self.text.unwrap_or_default().trim_end().to_string(),
        }
    }
}

/// Flatten blocks → lines into one string per line, keeping provider order.
fn parse_read_response(body: &str) -> Result<Vec<String>> {
    let response: AnalyzeResponse = serde_json::from_str(body).map_err(|e| {
        GlimpseError::UnexpectedResponseShape(format!("Invalid image analysis response: {e}"))
    })?;

    let blocks = response
        .read_result
        .and_then(|r| r.blocks)
        .unwrap_or_default();

    Ok(blocks
        .into_iter()
        .flat_map(|block| block.lines.unwrap_or_default())
        .map(Line::render)
        .collect())
}

impl AzureVisionClient {
    pub fn new(client: Client, config: Arc<ProviderConfig>) -> Result<Self> {
        required(&config.endpoint, &config.env_name("ENDPOINT"))?;
        required(&config.api_key, &config.env_name("API_KEY"))?;
        required(&config.api_version, &config.env_name("API_VERSION"))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> Result<String> {
        let endpoint = required(&self.config.endpoint, &self.config.env_name("ENDPOINT"))?;
        Ok(format!("{}{}", endpoint.trim_end_matches('/'), ANALYZE_PATH))
    }

    fn query(&self) -> Result<Vec<(&'static str, String)>> {
        let api_version =
            required(&self.config.api_version, &self.config.env_name("API_VERSION"))?;
        let mut query = vec![
            ("features", "read".to_string()),
            ("api-version", api_version.to_string()),
        ];
        if let Some(model) = self.config.model.as_deref().filter(|m| !m.is_empty()) {
            query.push(("model-name", model.to_string()));
        }
        Ok(query)
    }
}

#[async_trait]
impl ImageAnalyzer for AzureVisionClient {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::AzureVision
    }

    async fn analyze(&self, payload: &ImagePayload) -> Result<CanonicalResult> {
        let api_key = required(&self.config.api_key, &self.config.env_name("API_KEY"))?;

        let response = self
            .client
            .post(self.url()?)
            .query(&self.query()?)
            .header(SUBSCRIPTION_KEY_HEADER, api_key)
            .header(CONTENT_TYPE, payload.mime_type())
            .body(payload.bytes().to_vec())
            .send()
            .await
            .map_err(|e| transport_error(self.family(), e))?;

        let body = success_body(self.family(), response).await?;
        let lines = parse_read_response(&body)?;

        debug!(lines = lines.len(), "Azure Vision read completed");
        Ok(CanonicalResult::TextLines(lines))
    }
}
