//! Request and result types shared by the gateway, the adapters and the API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GlimpseError, Result};

/// Placeholder written into a structured field when the model answered but
/// the value could not be recovered from its text.
///
/// Distinct from `None`, which means the model reported the value as absent.
pub const PARTIAL_EXTRACTION_SENTINEL: &str = "PARSE_ERROR";

/// Raw image bytes plus the MIME type declared by the uploader.
///
/// Owned by the gateway for one request and dropped afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the declared type and size. Nothing is decoded here.
    pub fn validate(&self, max_bytes: usize) -> Result<()> {
        if !self.mime_type.starts_with("image/") {
            return Err(GlimpseError::Validation(format!(
                "Unsupported content type: '{}' (expected image/*)",
                self.mime_type
            )));
        }

        if self.bytes.is_empty() {
            return Err(GlimpseError::Validation("Image is empty".to_string()));
        }

        if self.bytes.len() > max_bytes {
            return Err(GlimpseError::Validation(format!(
                "Image too large: {} bytes (max {} bytes)",
                self.bytes.len(),
                max_bytes
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// What a route extracts from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisMode {
    /// Raw OCR lines in reading order.
    TextLines,
    /// Meter value and serial number.
    StructuredFields,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextLines => write!(f, "text-lines"),
            Self::StructuredFields => write!(f, "structured-fields"),
        }
    }
}

/// The two fields pulled out of a meter photograph.
///
/// Serialized with explicit `null` for absent values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredFields {
    pub meter_value: Option<String>,
    pub serial_number: Option<String>,
}

impl StructuredFields {
    /// True when at least one field holds the partial-extraction sentinel.
    pub fn is_partial(&self) -> bool {
        [&self.meter_value, &self.serial_number]
            .iter()
            .any(|v| v.as_deref() == Some(PARTIAL_EXTRACTION_SENTINEL))
    }
}

/// Provider-independent analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum CanonicalResult {
    TextLines(Vec<String>),
    StructuredFields(StructuredFields),
}

impl CanonicalResult {
    pub fn mode(&self) -> AnalysisMode {
        match self {
            Self::TextLines(_) => AnalysisMode::TextLines,
            Self::StructuredFields(_) => AnalysisMode::StructuredFields,
        }
    }

    pub fn is_partial(&self) -> bool {
        match self {
            Self::TextLines(_) => false,
            Self::StructuredFields(fields) => fields.is_partial(),
        }
    }
}

/// Optional pixel transform requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Preprocess {
    #[default]
    None,
    Grayscale,
    Binary,
}

impl FromStr for Preprocess {
    type Err = GlimpseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(Self::Grayscale),
            "binary" | "binarize" | "bw" => Ok(Self::Binary),
            other => Err(GlimpseError::Validation(format!(
                "Unknown preprocess mode '{other}' (expected none, grayscale or binary)"
            ))),
        }
    }
}

/// One unit of work handed to the gateway.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub payload: ImagePayload,
    pub preprocess: Preprocess,
    pub mock: bool,
}

impl AnalysisRequest {
    pub fn new(payload: ImagePayload) -> Self {
        Self {
            payload,
            preprocess: Preprocess::None,
            mock: false,
        }
    }

    pub fn with_preprocess(mut self, preprocess: Preprocess) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }
}
