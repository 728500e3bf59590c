//! Wire format for v1 responses.
//!
//! Success bodies carry the canonical result under `results`:
//!
//! ```json
//! { "results": ["line one", "line two"] }
//! { "results": { "meterValue": "012345.6", "serialNumber": null }, "partial": true }
//! ```
//!
//! Failures carry a caller-safe message and the HTTP status:
//!
//! ```json
//! { "error": "Image too large: 5242880 bytes (max 4194304 bytes)", "code": 400 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::GlimpseError;
use crate::models::CanonicalResult;

/// Body of a successful analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AnalyzeResponse {
    pub results: CanonicalResult,
    /// Present and `true` only when some field could not be recovered from
    /// the model's reply and holds the `PARSE_ERROR` placeholder.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl From<CanonicalResult> for AnalyzeResponse {
    fn from(results: CanonicalResult) -> Self {
        Self {
            partial: results.is_partial(),
            results,
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: u16,
}

impl From<&GlimpseError> for ApiError {
    fn from(err: &GlimpseError) -> Self {
        Self {
            error: err.public_message(),
            code: err.status().as_u16(),
        }
    }
}
