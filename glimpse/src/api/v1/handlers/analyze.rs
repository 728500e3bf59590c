use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::analysis::AnalysisGateway;
use crate::api::extractors::AppQuery;
use crate::api::state::AppState;
use crate::api::v1::response::{AnalyzeResponse, ApiError};
use crate::error::{GlimpseError, Result};
use crate::models::{AnalysisRequest, ImagePayload, Preprocess};

/// Query parameters shared by both analysis routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyzeQuery {
    /// Return fixed data after a short delay instead of calling a provider.
    /// Accepts true/false/1/0/yes/no/on/off.
    pub mock: Option<String>,
    /// Pixel transform applied before dispatch: `none`, `grayscale` or `binary`.
    pub preprocess: Option<String>,
}

fn parse_form_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AnalyzeQuery {
    fn mock(&self) -> Result<bool> {
        match self.mock.as_deref() {
            None => Ok(false),
            // `?mock` with no value
            Some("") => Ok(true),
            Some(raw) => parse_form_bool(raw).ok_or_else(|| {
                GlimpseError::Validation(
                    "mock must be one of true/false/1/0/yes/no/on/off".to_string(),
                )
            }),
        }
    }

    fn preprocess(&self) -> Result<Preprocess> {
        self.preprocess
            .as_deref()
            .map_or(Ok(Preprocess::None), str::parse)
    }
}

/// Pull the image out of the form. `file` is accepted as an alias of `image`.
async fn read_image(mut multipart: Multipart) -> Result<ImagePayload> {
    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("image" | "file")) {
            continue;
        }

        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(ImagePayload::new(bytes.to_vec(), mime_type));
    }

    Err(GlimpseError::Validation(
        "Missing required 'image' field".to_string(),
    ))
}

async fn run(
    gateway: &AnalysisGateway,
    query: AnalyzeQuery,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let mock = query.mock()?;
    let preprocess = query.preprocess()?;
    let payload = read_image(multipart?).await?;

    let request = AnalysisRequest::new(payload)
        .with_preprocess(preprocess)
        .with_mock(mock);

    let result = gateway.analyze(request).await?;
    Ok(Json(AnalyzeResponse::from(result)))
}

/// `POST /api/v1/ocr`
///
/// Reads the text in an image and returns it line by line.
#[utoipa::path(
    post,
    path = "/api/v1/ocr",
    tag = "analysis",
    operation_id = "analysis.ocr",
    params(AnalyzeQuery),
    request_body(content_type = "multipart/form-data", content = String, description = "Image in an `image` (or `file`) field; the part's content type must be image/*"),
    responses(
        (status = 200, description = "OCR lines in reading order", body = AnalyzeResponse),
        (status = 400, description = "Invalid upload or query", body = ApiError),
        (status = 500, description = "Service misconfigured", body = ApiError),
        (status = 502, description = "Provider failure", body = ApiError),
    )
)]
pub async fn analyze_text(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AnalyzeQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>> {
    run(&state.ocr, query, multipart).await
}

/// `POST /api/v1/meter`
///
/// Extracts the reading and serial number from a meter photograph.
/// `partial` is set when the model's reply could only be scraped.
#[utoipa::path(
    post,
    path = "/api/v1/meter",
    tag = "analysis",
    operation_id = "analysis.meter",
    params(AnalyzeQuery),
    request_body(content_type = "multipart/form-data", content = String, description = "Image in an `image` (or `file`) field; the part's content type must be image/*"),
    responses(
        (status = 200, description = "Meter value and serial number", body = AnalyzeResponse),
        (status = 400, description = "Invalid upload or query", body = ApiError),
        (status = 500, description = "Service misconfigured", body = ApiError),
        (status = 502, description = "Provider failure", body = ApiError),
    )
)]
pub async fn analyze_meter(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<AnalyzeQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>> {
    run(&state.meter, query, multipart).await
}
