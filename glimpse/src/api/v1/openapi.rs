use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::handlers;
use super::response;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Glimpse API",
        version = "1.0.0",
        description = "Image analysis gateway: OCR text lines and meter-reading extraction.",
    ),
    paths(
        handlers::health::health_check,
        handlers::analyze::analyze_text,
        handlers::analyze::analyze_meter,
    ),
    components(schemas(
        response::AnalyzeResponse,
        response::ApiError,
        models::CanonicalResult,
        models::StructuredFields,
        models::AnalysisMode,
        models::Preprocess,
        handlers::health::HealthData,
        handlers::health::ProviderStatus,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "analysis", description = "Image analysis (OCR and meter reading)"),
    ),
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
