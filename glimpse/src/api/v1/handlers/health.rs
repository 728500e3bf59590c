use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::analysis::AnalysisGateway;
use crate::api::state::AppState;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub ocr: ProviderStatus,
    pub vision: ProviderStatus,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProviderStatus {
    pub provider: String,
    /// Whether every setting the provider family needs is present.
    /// Mock requests work either way.
    pub configured: bool,
}

impl ProviderStatus {
    fn of(gateway: &AnalysisGateway) -> Self {
        let selector = gateway.selector();
        Self {
            provider: selector.config().provider.clone(),
            configured: selector.validate().is_ok(),
        }
    }
}

/// `GET /api/v1/health`
///
/// Reports configuration state only; providers are never contacted.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service health status", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    Json(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ocr: ProviderStatus::of(&state.ocr),
        vision: ProviderStatus::of(&state.meter),
        max_upload_bytes: state.config.gateway.max_upload_bytes,
    })
}
