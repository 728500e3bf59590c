use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{AnalysisGateway, ProviderSelector};
use crate::config::Config;
use crate::error::Result;
use crate::models::AnalysisMode;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Text-lines route, backed by the OCR provider config.
    pub ocr: AnalysisGateway,
    /// Structured-fields route, backed by the vision-model config.
    pub meter: AnalysisGateway,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let mock_delay = Duration::from_millis(config.gateway.mock_delay_ms);
        let max_upload_bytes = config.gateway.max_upload_bytes;

        let ocr = AnalysisGateway::new(
            ProviderSelector::new(config.ocr.clone(), AnalysisMode::TextLines, mock_delay)?,
            max_upload_bytes,
        );
        let meter = AnalysisGateway::new(
            ProviderSelector::new(
                config.vision.clone(),
                AnalysisMode::StructuredFields,
                mock_delay,
            )?,
            max_upload_bytes,
        );

        Ok(Self { config, ocr, meter })
    }
}
