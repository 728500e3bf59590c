use std::time::Duration;

use crate::models::{AnalysisMode, CanonicalResult, StructuredFields};

pub const MOCK_TEXT_LINES: &[&str] = &[
    "MOCK OCR RESULT",
    "Meter No. 4471-0092",
    "Reading 012345.6 kWh",
];

pub const MOCK_METER_VALUE: &str = "012345.6";
pub const MOCK_SERIAL_NUMBER: &str = "SN-4471-0092";

/// Fixed result for a mode. Identical on every call.
pub fn mock_result(mode: AnalysisMode) -> CanonicalResult {
    match mode {
        AnalysisMode::TextLines => {
            CanonicalResult::TextLines(MOCK_TEXT_LINES.iter().map(|s| s.to_string()).collect())
        }
        AnalysisMode::StructuredFields => CanonicalResult::StructuredFields(StructuredFields {
            meter_value: Some(MOCK_METER_VALUE.to_string()),
            serial_number: Some(MOCK_SERIAL_NUMBER.to_string()),
        }),
    }
}

/// Stands in for a provider during UI work. Never touches the network.
#[derive(Debug, Clone)]
pub struct MockResponder {
    mode: AnalysisMode,
    delay: Duration,
}

impl MockResponder {
    pub fn new(mode: AnalysisMode, delay: Duration) -> Self {
        Self { mode, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleeps for the configured delay, then returns the fixed result.
    ///
    /// The sleep only yields this task; other requests keep running.
    pub async fn respond(&self) -> CanonicalResult {
        tokio::time::sleep(self.delay).await;
        mock_result(self.mode)
    }
}
