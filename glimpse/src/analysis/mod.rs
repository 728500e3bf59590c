//! Image analysis gateway.
//!
//! A request flows through [`AnalysisGateway`]: the payload is validated,
//! optionally run through the pixel transform, and handed to whichever
//! responder the [`ProviderSelector`] picks for the route.
//!
//! # Providers
//!
//! - `azure-vision`: OCR read API, produces text lines
//! - `azure-openai` / `openai`: chat completions with image input, produces
//!   the meter value and serial number
//!
//! A per-request mock flag swaps the provider for [`MockResponder`], which
//! returns a fixed result after a short delay without any network traffic.

mod azure_vision;
mod chat;
mod gateway;
mod mock;
mod preprocessing;
mod provider;

pub use azure_vision::AzureVisionClient;
pub use chat::{ChatDialect, VisionChatClient, DEFAULT_OPENAI_BASE_URL};
pub use gateway::{AnalysisGateway, Stage};
pub use mock::{mock_result, MockResponder, MOCK_METER_VALUE, MOCK_SERIAL_NUMBER, MOCK_TEXT_LINES};
pub use preprocessing::{luma, preprocess_image, preprocess_payload, transform_pixels, BINARY_THRESHOLD};
pub use provider::{ImageAnalyzer, ProviderFamily, ProviderSelector, RequiredField, Responder};
