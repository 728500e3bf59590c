use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::FromRequestParts;

use crate::error::GlimpseError;

/// `Query` whose rejection renders as a 400 in the gateway's error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(GlimpseError))]
pub struct AppQuery<T>(pub T);

impl From<QueryRejection> for GlimpseError {
    fn from(rejection: QueryRejection) -> Self {
        GlimpseError::Validation(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for GlimpseError {
    fn from(rejection: MultipartRejection) -> Self {
        GlimpseError::Validation(format!(
            "Expected a multipart/form-data body: {}",
            rejection.body_text()
        ))
    }
}

impl From<MultipartError> for GlimpseError {
    fn from(err: MultipartError) -> Self {
        GlimpseError::Validation(format!("Failed to read upload: {}", err.body_text()))
    }
}
