pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{GlimpseError, Result};

#[cfg(test)]
mod test_support;
