pub mod analyze;
pub(crate) mod health;

pub use health::health_check;
