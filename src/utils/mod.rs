//! Logging setup and settings loading

pub mod logger;
pub mod settings;

pub use settings::Settings;
