pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{gemini::GeminiClient, http::router};
pub use config::{profile::RelayProfile, AppConfig};
pub use core::normalizer::{normalize, Normalized};
pub use core::relay::LabRelay;
pub use utils::error::{RelayError, Result};
