#[cfg(feature = "cli")]
pub mod cli;
pub mod profile;
pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::validation::{
    validate_host, validate_non_empty_string, validate_positive_number, validate_range,
    validate_required_field, validate_secret, validate_url, Validate,
};
use profile::{RelayProfile, DEFAULT_PROFILE};
use std::time::Duration;
use toml_config::TomlConfig;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_SERVICE_NAME: &str = "HealthWise OCR Backend";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

// API key 不可出現在日誌中
impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Values supplied on the command line; they win over the TOML file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub profile: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub profile: RelayProfile,
}

impl AppConfig {
    /// 合併順序：命令列 > TOML 檔 > 環境變數 > 預設值
    pub fn resolve(
        overrides: &ConfigOverrides,
        file: Option<&TomlConfig>,
        env_api_key: Option<String>,
    ) -> Result<Self> {
        let file = file.cloned().unwrap_or_default();
        let server_section = file.server();
        let model_section = file.model();
        let profile_section = file.profile();

        let defaults = ServerConfig::default();
        let server = ServerConfig {
            host: overrides
                .host
                .clone()
                .or(server_section.host)
                .unwrap_or(defaults.host),
            port: overrides.port.or(server_section.port).unwrap_or(defaults.port),
            max_upload_bytes: server_section
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes),
            service_name: server_section.service_name.unwrap_or(defaults.service_name),
        };

        let api_key = model_section
            .api_key
            .or(env_api_key)
            .filter(|key| !key.trim().is_empty());
        let api_key = validate_required_field(API_KEY_ENV, &api_key)?.clone();

        let model = ModelConfig {
            endpoint: model_section
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            timeout: Duration::from_secs(
                model_section.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            retry_attempts: model_section
                .retry_attempts
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            retry_delay: Duration::from_millis(
                model_section.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
        };

        let profile_name = overrides
            .profile
            .clone()
            .or(profile_section.name)
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let mut profile = RelayProfile::builtin(&profile_name)?;
        if let Some(model_id) = overrides.model_id.clone().or(profile_section.model_id) {
            profile.model_id = model_id;
        }

        Ok(Self {
            server,
            model,
            profile,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_host("server.host", &self.server.host)?;
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        validate_positive_number("server.max_upload_bytes", self.server.max_upload_bytes, 1)?;
        validate_non_empty_string("server.service_name", &self.server.service_name)?;

        validate_url("model.endpoint", &self.model.endpoint)?;
        validate_secret("model.api_key", &self.model.api_key)?;
        validate_range("model.timeout_seconds", self.model.timeout.as_secs(), 1, 600)?;
        validate_range("model.retry_attempts", self.model.retry_attempts, 0, 3)?;

        self.profile.validate()?;

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }
}
