use crate::config::toml_config::TomlConfig;
use crate::config::{AppConfig, ConfigOverrides, API_KEY_ENV};
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "lab-relay")]
#[command(about = "Relay lab-report images and health chat to a generative model")]
pub struct CliConfig {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Relay profile: healthwise or clinical
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the profile's model identifier
    #[arg(long)]
    pub model: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            profile: self.profile.clone(),
            model_id: self.model.clone(),
        }
    }

    /// 讀取設定檔與環境變數，組出最終配置
    pub fn load(&self) -> Result<AppConfig> {
        let file = match &self.config {
            Some(path) => {
                tracing::info!("📁 Loading configuration from: {}", path.display());
                Some(TomlConfig::from_file(path)?)
            }
            None => None,
        };

        AppConfig::resolve(
            &self.overrides(),
            file.as_ref(),
            std::env::var(API_KEY_ENV).ok(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = CliConfig::parse_from([
            "lab-relay",
            "--host",
            "127.0.0.1",
            "--port",
            "8081",
            "--profile",
            "clinical",
            "--model",
            "gemini-2.5-pro",
            "-v",
        ]);

        let overrides = cli.overrides();
        assert_eq!(overrides.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(overrides.port, Some(8081));
        assert_eq!(overrides.profile.as_deref(), Some("clinical"));
        assert_eq!(overrides.model_id.as_deref(), Some("gemini-2.5-pro"));
        assert!(cli.verbose);
        assert!(!cli.json_logs);
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let cli = CliConfig::parse_from(["lab-relay", "--config", "/nonexistent/relay.toml"]);
        assert!(cli.load().is_err());
    }
}
