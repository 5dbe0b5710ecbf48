use anyhow::Context;
use clap::Parser;
use lab_relay::config::toml_config::TomlConfig;
use lab_relay::config::{AppConfig, ConfigOverrides, API_KEY_ENV};
use lab_relay::domain::model::ImagePayload;
use lab_relay::utils::{logger, validation::Validate};
use lab_relay::{GeminiClient, LabRelay};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "analyze-report")]
#[command(about = "Run a single lab-report image through the relay and print the JSON result")]
struct Args {
    /// Lab report image (PNG, JPEG, GIF or WEBP)
    image: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay profile: healthwise or clinical
    #[arg(long)]
    profile: Option<String>,

    /// Override the profile's model identifier
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let file = args
        .config
        .as_ref()
        .map(TomlConfig::from_file)
        .transpose()
        .context("failed to load configuration file")?;

    let overrides = ConfigOverrides {
        profile: args.profile.clone(),
        model_id: args.model.clone(),
        ..Default::default()
    };
    let config = AppConfig::resolve(&overrides, file.as_ref(), std::env::var(API_KEY_ENV).ok())?;
    config.validate()?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    let image = ImagePayload::from_upload(None, bytes)?;

    tracing::info!("📄 Analyzing {} with profile '{}'", args.image.display(), config.profile.name);

    let relay = LabRelay::new(GeminiClient::new(&config.model)?, config.profile);
    let result = relay.analyze(&image).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
