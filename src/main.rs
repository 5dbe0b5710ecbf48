use clap::Parser;
use lab_relay::adapters::http;
use lab_relay::utils::error::{ErrorSeverity, RelayError};
use lab_relay::utils::{logger, validation::Validate};
use lab_relay::{CliConfig, GeminiClient, LabRelay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting lab-relay v{}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置，缺少 API key 時立即結束
    let config = match cli.load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    tracing::info!(
        "🔧 Profile '{}' using model {} ({} retries, {:?} timeout)",
        config.profile.name,
        config.profile.model_id,
        config.model.retry_attempts,
        config.model.timeout
    );

    let client = match GeminiClient::new(&config.model) {
        Ok(client) => client,
        Err(e) => exit_with(e),
    };
    let relay = LabRelay::new(client, config.profile.clone());

    if let Err(e) = http::serve(relay, &config.server).await {
        exit_with(e);
    }

    Ok(())
}

fn exit_with(e: RelayError) -> ! {
    tracing::error!(
        "❌ lab-relay failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
