//! Shashin self-play driver
//!
//! Usage: `shashin-player [config.properties]`

use tracing::{error, info};

use self_play::{run, PlayerConfig};

const DEFAULT_CONFIG: &str = "shashin.properties";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local overrides
    let _ = dotenvy::dotenv();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());

    // Failures are reported, not turned into an exit status
    let config = match PlayerConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!(config = %path, error = %e, "Invalid configuration");
            return Ok(());
        }
    };
    info!(
        config = %path,
        engine = %config.engine_name,
        budget_secs = config.time_budget().as_secs(),
        model = %config.model,
        "Configuration loaded"
    );

    match run(&config).await {
        Ok(summary) => info!(
            played = summary.games_played,
            skipped = summary.games_skipped,
            failed = summary.games_failed,
            "Done"
        ),
        Err(e) => error!(error = %e, "Stopped"),
    }
    Ok(())
}
