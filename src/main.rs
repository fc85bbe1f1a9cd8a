use anyhow::Context;
use tracing::{info, Level};

use asr_client::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let config = AppConfig::from_env_and_args();
    info!(server = %config.server_url, sample_rate = config.sample_rate, "starting asr client");
    asr_client::client::run(config)
        .await
        .context("client session failed")?;
    Ok(())
}

fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .try_init();
}
