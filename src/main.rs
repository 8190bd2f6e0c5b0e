//! Bot entrypoint: load config, wire up the backend client and session
//! store, then run the long-polling dispatcher until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teloxide::Bot;
use tracing::info;

use crmbot::api::CrmClient;
use crmbot::config::BotConfig;
use crmbot::dispatch::{self, AppContext};
use crmbot::session::redis_store::RedisSessionStore;
use crmbot::telemetry;

/// Telegram administrative client for the CRM backend.
#[derive(Debug, Parser)]
#[command(name = "crmbot", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "crmbot.toml", env = "CRMBOT_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = BotConfig::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    telemetry::init(&config.log_filter);
    info!(backend = %config.backend.base_url, "starting crmbot");

    let backend = CrmClient::new(&config.backend, config.telegram.link_secret.clone())
        .context("building backend client")?;
    let store = RedisSessionStore::connect(&config.redis.url, config.redis.session_ttl_secs)
        .await
        .context("connecting to redis")?;

    let ctx = Arc::new(AppContext::new(
        Arc::new(backend),
        Arc::new(store),
        config.rate_limits.clone(),
    ));

    let bot = Bot::new(config.telegram.bot_token.clone());
    dispatch::run(bot, ctx).await;

    info!("shutdown complete");
    Ok(())
}
