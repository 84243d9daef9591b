use dotenvy::dotenv;
use quanta_bot::{
    bot,
    config::{database, settings},
    core::{
        exit::{ExitCoordinator, spawn_signal_listener},
        prefix::PrefixCache,
    },
    errors::{Error, Result},
};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load config.toml
    let settings = Arc::new(
        settings::load_default_settings()
            .inspect_err(|e| error!("Failed to load settings: {e}"))?,
    );

    // 4. Connect the prefix store, a missing database only costs custom prefixes
    let connection = database::create_connection().await;
    let store = database::open_prefix_store(connection, &settings.bot.default_prefix).await;
    let prefixes = Arc::new(PrefixCache::new(store, settings.prefix_cache.capacity));

    // 5. Route SIGINT/SIGTERM into the exit coordinator
    let exit = Arc::new(ExitCoordinator::new());
    let signals = spawn_signal_listener(Arc::clone(&exit));

    // 6. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in Settings
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    let result = bot::run_bot(token, settings, prefixes, exit).await;
    signals.abort();
    result?;

    info!("Goodbye!");
    Ok(())
}
