use std::sync::Arc;

use paper_ledger::config::Config;
use paper_ledger::services::{PriceProvider, PriceRefresher, SqliteStore, TradingService};
use paper_ledger::sources::AlphaVantageFeed;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paper_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!("Starting paper ledger with database {}", config.database_path);

    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    let feed = Arc::new(AlphaVantageFeed::new(
        config.alpha_vantage_url.clone(),
        config.feed_timeout(),
    )?);
    let prices = Arc::new(PriceProvider::new(feed, store.clone(), config.provider_config()));
    info!("{} Alpha Vantage key(s) configured", config.alpha_vantage_keys.len());

    let trading = TradingService::new(store.clone(), prices.clone());
    let account = trading.open_account(&config.default_user_id, config.initial_cash)?;
    info!("Cash balance for {}: ${}", account.user_id, account.balance);

    let monitor = trading.order_monitor(config.monitor_config());
    monitor.start();

    let refresher = config.price_refresh_interval().map(|interval| {
        let refresher = Arc::new(PriceRefresher::new(store.clone(), prices.clone(), interval));
        refresher.start();
        refresher
    });
    if refresher.is_none() {
        info!("Price refresher disabled");
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    monitor.stop().await;
    if let Some(refresher) = refresher {
        refresher.stop().await;
    }

    Ok(())
}
