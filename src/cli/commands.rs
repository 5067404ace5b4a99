//! CLI command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analyzer::TokenAnalyzer;
use crate::cache::TtlCache;
use crate::chain::ChainClient;
use crate::config::Config;
use crate::engine::Engine;
use crate::gmgn::GmgnClient;
use crate::position::PositionStore;
use crate::rugcheck::RugcheckSession;
use crate::trader::Trader;
use crate::wallet::Wallet;

/// Start the trading agent
pub async fn start(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        warn!("Running in DRY-RUN mode - no real trades will be executed");
    }

    info!("Starting GMGN sniper agent...");
    info!(
        "Buy amount: {} SOL, Slippage: {}%",
        config.trading.buy_amount_sol, config.trading.slippage_pct
    );

    // The wallet is non-negotiable; a bad key stops the process here
    let wallet = Arc::new(Wallet::from_base58(&config.wallet.private_key)?);
    info!("Loaded wallet: {}", wallet.address());

    let cache = Arc::new(TtlCache::new(Duration::from_secs(
        config.scheduler.cache_expiry_secs,
    )));
    let gmgn = Arc::new(GmgnClient::new(&config.api, cache)?);
    let chain = Arc::new(ChainClient::new(&config.rpc));
    let rugcheck = Arc::new(RugcheckSession::new(&config.api, wallet.clone())?);

    // Authenticate up front: without a RugCheck session no token can
    // pass the reputation gate, so there is nothing to run
    rugcheck.ensure_token().await?;

    info!("Loading positions from {}...", config.store.path);
    let store = Arc::new(PositionStore::open(&config.store.path).await?);
    info!("{} positions on record", store.len().await);

    let trader = Arc::new(Trader::new(
        gmgn.clone(),
        chain.clone(),
        wallet,
        store.clone(),
        config.trading.clone(),
    ));
    let analyzer = Arc::new(TokenAnalyzer::new(
        gmgn.clone(),
        chain,
        rugcheck,
        config.thresholds.clone(),
    ));

    let engine = Engine::new(
        gmgn,
        analyzer,
        trader,
        store,
        config.thresholds.clone(),
        config.scheduler.clone(),
        dry_run,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, finishing current iteration...");
                signal_cancel.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    engine.run(cancel).await;

    info!("Agent stopped cleanly");
    Ok(())
}

/// Show current positions
pub async fn status(config: &Config) -> Result<()> {
    let store = PositionStore::open(&config.store.path).await?;
    let positions = store.all().await;

    if positions.is_empty() {
        println!("No positions on record.");
        return Ok(());
    }

    println!("{} position(s):", positions.len());
    for p in positions {
        let state = if p.quantity > 0.0 { "held" } else { "sold out" };
        println!(
            "  {} ({}) [{}]: {:.4} @ {:.6} SOL, risk {:.2}, updated {}",
            p.name,
            p.address,
            state,
            p.quantity,
            p.cost_basis_sol,
            p.scam_risk,
            p.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
