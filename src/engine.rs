//! Decision engine and polling scheduler
//!
//! One iteration per tick: discover and score candidates, buy the ones
//! that clear every entry gate, then re-price held positions and sell
//! according to the profit bands. An iteration that errors is logged and
//! the loop carries on; only cancellation stops it.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::native_token::LAMPORTS_PER_SOL;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analyzer::{TokenAnalyzer, TokenSnapshot};
use crate::config::{SchedulerConfig, ThresholdsConfig};
use crate::error::Result;
use crate::gmgn::GmgnClient;
use crate::position::{Position, PositionStore};
use crate::trader::{token_units, Trader};

/// Token quantity quoted to discover a position's current price
const PROBE_QUANTITY: f64 = 0.001;

/// What to do with a held position at its current profit multiplier
#[derive(Debug, Clone, PartialEq)]
pub enum SellDecision {
    /// Exit the whole position
    Full,
    /// Take profit on the configured fraction
    Partial,
    Hold,
}

/// Entry gates: all five must pass for a buy.
/// Risk is excluded at the maximum; trend qualifies at the minimum.
pub fn passes_buy_gates(snapshot: &TokenSnapshot, thresholds: &ThresholdsConfig) -> bool {
    snapshot.volume_24h >= thresholds.volume_threshold
        && snapshot.liquidity >= thresholds.liquidity_threshold
        && snapshot.tx_count_24h >= thresholds.tx_count_threshold
        && snapshot.trend_score >= thresholds.trend_score_min
        && snapshot.scam_risk < thresholds.scam_risk_max
}

/// Map a profit multiplier onto the sell bands
pub fn sell_decision(multiplier: f64, thresholds: &ThresholdsConfig) -> SellDecision {
    if multiplier >= thresholds.profit_multiplier_max {
        SellDecision::Full
    } else if multiplier >= thresholds.profit_multiplier_min {
        SellDecision::Partial
    } else {
        SellDecision::Hold
    }
}

/// The trading loop
pub struct Engine {
    gmgn: Arc<GmgnClient>,
    analyzer: Arc<TokenAnalyzer>,
    trader: Arc<Trader>,
    store: Arc<PositionStore>,
    thresholds: ThresholdsConfig,
    scheduler: SchedulerConfig,
    dry_run: bool,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gmgn: Arc<GmgnClient>,
        analyzer: Arc<TokenAnalyzer>,
        trader: Arc<Trader>,
        store: Arc<PositionStore>,
        thresholds: ThresholdsConfig,
        scheduler: SchedulerConfig,
        dry_run: bool,
    ) -> Self {
        Self {
            gmgn,
            analyzer,
            trader,
            store,
            thresholds,
            scheduler,
            dry_run,
        }
    }

    /// Run until cancelled. The current iteration always finishes before
    /// shutdown; cancellation is only observed between iterations.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.scheduler.check_interval_secs);
        info!(
            "Engine started (interval {}s, dry_run {})",
            self.scheduler.check_interval_secs, self.dry_run
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_iteration().await {
                error!("Iteration failed: {}", e);
            }

            tokio::select! {
                _ = sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("Engine stopped");
    }

    async fn run_iteration(&self) -> Result<()> {
        self.buy_phase().await?;
        self.sell_phase().await?;
        Ok(())
    }

    /// Discover, score and buy. Candidates are handled one at a time; a
    /// failure on one never blocks the rest.
    async fn buy_phase(&self) -> Result<()> {
        let tokens = self.gmgn.fetch_new_tokens().await?;
        if tokens.is_empty() {
            debug!("No new tokens discovered");
            return Ok(());
        }

        let trends = self.gmgn.fetch_market_trends().await?;

        for token in tokens {
            let mut snapshot = match self.analyzer.analyze(&token.address, &token.name).await {
                Ok(Some(s)) => s,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Analysis failed for {}: {}", token.address, e);
                    continue;
                }
            };

            snapshot.trend_score = trends.get(&snapshot.address).copied().unwrap_or(0.0);

            if !passes_buy_gates(&snapshot, &self.thresholds) {
                debug!(
                    "{} rejected (risk {:.2}, trend {:.2})",
                    snapshot.address, snapshot.scam_risk, snapshot.trend_score
                );
                continue;
            }

            info!(
                "Buy signal for {} ({}): risk {:.2}, trend {:.2}",
                snapshot.name, snapshot.address, snapshot.scam_risk, snapshot.trend_score
            );

            if self.dry_run {
                info!("Dry run: skipping buy of {}", snapshot.address);
                continue;
            }

            if let Err(e) = self.trader.execute_buy(&snapshot).await {
                warn!("Buy failed for {}: {}", snapshot.address, e);
            }
        }

        Ok(())
    }

    /// Re-price every held position and act on the profit bands
    async fn sell_phase(&self) -> Result<()> {
        for position in self.store.held().await {
            let price = match self.current_price(&position).await {
                Some(p) => p,
                None => {
                    warn!("No price available for {}, holding", position.address);
                    continue;
                }
            };

            let multiplier = price / position.cost_basis_sol;
            let decision = sell_decision(multiplier, &self.thresholds);
            debug!(
                "{} at {:.2}x cost basis: {:?}",
                position.address, multiplier, decision
            );

            let sell_quantity = match decision {
                SellDecision::Full => position.quantity,
                SellDecision::Partial => position.quantity * self.thresholds.sell_fraction,
                SellDecision::Hold => continue,
            };

            info!(
                "Sell signal for {} at {:.2}x: selling {:.4} of {:.4}",
                position.name, multiplier, sell_quantity, position.quantity
            );

            if self.dry_run {
                info!("Dry run: skipping sell of {}", position.address);
                continue;
            }

            match self.trader.execute_sell(&position, sell_quantity).await {
                Ok(fill) => {
                    let remaining = (position.quantity - sell_quantity).max(0.0);
                    if let Err(e) = self.store.set_quantity(&position.address, remaining).await {
                        error!("Failed to record sell for {}: {}", position.address, e);
                    }
                    info!(
                        "Sold {} for {:.4} SOL, {:.4} remaining",
                        position.name, fill.proceeds_sol, remaining
                    );
                }
                Err(e) => warn!("Sell failed for {}: {}", position.address, e),
            }
        }

        Ok(())
    }

    /// Current price per token in SOL, discovered by quoting a small
    /// probe swap back to SOL. `None` when the router has no route.
    async fn current_price(&self, position: &Position) -> Option<f64> {
        let probe_units = token_units(PROBE_QUANTITY, position.decimals);

        let route = match self
            .trader
            .quote(&position.address, probe_units)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Probe quote failed for {}: {}", position.address, e);
                return None;
            }
        };

        let out_amount = route?;
        if out_amount == 0 {
            return None;
        }

        Some(probe_price(out_amount))
    }
}

/// Price per token in SOL implied by a probe quote's lamport output
fn probe_price(out_lamports: u64) -> f64 {
    (out_lamports as f64 / LAMPORTS_PER_SOL as f64) / PROBE_QUANTITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdsConfig;

    fn thresholds() -> ThresholdsConfig {
        ThresholdsConfig::default()
    }

    fn passing_snapshot() -> TokenSnapshot {
        TokenSnapshot {
            address: "Mint111".to_string(),
            name: "Test Token".to_string(),
            volume_24h: 5000.0,
            liquidity: 1000.0,
            tx_count_24h: 200,
            sniper_activity: 10.0,
            insider_trades: 0,
            trend_score: 0.8,
            scam_risk: 0.1,
            decimals: 6,
        }
    }

    #[test]
    fn test_all_gates_pass() {
        assert!(passes_buy_gates(&passing_snapshot(), &thresholds()));
    }

    #[test]
    fn test_each_gate_is_required() {
        let t = thresholds();

        let mut s = passing_snapshot();
        s.volume_24h = 999.0;
        assert!(!passes_buy_gates(&s, &t));

        let mut s = passing_snapshot();
        s.liquidity = 499.0;
        assert!(!passes_buy_gates(&s, &t));

        let mut s = passing_snapshot();
        s.tx_count_24h = 99;
        assert!(!passes_buy_gates(&s, &t));

        let mut s = passing_snapshot();
        s.trend_score = 0.49;
        assert!(!passes_buy_gates(&s, &t));

        let mut s = passing_snapshot();
        s.scam_risk = 0.6;
        assert!(!passes_buy_gates(&s, &t));
    }

    #[test]
    fn test_gate_boundaries() {
        let t = thresholds();

        // At the threshold the inclusive gates pass
        let mut s = passing_snapshot();
        s.volume_24h = t.volume_threshold;
        s.liquidity = t.liquidity_threshold;
        s.tx_count_24h = t.tx_count_threshold;
        s.trend_score = t.trend_score_min;
        assert!(passes_buy_gates(&s, &t));

        // Risk exactly at the maximum is excluded
        s.scam_risk = t.scam_risk_max;
        assert!(!passes_buy_gates(&s, &t));
    }

    #[test]
    fn test_probe_price_scales_by_probe_quantity() {
        // 0.002 SOL out for the 0.001-token probe means 2 SOL per token
        assert!((probe_price(2_000_000) - 2.0).abs() < 1e-12);
        // One full SOL out for the probe means 1000 SOL per token
        assert!((probe_price(1_000_000_000) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_bands() {
        let t = thresholds();
        assert_eq!(sell_decision(3.5, &t), SellDecision::Full);
        assert_eq!(sell_decision(3.0, &t), SellDecision::Full);
        assert_eq!(sell_decision(2.5, &t), SellDecision::Partial);
        assert_eq!(sell_decision(2.0, &t), SellDecision::Partial);
        assert_eq!(sell_decision(1.99, &t), SellDecision::Hold);
        assert_eq!(sell_decision(0.5, &t), SellDecision::Hold);
    }
}
