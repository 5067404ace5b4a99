//! Token analysis: analytics snapshot, scam-risk scoring, reputation gate
//!
//! The risk score is a fixed weighted-threshold heuristic, not a
//! probability: each factor that trips its trigger adds its weight, and
//! the sum is reported as-is. With the current weights the score lands in
//! [0.0, 1.0] without any clamping.

use std::sync::Arc;

use tracing::{info, warn};

use crate::chain::ChainClient;
use crate::config::ThresholdsConfig;
use crate::error::Result;
use crate::gmgn::{GmgnClient, TokenAnalytics};
use crate::rugcheck::RugcheckSession;

/// Sniper-activity level above which the sniper penalty applies
const SNIPER_ACTIVITY_TRIGGER: f64 = 50.0;
/// Insider-trade count above which the insider penalty applies
const INSIDER_TRADES_TRIGGER: u64 = 10;

const WEIGHT_SNIPER: f64 = 0.3;
const WEIGHT_INSIDER: f64 = 0.2;
const WEIGHT_LIQUIDITY: f64 = 0.4;
const WEIGHT_TX_COUNT: f64 = 0.1;

/// Per-token analytics at a point in time, enriched with the derived
/// risk score and on-chain decimal precision.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub address: String,
    pub name: String,
    pub volume_24h: f64,
    pub liquidity: f64,
    pub tx_count_24h: u64,
    pub sniper_activity: f64,
    pub insider_trades: u64,
    pub trend_score: f64,
    pub scam_risk: f64,
    pub decimals: u8,
}

/// Compute the scam-risk score for an analytics snapshot.
///
/// Factors and weights:
/// - sniper_activity > 50        -> +0.3
/// - insider_trades  > 10        -> +0.2
/// - liquidity < threshold / 2   -> +0.4
/// - tx_count  < threshold / 2   -> +0.1
pub fn scam_risk(analytics: &TokenAnalytics, thresholds: &ThresholdsConfig) -> f64 {
    let mut risk = 0.0;

    if analytics.sniper_activity > SNIPER_ACTIVITY_TRIGGER {
        risk += WEIGHT_SNIPER;
    }
    if analytics.insider_trades > INSIDER_TRADES_TRIGGER {
        risk += WEIGHT_INSIDER;
    }
    if analytics.liquidity < thresholds.liquidity_threshold / 2.0 {
        risk += WEIGHT_LIQUIDITY;
    }
    if (analytics.tx_count_24h as f64) < thresholds.tx_count_threshold as f64 / 2.0 {
        risk += WEIGHT_TX_COUNT;
    }

    risk
}

/// Analyzer that turns a discovered candidate into a scored snapshot
pub struct TokenAnalyzer {
    gmgn: Arc<GmgnClient>,
    chain: Arc<ChainClient>,
    rugcheck: Arc<RugcheckSession>,
    thresholds: ThresholdsConfig,
}

impl TokenAnalyzer {
    pub fn new(
        gmgn: Arc<GmgnClient>,
        chain: Arc<ChainClient>,
        rugcheck: Arc<RugcheckSession>,
        thresholds: ThresholdsConfig,
    ) -> Self {
        Self {
            gmgn,
            chain,
            rugcheck,
            thresholds,
        }
    }

    /// Analyze a candidate. Returns `None` when analytics are absent or
    /// the token fails the external reputation check; both outcomes
    /// disqualify it from purchase regardless of score.
    pub async fn analyze(&self, address: &str, name: &str) -> Result<Option<TokenSnapshot>> {
        let analytics = match self.gmgn.fetch_token_analytics(address).await? {
            Some(a) => a,
            None => {
                warn!("No analytics data for {}", address);
                return Ok(None);
            }
        };

        let decimals = self.chain.token_decimals(address).await;
        let risk = scam_risk(&analytics, &self.thresholds);

        if !self.rugcheck.check_token(address).await? {
            info!("Token {} failed RugCheck validation", address);
            return Ok(None);
        }

        Ok(Some(TokenSnapshot {
            address: address.to_string(),
            name: name.to_string(),
            volume_24h: analytics.volume_24h,
            liquidity: analytics.liquidity,
            tx_count_24h: analytics.tx_count_24h,
            sniper_activity: analytics.sniper_activity,
            insider_trades: analytics.insider_trades,
            trend_score: 0.0,
            scam_risk: risk,
            decimals,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ThresholdsConfig {
        ThresholdsConfig {
            volume_threshold: 1000.0,
            liquidity_threshold: 500.0,
            tx_count_threshold: 100,
            trend_score_min: 0.5,
            scam_risk_max: 0.5,
            profit_multiplier_min: 2.0,
            profit_multiplier_max: 3.0,
            sell_fraction: 0.5,
        }
    }

    fn healthy_analytics() -> TokenAnalytics {
        TokenAnalytics {
            volume_24h: 5000.0,
            liquidity: 1000.0,
            tx_count_24h: 200,
            sniper_activity: 10.0,
            insider_trades: 0,
        }
    }

    #[test]
    fn test_no_factors_triggered() {
        assert_eq!(scam_risk(&healthy_analytics(), &thresholds()), 0.0);
    }

    #[test]
    fn test_sniper_activity_alone() {
        let mut analytics = healthy_analytics();
        analytics.sniper_activity = 60.0;
        assert_eq!(scam_risk(&analytics, &thresholds()), 0.3);
    }

    #[test]
    fn test_triggers_are_strict_comparisons() {
        let mut analytics = healthy_analytics();
        // Exactly at the trigger values: nothing fires
        analytics.sniper_activity = 50.0;
        analytics.insider_trades = 10;
        analytics.liquidity = 250.0; // == threshold / 2
        analytics.tx_count_24h = 50; // == threshold / 2
        assert_eq!(scam_risk(&analytics, &thresholds()), 0.0);
    }

    #[test]
    fn test_all_factors_sum_to_one() {
        let analytics = TokenAnalytics {
            volume_24h: 0.0,
            liquidity: 0.0,
            tx_count_24h: 0,
            sniper_activity: 100.0,
            insider_trades: 50,
        };
        let risk = scam_risk(&analytics, &thresholds());
        assert!((risk - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weights_are_additive() {
        let mut analytics = healthy_analytics();
        analytics.liquidity = 100.0; // below threshold / 2 -> +0.4
        analytics.insider_trades = 11; // above trigger -> +0.2
        let risk = scam_risk(&analytics, &thresholds());
        assert!((risk - 0.6).abs() < f64::EPSILON);
    }
}
