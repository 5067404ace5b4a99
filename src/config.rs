//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// External API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// GMGN router/analytics host
    #[serde(default = "default_gmgn_host")]
    pub gmgn_host: String,
    /// RugCheck API base URL
    #[serde(default = "default_rugcheck_base")]
    pub rugcheck_api_base: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Base58-encoded wallet private key. Required; the agent refuses to
    /// start without it.
    #[serde(default = "default_wallet_private_key")]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Wrapped SOL mint, the base currency of every swap
    #[serde(default = "default_sol_mint")]
    pub sol_mint: String,
    /// SOL spent per buy
    #[serde(default = "default_buy_amount_sol")]
    pub buy_amount_sol: f64,
    /// Slippage tolerance in percent
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,
    /// Attempts when polling for transaction finalization
    #[serde(default = "default_confirm_attempts")]
    pub confirm_attempts: u32,
    /// Delay between finalization polls (ms)
    #[serde(default = "default_confirm_poll_ms")]
    pub confirm_poll_ms: u64,
}

/// Buy/sell trigger thresholds. Immutable for the lifetime of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: f64,
    #[serde(default = "default_liquidity_threshold")]
    pub liquidity_threshold: f64,
    #[serde(default = "default_tx_count_threshold")]
    pub tx_count_threshold: u64,
    #[serde(default = "default_trend_score_min")]
    pub trend_score_min: f64,
    #[serde(default = "default_scam_risk_max")]
    pub scam_risk_max: f64,
    /// Lower profit band: partial sell at or above this multiplier
    #[serde(default = "default_profit_multiplier_min")]
    pub profit_multiplier_min: f64,
    /// Upper profit band: full sell at or above this multiplier
    #[serde(default = "default_profit_multiplier_max")]
    pub profit_multiplier_max: f64,
    /// Fraction of holdings sold on a partial sell
    #[serde(default = "default_sell_fraction")]
    pub sell_fraction: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between market checks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// TTL for cached discovery/analytics payloads (seconds)
    #[serde(default = "default_cache_expiry_secs")]
    pub cache_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path of the position store file
    #[serde(default = "default_store_path")]
    pub path: String,
}

// Default value functions
fn default_gmgn_host() -> String {
    std::env::var("GMGN_API_HOST").unwrap_or_else(|_| "https://gmgn.ai".into())
}

fn default_rugcheck_base() -> String {
    std::env::var("RUGCHECK_API_BASE").unwrap_or_else(|_| "https://api.rugcheck.xyz".into())
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_rpc_endpoint() -> String {
    std::env::var("SOLANA_RPC").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_rpc_timeout_ms() -> u64 {
    30000
}

fn default_wallet_private_key() -> String {
    std::env::var("WALLET_PRIVATE_KEY").unwrap_or_default()
}

fn default_sol_mint() -> String {
    "So11111111111111111111111111111111111111112".into()
}

fn default_buy_amount_sol() -> f64 {
    1.0
}

fn default_slippage_pct() -> f64 {
    0.5
}

fn default_confirm_attempts() -> u32 {
    10
}

fn default_confirm_poll_ms() -> u64 {
    3000
}

fn default_volume_threshold() -> f64 {
    1000.0
}

fn default_liquidity_threshold() -> f64 {
    500.0
}

fn default_tx_count_threshold() -> u64 {
    100
}

fn default_trend_score_min() -> f64 {
    0.5
}

fn default_scam_risk_max() -> f64 {
    0.5
}

fn default_profit_multiplier_min() -> f64 {
    2.0
}

fn default_profit_multiplier_max() -> f64 {
    3.0
}

fn default_sell_fraction() -> f64 {
    0.5
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_cache_expiry_secs() -> u64 {
    300
}

fn default_store_path() -> String {
    "positions.json".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            gmgn_host: default_gmgn_host(),
            rugcheck_api_base: default_rugcheck_base(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key: default_wallet_private_key(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            sol_mint: default_sol_mint(),
            buy_amount_sol: default_buy_amount_sol(),
            slippage_pct: default_slippage_pct(),
            confirm_attempts: default_confirm_attempts(),
            confirm_poll_ms: default_confirm_poll_ms(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            volume_threshold: default_volume_threshold(),
            liquidity_threshold: default_liquidity_threshold(),
            tx_count_threshold: default_tx_count_threshold(),
            trend_score_min: default_trend_score_min(),
            scam_risk_max: default_scam_risk_max(),
            profit_multiplier_min: default_profit_multiplier_min(),
            profit_multiplier_max: default_profit_multiplier_max(),
            sell_fraction: default_sell_fraction(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            cache_expiry_secs: default_cache_expiry_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            rpc: RpcConfig::default(),
            wallet: WalletConfig::default(),
            trading: TradingConfig::default(),
            thresholds: ThresholdsConfig::default(),
            scheduler: SchedulerConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER_)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        // The wallet key is the one setting the agent cannot run without
        if self.wallet.private_key.trim().is_empty() {
            anyhow::bail!("Critical environment variable missing: WALLET_PRIVATE_KEY");
        }

        if self.trading.buy_amount_sol <= 0.0 {
            anyhow::bail!("buy_amount_sol must be positive");
        }

        if self.trading.slippage_pct < 0.0 || self.trading.slippage_pct > 100.0 {
            anyhow::bail!("slippage_pct must be between 0 and 100");
        }

        if self.thresholds.sell_fraction <= 0.0 || self.thresholds.sell_fraction > 1.0 {
            anyhow::bail!("sell_fraction must be in (0, 1]");
        }

        if self.thresholds.profit_multiplier_max < self.thresholds.profit_multiplier_min {
            anyhow::bail!("profit_multiplier_max cannot be below profit_multiplier_min");
        }

        if self.thresholds.scam_risk_max < 0.0 || self.thresholds.scam_risk_max > 1.0 {
            anyhow::bail!("scam_risk_max must be between 0 and 1");
        }

        if self.scheduler.check_interval_secs == 0 {
            anyhow::bail!("check_interval_secs must be positive");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  API:
    gmgn_host: {}
    rugcheck: {}
  RPC:
    endpoint: {}
    timeout: {}ms
  Wallet:
    private_key: {}
  Trading:
    buy_amount: {} SOL
    slippage: {}%
  Thresholds:
    volume: {}
    liquidity: {}
    tx_count: {}
    trend_score_min: {}
    scam_risk_max: {}
    profit_bands: {}x / {}x
    sell_fraction: {}
  Scheduler:
    check_interval: {}s
    cache_expiry: {}s
  Store:
    path: {}
"#,
            mask_url(&self.api.gmgn_host),
            mask_url(&self.api.rugcheck_api_base),
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            if self.wallet.private_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.trading.buy_amount_sol,
            self.trading.slippage_pct,
            self.thresholds.volume_threshold,
            self.thresholds.liquidity_threshold,
            self.thresholds.tx_count_threshold,
            self.thresholds.trend_score_min,
            self.thresholds.scam_risk_max,
            self.thresholds.profit_multiplier_min,
            self.thresholds.profit_multiplier_max,
            self.thresholds.sell_fraction,
            self.scheduler.check_interval_secs,
            self.scheduler.cache_expiry_secs,
            self.store.path,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.thresholds.volume_threshold, 1000.0);
        assert_eq!(config.thresholds.liquidity_threshold, 500.0);
        assert_eq!(config.thresholds.tx_count_threshold, 100);
        assert_eq!(config.thresholds.profit_multiplier_min, 2.0);
        assert_eq!(config.thresholds.profit_multiplier_max, 3.0);
        assert_eq!(config.scheduler.cache_expiry_secs, 300);
        assert_eq!(config.trading.buy_amount_sol, 1.0);
    }

    #[test]
    fn test_missing_wallet_key_fails_validation() {
        let mut config = Config::default();
        config.wallet.private_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = Config::default();
        config.wallet.private_key = "5test".into();
        assert!(config.validate().is_ok());

        config.thresholds.sell_fraction = 0.0;
        assert!(config.validate().is_err());
        config.thresholds.sell_fraction = 0.5;

        config.thresholds.profit_multiplier_max = 1.0;
        assert!(config.validate().is_err());
        config.thresholds.profit_multiplier_max = 3.0;

        config.trading.slippage_pct = 101.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
