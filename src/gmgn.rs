//! GMGN API client for token discovery, analytics and swap routing
//!
//! All endpoints live under one host: discovery and swap routing on the
//! router path, analytics and trends on the analytics path. Payloads are
//! validated on arrival; a malformed body is logged and surfaced as an
//! empty result, never retried.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::cache::TtlCache;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// A token as returned by the discovery endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct NewToken {
    pub address: String,
    #[serde(default = "default_token_name")]
    pub name: String,
}

fn default_token_name() -> String {
    "Unknown".to_string()
}

/// Per-token analytics snapshot. All fields are required; a response
/// missing any of them is treated as absent data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAnalytics {
    pub volume_24h: f64,
    pub liquidity: f64,
    pub tx_count_24h: u64,
    pub sniper_activity: f64,
    pub insider_trades: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct TrendData {
    #[serde(default)]
    trending_tokens: Vec<TrendingToken>,
}

#[derive(Debug, Clone, Deserialize)]
struct TrendingToken {
    address: String,
    #[serde(default)]
    trend_score: f64,
}

/// Swap route quote response
#[derive(Debug, Clone, Deserialize)]
pub struct SwapRouteResponse {
    pub data: Option<SwapRouteData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapRouteData {
    pub raw_tx: Option<RawTransaction>,
    /// Estimated output in the destination token's smallest units
    #[serde(default)]
    pub out_amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "swapTransaction")]
    pub swap_transaction: String,
}

#[derive(Debug, Clone, Serialize)]
struct SubmitRequest<'a> {
    signed_tx: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmitResponse {
    data: Option<SubmitData>,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmitData {
    hash: Option<String>,
}

/// GMGN API client
pub struct GmgnClient {
    http: reqwest::Client,
    host: String,
    cache: Arc<TtlCache>,
    retry: RetryPolicy,
}

impl GmgnClient {
    pub fn new(config: &ApiConfig, cache: Arc<TtlCache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            host: config.gmgn_host.trim_end_matches('/').to_string(),
            cache,
            retry: RetryPolicy::default(),
        })
    }

    /// Fetch the current candidate token list
    pub async fn fetch_new_tokens(&self) -> Result<Vec<NewToken>> {
        let url = format!("{}/defi/router/v1/sol/tokens", self.host);
        let body = self.get_with_retry("discovery", &url).await?;

        match serde_json::from_str::<Vec<NewToken>>(&body) {
            Ok(tokens) => {
                debug!(count = tokens.len(), "discovered candidate tokens");
                Ok(tokens)
            }
            Err(e) => {
                error!("Invalid discovery payload: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// Fetch analytics for one token, served from cache while fresh.
    /// Returns `None` when the payload fails validation.
    pub async fn fetch_token_analytics(&self, address: &str) -> Result<Option<TokenAnalytics>> {
        let cache_key = format!("analytics_{}", address);
        if let Some(cached) = self.cache.get::<TokenAnalytics>(&cache_key).await {
            return Ok(Some(cached));
        }

        let url = format!("{}/defi/analytics/v1/sol/token/{}", self.host, address);
        let body = self.get_with_retry("analytics", &url).await?;

        match serde_json::from_str::<TokenAnalytics>(&body) {
            Ok(analytics) => {
                self.cache.set(&cache_key, &analytics).await;
                Ok(Some(analytics))
            }
            Err(e) => {
                error!("Invalid analytics data for {}: {}", address, e);
                Ok(None)
            }
        }
    }

    /// Fetch global trend scores as an address → score map, cached under a
    /// single key. A malformed payload yields an empty map.
    pub async fn fetch_market_trends(&self) -> Result<HashMap<String, f64>> {
        if let Some(cached) = self.cache.get::<HashMap<String, f64>>("trends").await {
            return Ok(cached);
        }

        let url = format!("{}/defi/analytics/v1/sol/trends", self.host);
        let body = self.get_with_retry("trends", &url).await?;

        match serde_json::from_str::<TrendData>(&body) {
            Ok(data) => {
                let scores: HashMap<String, f64> = data
                    .trending_tokens
                    .into_iter()
                    .map(|t| (t.address, t.trend_score))
                    .collect();
                self.cache.set("trends", &scores).await;
                Ok(scores)
            }
            Err(e) => {
                error!("Invalid trends data: {}", e);
                Ok(HashMap::new())
            }
        }
    }

    /// Request a swap route quote. `amount` is in the input token's
    /// smallest units.
    pub async fn get_swap_route(
        &self,
        token_in: &str,
        token_out: &str,
        amount: u64,
        from_address: &str,
        slippage_pct: f64,
    ) -> Result<SwapRouteResponse> {
        let url = format!("{}/defi/router/v1/sol/tx/get_swap_route", self.host);
        let amount = amount.to_string();
        let slippage = slippage_pct.to_string();
        let query = [
            ("token_in_address", token_in),
            ("token_out_address", token_out),
            ("in_amount", amount.as_str()),
            ("from_address", from_address),
            ("slippage", slippage.as_str()),
        ];

        let body = self
            .retry
            .run("swap_route", || async {
                let resp = self.http.get(&url).query(&query).send().await?;
                Self::check_status(&url, &resp)?;
                Ok(resp.text().await?)
            })
            .await?;

        serde_json::from_str::<SwapRouteResponse>(&body).map_err(|e| Error::InvalidPayload {
            service: "swap_route".to_string(),
            reason: e.to_string(),
        })
    }

    /// Submit a signed transaction, returning its hash if the router
    /// accepted it.
    pub async fn submit_signed_transaction(&self, signed_tx: &str) -> Result<Option<String>> {
        let url = format!("{}/defi/router/v1/sol/tx/submit_signed_transaction", self.host);

        let body = self
            .retry
            .run("submit_tx", || async {
                let resp = self
                    .http
                    .post(&url)
                    .json(&SubmitRequest { signed_tx })
                    .send()
                    .await?;
                Self::check_status(&url, &resp)?;
                Ok(resp.text().await?)
            })
            .await?;

        let parsed: SubmitResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidPayload {
                service: "submit_tx".to_string(),
                reason: e.to_string(),
            })?;

        let hash = parsed.data.and_then(|d| d.hash);
        if let Some(ref h) = hash {
            info!("Transaction submitted: {}", h);
        }
        Ok(hash)
    }

    async fn get_with_retry(&self, what: &'static str, url: &str) -> Result<String> {
        self.retry
            .run(what, || async {
                let resp = self.http.get(url).send().await?;
                Self::check_status(url, &resp)?;
                Ok(resp.text().await?)
            })
            .await
    }

    fn check_status(url: &str, resp: &reqwest::Response) -> Result<()> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::HttpStatus {
                code: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}
