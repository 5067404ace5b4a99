//! RugCheck reputation client
//!
//! Holds the session credential for the RugCheck API. The bearer token is
//! obtained lazily by signing the sign-in challenge with the trading
//! wallet, and refreshed only when a request using it is rejected. It is
//! never proactively expired.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::wallet::Wallet;

/// Challenge message RugCheck expects to be signed by the wallet
const SIGN_IN_MESSAGE: &str = "Sign-in to Rugcheck.xyz";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    wallet: &'a str,
    message: &'a str,
    signature: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenStatusResponse {
    #[serde(default)]
    status: Option<String>,
}

/// Session against the RugCheck API, owned by the scheduler wiring
pub struct RugcheckSession {
    http: reqwest::Client,
    api_base: String,
    wallet: Arc<Wallet>,
    token: Mutex<Option<String>>,
    retry: RetryPolicy,
}

impl RugcheckSession {
    pub fn new(config: &ApiConfig, wallet: Arc<Wallet>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.rugcheck_api_base.trim_end_matches('/').to_string(),
            wallet,
            token: Mutex::new(None),
            retry: RetryPolicy::default(),
        })
    }

    /// Return the current bearer token, logging in first if none exists.
    /// Idempotent: a valid cached token is returned as-is.
    pub async fn ensure_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let token = self.login().await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Check a token's reputation. `true` means the service reports
    /// status GOOD; anything else disqualifies the token.
    pub async fn check_token(&self, address: &str) -> Result<bool> {
        let token = self.ensure_token().await?;

        match self.fetch_status(address, &token).await {
            Ok(status) => Ok(is_good(&status)),
            Err(Error::HttpStatus { code: 401, .. }) => {
                // Credential went stale; refresh once and retry the check
                warn!("RugCheck credential rejected, refreshing");
                self.invalidate_token().await;
                let token = self.ensure_token().await?;
                let status = self.fetch_status(address, &token).await?;
                Ok(is_good(&status))
            }
            Err(e) => Err(e),
        }
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_status(&self, address: &str, bearer: &str) -> Result<String> {
        let url = format!("{}/v1/tokens/{}", self.api_base, address);

        let body = self
            .retry
            .run("rugcheck_status", || async {
                let resp = self
                    .http
                    .get(&url)
                    .bearer_auth(bearer)
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(Error::HttpStatus {
                        code: status.as_u16(),
                        url: url.clone(),
                    });
                }
                Ok(resp.text().await?)
            })
            .await?;

        let parsed: TokenStatusResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidPayload {
                service: "rugcheck".to_string(),
                reason: e.to_string(),
            })?;

        Ok(parsed.status.unwrap_or_else(|| "UNKNOWN".to_string()))
    }

    /// Obtain a fresh bearer token by signing the challenge message
    async fn login(&self) -> Result<String> {
        let signature = self.wallet.sign_message_base64(SIGN_IN_MESSAGE.as_bytes());
        let address = self.wallet.address();
        let url = format!("{}/v1/auth/login/solana", self.api_base);

        let body = self
            .retry
            .run("rugcheck_login", || async {
                let resp = self
                    .http
                    .post(&url)
                    .json(&LoginRequest {
                        wallet: &address,
                        message: SIGN_IN_MESSAGE,
                        signature: &signature,
                    })
                    .send()
                    .await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(Error::HttpStatus {
                        code: status.as_u16(),
                        url: url.clone(),
                    });
                }
                Ok(resp.text().await?)
            })
            .await?;

        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| Error::InvalidPayload {
                service: "rugcheck".to_string(),
                reason: e.to_string(),
            })?;

        if parsed.token.is_empty() {
            return Err(Error::ReputationAuth(
                "login response contained no token".to_string(),
            ));
        }

        info!("Obtained RugCheck API token");
        Ok(parsed.token)
    }
}

/// Status comparison is case-insensitive; RugCheck has returned both
/// "GOOD" and "Good" over time.
fn is_good(status: &str) -> bool {
    status.eq_ignore_ascii_case("GOOD")
}
