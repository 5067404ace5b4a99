//! Trade execution: the swap-execute-confirm protocol
//!
//! Every trade walks the same state machine:
//! quoted -> signed -> submitted -> confirmed. A failure at any step
//! aborts the trade with no position change; funds only move once the
//! router accepts the signed transaction, and the position store is only
//! touched after on-chain confirmation.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{error, info};

use crate::analyzer::TokenSnapshot;
use crate::chain::{ChainClient, TxStatus};
use crate::config::TradingConfig;
use crate::error::{Error, Result};
use crate::gmgn::GmgnClient;
use crate::position::{Position, PositionStore};
use crate::wallet::Wallet;

/// Result of a confirmed buy
#[derive(Debug, Clone)]
pub struct BuyFill {
    pub tx_hash: String,
    /// Effective price paid, SOL per token
    pub price_sol: f64,
    /// Tokens received, human units
    pub quantity: f64,
}

/// Result of a confirmed sell
#[derive(Debug, Clone)]
pub struct SellFill {
    pub tx_hash: String,
    /// SOL received
    pub proceeds_sol: f64,
}

struct SwapOutcome {
    tx_hash: String,
    out_amount: u64,
}

/// Executes swaps through the GMGN router
pub struct Trader {
    gmgn: Arc<GmgnClient>,
    chain: Arc<ChainClient>,
    wallet: Arc<Wallet>,
    store: Arc<PositionStore>,
    config: TradingConfig,
}

impl Trader {
    pub fn new(
        gmgn: Arc<GmgnClient>,
        chain: Arc<ChainClient>,
        wallet: Arc<Wallet>,
        store: Arc<PositionStore>,
        config: TradingConfig,
    ) -> Self {
        Self {
            gmgn,
            chain,
            wallet,
            store,
            config,
        }
    }

    /// Buy the configured SOL amount of a token. On confirmation the
    /// position is recorded with its effective price and quantity.
    pub async fn execute_buy(&self, snapshot: &TokenSnapshot) -> Result<BuyFill> {
        let lamports = (self.config.buy_amount_sol * LAMPORTS_PER_SOL as f64) as u64;

        let outcome = self
            .execute_swap(&self.config.sol_mint, &snapshot.address, lamports)
            .await?;

        // A confirmed swap that reports zero output is an anomaly, not a
        // fill; the position store stays untouched.
        let (price_sol, quantity) =
            buy_fill(self.config.buy_amount_sol, outcome.out_amount, snapshot.decimals)
                .ok_or_else(|| Error::ZeroOutput(snapshot.name.clone()))?;

        let position = Position::from_fill(snapshot, price_sol, quantity);
        if let Err(e) = self.store.upsert(position).await {
            // The trade is confirmed on-chain; a persistence failure is
            // logged but does not undo it
            error!("Failed to persist position for {}: {}", snapshot.address, e);
        }

        info!(
            "Bought {:.4} {} at {:.6} SOL/token ({})",
            quantity, snapshot.name, price_sol, outcome.tx_hash
        );

        Ok(BuyFill {
            tx_hash: outcome.tx_hash,
            price_sol,
            quantity,
        })
    }

    /// Sell a quantity of a held token back to SOL. Bookkeeping of the
    /// remaining quantity is the caller's job; this only reports the
    /// proceeds.
    pub async fn execute_sell(&self, position: &Position, quantity: f64) -> Result<SellFill> {
        let units = token_units(quantity, position.decimals);

        let outcome = self
            .execute_swap(&position.address, &self.config.sol_mint, units)
            .await?;

        let proceeds_sol = outcome.out_amount as f64 / LAMPORTS_PER_SOL as f64;
        info!(
            "Sold {:.4} {} for {:.4} SOL ({})",
            quantity, position.name, proceeds_sol, outcome.tx_hash
        );

        Ok(SellFill {
            tx_hash: outcome.tx_hash,
            proceeds_sol,
        })
    }

    /// Quote a token -> SOL route without executing it. Used to probe a
    /// held position's current price. Returns the estimated SOL output in
    /// lamports, or `None` when the router has no route.
    pub async fn quote(&self, token: &str, units: u64) -> Result<Option<u64>> {
        let route = self
            .gmgn
            .get_swap_route(
                token,
                &self.config.sol_mint,
                units,
                &self.wallet.address(),
                self.config.slippage_pct,
            )
            .await?;

        Ok(route.data.map(|d| d.out_amount))
    }

    /// Quoted -> Signed -> Submitted -> Confirmed
    async fn execute_swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount: u64,
    ) -> Result<SwapOutcome> {
        // Quoted
        let route = self
            .gmgn
            .get_swap_route(
                token_in,
                token_out,
                amount,
                &self.wallet.address(),
                self.config.slippage_pct,
            )
            .await?;

        let data = route
            .data
            .ok_or_else(|| Error::SwapRoute("response carried no route data".to_string()))?;
        let raw_tx = data
            .raw_tx
            .ok_or_else(|| Error::SwapRoute("route missing raw transaction".to_string()))?;

        // Signed
        let signed_tx = self.sign_transaction(&raw_tx.swap_transaction)?;

        // Submitted
        let tx_hash = self
            .gmgn
            .submit_signed_transaction(&signed_tx)
            .await?
            .ok_or_else(|| Error::TransactionSend("no hash in submit response".to_string()))?;

        // Confirmed
        self.await_confirmation(&tx_hash).await?;

        Ok(SwapOutcome {
            tx_hash,
            out_amount: data.out_amount,
        })
    }

    /// Decode the router's unsigned transaction, sign it with the wallet
    /// and re-encode it for submission
    fn sign_transaction(&self, raw_b64: &str) -> Result<String> {
        let bytes = BASE64
            .decode(raw_b64)
            .map_err(|e| Error::TransactionSign(format!("bad base64: {}", e)))?;

        let unsigned: VersionedTransaction = bincode::deserialize(&bytes)
            .map_err(|e| Error::TransactionSign(format!("undecodable transaction: {}", e)))?;

        let signed = VersionedTransaction::try_new(unsigned.message, &[self.wallet.keypair()])
            .map_err(|e| Error::TransactionSign(e.to_string()))?;

        let serialized = bincode::serialize(&signed)
            .map_err(|e| Error::TransactionSign(format!("serialize failed: {}", e)))?;

        Ok(BASE64.encode(serialized))
    }

    async fn await_confirmation(&self, tx_hash: &str) -> Result<()> {
        for attempt in 1..=self.config.confirm_attempts {
            match self.chain.transaction_status(tx_hash).await? {
                TxStatus::Confirmed => return Ok(()),
                TxStatus::Failed(reason) => {
                    return Err(Error::Confirmation(format!(
                        "{} failed on-chain: {}",
                        tx_hash, reason
                    )));
                }
                TxStatus::Pending => {
                    if attempt < self.config.confirm_attempts {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            self.config.confirm_poll_ms,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(Error::Confirmation(format!(
            "{} not finalized after {} polls",
            tx_hash, self.config.confirm_attempts
        )))
    }
}

/// Effective price and human-unit quantity for a confirmed buy.
/// Returns `None` for a zero output amount.
pub fn buy_fill(amount_sol: f64, out_amount: u64, decimals: u8) -> Option<(f64, f64)> {
    if out_amount == 0 {
        return None;
    }
    let quantity = out_amount as f64 / 10f64.powi(decimals as i32);
    Some((amount_sol / quantity, quantity))
}

/// Convert a human-unit token quantity to raw ledger units
pub fn token_units(quantity: f64, decimals: u8) -> u64 {
    (quantity * 10f64.powi(decimals as i32)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_fill_math() {
        // 1 SOL buys 500 tokens at 6 decimals
        let (price, quantity) = buy_fill(1.0, 500_000_000, 6).unwrap();
        assert_eq!(quantity, 500.0);
        assert!((price - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_buy_fill_zero_output_is_no_fill() {
        assert!(buy_fill(1.0, 0, 6).is_none());
    }

    #[test]
    fn test_buy_fill_respects_decimals() {
        let (price_6, qty_6) = buy_fill(1.0, 1_000_000, 6).unwrap();
        let (price_9, qty_9) = buy_fill(1.0, 1_000_000, 9).unwrap();
        assert_eq!(qty_6, 1.0);
        assert_eq!(qty_9, 0.001);
        assert!(price_9 > price_6);
    }

    #[test]
    fn test_token_units_conversion() {
        assert_eq!(token_units(0.001, 6), 1_000);
        assert_eq!(token_units(500.0, 6), 500_000_000);
        assert_eq!(token_units(1.0, 9), 1_000_000_000);
        assert_eq!(token_units(0.0, 6), 0);
    }
}
