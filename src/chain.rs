//! Solana RPC access: transaction finalization and token metadata

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::UiTransactionEncoding;
use spl_token::state::Mint;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Decimals assumed when the mint account cannot be read
pub const DEFAULT_DECIMALS: u8 = 6;

/// Read-only chain client
pub struct ChainClient {
    rpc: RpcClient,
    retry: RetryPolicy,
    /// Decimals are fetched once per token and held for the session
    decimals: Mutex<HashMap<String, u8>>,
}

impl ChainClient {
    pub fn new(config: &RpcConfig) -> Self {
        let rpc = RpcClient::new_with_timeout(
            config.endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
        );
        Self {
            rpc,
            retry: RetryPolicy::default(),
            decimals: Mutex::new(HashMap::new()),
        }
    }

    /// Decimal precision of a token mint, falling back to
    /// [`DEFAULT_DECIMALS`] when the account cannot be read or parsed.
    pub async fn token_decimals(&self, address: &str) -> u8 {
        if let Some(d) = self.decimals.lock().await.get(address) {
            return *d;
        }

        match self.fetch_decimals(address).await {
            Ok(d) => {
                self.decimals.lock().await.insert(address.to_string(), d);
                d
            }
            Err(e) => {
                error!("Error fetching decimals for {}: {}", address, e);
                DEFAULT_DECIMALS
            }
        }
    }

    async fn fetch_decimals(&self, address: &str) -> Result<u8> {
        let mint = Pubkey::from_str(address)
            .map_err(|e| Error::Rpc(format!("invalid mint address {}: {}", address, e)))?;

        let account = self
            .retry
            .run("get_account", || async {
                Ok(self.rpc.get_account(&mint).await?)
            })
            .await?;

        let mint_state = Mint::unpack(&account.data)
            .map_err(|e| Error::Rpc(format!("mint account {} unpackable: {}", address, e)))?;

        Ok(mint_state.decimals)
    }

    /// Look up a transaction's finalized status. A transaction the node
    /// does not know about yet is `Pending`, not a hard failure; the
    /// executor polls until it lands or the poll budget runs out.
    pub async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let signature = Signature::from_str(tx_hash)
            .map_err(|e| Error::Confirmation(format!("invalid signature {}: {}", tx_hash, e)))?;

        match self
            .rpc
            .get_transaction(&signature, UiTransactionEncoding::Json)
            .await
        {
            Ok(tx) => {
                let err = tx.transaction.meta.as_ref().and_then(|m| m.err.as_ref());
                match err {
                    Some(e) => Ok(TxStatus::Failed(e.to_string())),
                    None => Ok(TxStatus::Confirmed),
                }
            }
            Err(e) => {
                debug!("Transaction {} not yet visible: {}", tx_hash, e);
                Ok(TxStatus::Pending)
            }
        }
    }
}

/// Finalization state of a submitted transaction
#[derive(Debug, Clone, PartialEq)]
pub enum TxStatus {
    /// Not yet visible on-chain
    Pending,
    /// Finalized without an execution error
    Confirmed,
    /// Finalized with an execution error
    Failed(String),
}
