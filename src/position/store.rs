//! Durable position store
//!
//! One record per token address, upserted on every successful buy and
//! updated in place on sells. A fully sold position keeps its row with
//! quantity zero for audit history. The whole map is persisted to a JSON
//! file after each mutation and reloaded at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::analyzer::TokenSnapshot;
use crate::error::{Error, Result};

/// Persisted ownership record for one token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Token mint address (unique key)
    pub address: String,
    pub name: String,
    // Last-known analytics at buy time, kept for audit
    pub volume_24h: f64,
    pub liquidity: f64,
    pub tx_count_24h: u64,
    pub trend_score: f64,
    pub scam_risk: f64,
    /// Average buy price in SOL per token
    pub cost_basis_sol: f64,
    /// Quantity held in human units; zero after a full sell
    pub quantity: f64,
    pub decimals: u8,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Position {
    /// Build a position from a scored snapshot and a confirmed fill
    pub fn from_fill(snapshot: &TokenSnapshot, cost_basis_sol: f64, quantity: f64) -> Self {
        Self {
            address: snapshot.address.clone(),
            name: snapshot.name.clone(),
            volume_24h: snapshot.volume_24h,
            liquidity: snapshot.liquidity,
            tx_count_24h: snapshot.tx_count_24h,
            trend_score: snapshot.trend_score,
            scam_risk: snapshot.scam_risk,
            cost_basis_sol,
            quantity,
            decimals: snapshot.decimals,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// JSON-file backed store, keyed by token address
pub struct PositionStore {
    path: PathBuf,
    positions: RwLock<HashMap<String, Position>>,
}

impl PositionStore {
    /// Open the store, loading existing records if the file is present
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let positions = if path.exists() {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::PositionPersistence(e.to_string()))?;
            let map: HashMap<String, Position> = serde_json::from_str(&data)
                .map_err(|e| Error::PositionPersistence(e.to_string()))?;
            info!("Loaded {} positions from {}", map.len(), path.display());
            map
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            positions: RwLock::new(positions),
        })
    }

    /// Insert or overwrite the record for a token address
    pub async fn upsert(&self, position: Position) -> Result<()> {
        let address = position.address.clone();
        {
            let mut positions = self.positions.write().await;
            positions.insert(address.clone(), position);
        }
        debug!("Upserted position for {}", address);
        self.save().await
    }

    /// Set the held quantity for a token. The record stays in the store
    /// even at zero.
    pub async fn set_quantity(&self, address: &str, quantity: f64) -> Result<()> {
        {
            let mut positions = self.positions.write().await;
            let position = positions.get_mut(address).ok_or_else(|| {
                Error::PositionPersistence(format!("no position for {}", address))
            })?;
            position.quantity = quantity;
            position.updated_at = chrono::Utc::now();
        }
        self.save().await
    }

    pub async fn get(&self, address: &str) -> Option<Position> {
        self.positions.read().await.get(address).cloned()
    }

    /// All positions currently held (quantity > 0)
    pub async fn held(&self) -> Vec<Position> {
        self.positions
            .read()
            .await
            .values()
            .filter(|p| p.quantity > 0.0)
            .cloned()
            .collect()
    }

    /// Every record, sold-out rows included
    pub async fn all(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.positions.read().await.len()
    }

    async fn save(&self) -> Result<()> {
        let positions = self.positions.read().await;
        let data = serde_json::to_string_pretty(&*positions)
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;

        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| Error::PositionPersistence(e.to_string()))?;

        debug!("Saved {} positions to {}", positions.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> TokenSnapshot {
        TokenSnapshot {
            address: "Mint111".to_string(),
            name: "Test Token".to_string(),
            volume_24h: 5000.0,
            liquidity: 1000.0,
            tx_count_24h: 200,
            sniper_activity: 10.0,
            insider_trades: 0,
            trend_score: 0.8,
            scam_risk: 0.0,
            decimals: 6,
        }
    }

    async fn temp_store() -> (tempfile::TempDir, PositionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("positions.json"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.json");

        {
            let store = PositionStore::open(&path).await.unwrap();
            store
                .upsert(Position::from_fill(&snapshot(), 0.002, 500.0))
                .await
                .unwrap();
        }

        let reloaded = PositionStore::open(&path).await.unwrap();
        let position = reloaded.get("Mint111").await.unwrap();
        assert_eq!(position.quantity, 500.0);
        assert_eq!(position.cost_basis_sol, 0.002);
        assert_eq!(position.decimals, 6);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_existing_row() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(Position::from_fill(&snapshot(), 0.002, 500.0))
            .await
            .unwrap();
        store
            .upsert(Position::from_fill(&snapshot(), 0.004, 250.0))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let position = store.get("Mint111").await.unwrap();
        assert_eq!(position.cost_basis_sol, 0.004);
        assert_eq!(position.quantity, 250.0);
    }

    #[tokio::test]
    async fn test_zero_quantity_row_is_kept() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(Position::from_fill(&snapshot(), 0.002, 500.0))
            .await
            .unwrap();
        store.set_quantity("Mint111", 0.0).await.unwrap();

        // Row survives for audit, but is no longer held
        assert_eq!(store.len().await, 1);
        assert!(store.held().await.is_empty());
        assert_eq!(store.get("Mint111").await.unwrap().quantity, 0.0);
    }

    #[tokio::test]
    async fn test_rebuy_after_full_sell_overwrites_row() {
        let (_dir, store) = temp_store().await;

        store
            .upsert(Position::from_fill(&snapshot(), 0.002, 500.0))
            .await
            .unwrap();
        store.set_quantity("Mint111", 0.0).await.unwrap();

        // A sold-out token stays eligible; a later buy replaces the row
        store
            .upsert(Position::from_fill(&snapshot(), 0.003, 300.0))
            .await
            .unwrap();

        let position = store.get("Mint111").await.unwrap();
        assert_eq!(position.quantity, 300.0);
        assert_eq!(position.cost_basis_sol, 0.003);
        assert_eq!(store.held().await.len(), 1);
    }

    #[tokio::test]
    async fn test_held_filters_sold_out_positions() {
        let (_dir, store) = temp_store().await;

        let mut other = snapshot();
        other.address = "Mint222".to_string();

        store
            .upsert(Position::from_fill(&snapshot(), 0.002, 500.0))
            .await
            .unwrap();
        store
            .upsert(Position::from_fill(&other, 0.001, 100.0))
            .await
            .unwrap();
        store.set_quantity("Mint222", 0.0).await.unwrap();

        let held = store.held().await;
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].address, "Mint111");
    }

    #[tokio::test]
    async fn test_set_quantity_on_unknown_address_fails() {
        let (_dir, store) = temp_store().await;
        assert!(store.set_quantity("Nope", 1.0).await.is_err());
    }
}
