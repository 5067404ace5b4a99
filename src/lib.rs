//! GMGN Sniper Library
//!
//! Autonomous Solana meme-token trading agent: discovers fresh listings,
//! scores them for scam risk, gates entries on an external reputation
//! check and trades through the GMGN swap router.

pub mod analyzer;
pub mod cache;
pub mod chain;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gmgn;
pub mod position;
pub mod retry;
pub mod rugcheck;
pub mod trader;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
