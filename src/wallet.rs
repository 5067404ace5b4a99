//! Wallet keypair handling
//!
//! The wallet is loaded once at startup from a base58-encoded private key.
//! It signs swap transactions and the RugCheck sign-in challenge.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use crate::error::{Error, Result};

/// The trading wallet
pub struct Wallet {
    keypair: Keypair,
}

impl Wallet {
    /// Build a wallet from a base58-encoded private key
    pub fn from_base58(private_key: &str) -> Result<Self> {
        let bytes = bs58::decode(private_key.trim())
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("not valid base58: {}", e)))?;

        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| Error::InvalidKeypair(format!("not a valid keypair: {}", e)))?;

        Ok(Self { keypair })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Wallet address as a base58 string
    pub fn address(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Sign an arbitrary message and return the signature base64-encoded
    pub fn sign_message_base64(&self, message: &[u8]) -> String {
        let signature = self.keypair.sign_message(message);
        BASE64.encode(signature.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_base58_round_trip() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();

        let wallet = Wallet::from_base58(&encoded).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        assert!(Wallet::from_base58("not-base58-0OIl").is_err());
        assert!(Wallet::from_base58("abc").is_err());
    }

    #[test]
    fn test_sign_message_is_verifiable() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        let wallet = Wallet::from_base58(&encoded).unwrap();

        let message = b"Sign-in to Rugcheck.xyz";
        let sig_b64 = wallet.sign_message_base64(message);
        let sig_bytes = base64::engine::general_purpose::STANDARD
            .decode(sig_b64)
            .unwrap();
        let signature = solana_sdk::signature::Signature::try_from(sig_bytes.as_slice()).unwrap();

        assert!(signature.verify(wallet.pubkey().as_ref(), message));
    }
}
