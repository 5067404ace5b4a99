//! Error types for the trading agent

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the trading agent
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    // HTTP transport errors (retryable)
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP timeout: {0}")]
    HttpTimeout(String),

    #[error("HTTP status {code} from {url}")]
    HttpStatus { code: u16, url: String },

    // Payload validation errors (never retried)
    #[error("Invalid payload from {service}: {reason}")]
    InvalidPayload { service: String, reason: String },

    // Reputation service errors
    #[error("Reputation auth failed: {0}")]
    ReputationAuth(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    // Trading errors
    #[error("Swap route unavailable: {0}")]
    SwapRoute(String),

    #[error("Transaction sign failed: {0}")]
    TransactionSign(String),

    #[error("Transaction send failed: {0}")]
    TransactionSend(String),

    #[error("Transaction not confirmed: {0}")]
    Confirmation(String),

    #[error("Swap returned zero output for {0}")]
    ZeroOutput(String),

    // Position persistence errors
    #[error("Position persistence failed: {0}")]
    PositionPersistence(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    ///
    /// Only transport-level failures qualify: connection errors, timeouts
    /// and server-side (5xx) statuses. Validation and trade-protocol
    /// failures are terminal for the call that produced them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::HttpTimeout(_) | Error::Rpc(_) => true,
            Error::HttpStatus { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::HttpTimeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(Error::Http("connection reset".into()).is_retryable());
        assert!(Error::HttpTimeout("deadline elapsed".into()).is_retryable());
        assert!(Error::Rpc("node behind".into()).is_retryable());
        assert!(Error::HttpStatus {
            code: 503,
            url: "https://gmgn.ai".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!Error::HttpStatus {
            code: 404,
            url: "https://gmgn.ai".into()
        }
        .is_retryable());
        assert!(!Error::InvalidPayload {
            service: "analytics".into(),
            reason: "missing field".into()
        }
        .is_retryable());
        assert!(!Error::ZeroOutput("mint".into()).is_retryable());
        assert!(!Error::Config("bad".into()).is_retryable());
    }
}
