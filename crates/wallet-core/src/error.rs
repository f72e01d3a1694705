use chain_eth::error::EthError;
use thiserror::Error;

/// Failures of a single round trip to the remote signer.
///
/// None of these are retried automatically. `Indeterminate` in particular means
/// the signer may already have produced a signature; the caller must re-query
/// node state before trying again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signer unreachable: {0}")]
    Unreachable(String),

    #[error("Signer rejected the request: {0}")]
    Rejected(String),

    #[error("Not authorized to sign with this identity")]
    Unauthorized,

    #[error("Signing outcome unknown: {0}")]
    Indeterminate(String),

    #[error("Signer response does not match the configured protocol: {0}")]
    InvalidResponse(String),
}

/// Failures talking to an Ethereum JSON-RPC node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Node transport error: {0}")]
    Transport(String),

    #[error("Node returned RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid node response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("ETH: {0}")]
    Eth(#[from] EthError),

    #[error("Signing failed: {0}")]
    Signer(#[from] SignerError),

    #[error("Node request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider serves chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WalletError {
    /// Whether the same request may simply be issued again.
    ///
    /// Only failures where nothing reached the signer or the node qualify;
    /// an indeterminate signing outcome never does.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            WalletError::Signer(SignerError::Unreachable(_))
                | WalletError::Provider(ProviderError::Transport(_))
        )
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Config(e.to_string())
    }
}
