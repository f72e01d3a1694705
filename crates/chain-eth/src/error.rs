use thiserror::Error;

/// Ethereum chain operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EthError {
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Local validation failure; raised before anything leaves the process.
    #[error("invalid transaction field `{field}`: {reason}")]
    InvalidTransactionField { field: &'static str, reason: String },

    #[error("malformed RLP encoding: {0}")]
    MalformedEncoding(String),

    #[error("transaction assembly failed: {0}")]
    AssemblyError(String),

    #[error("signature recovery failed: {0}")]
    RecoveryError(String),

    #[error("unknown chain: {0}")]
    UnknownChain(u64),
}

impl EthError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        EthError::InvalidTransactionField {
            field,
            reason: reason.into(),
        }
    }
}

impl From<alloy_rlp::Error> for EthError {
    fn from(e: alloy_rlp::Error) -> Self {
        EthError::MalformedEncoding(e.to_string())
    }
}
