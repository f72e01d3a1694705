//! Keyless EVM wallet core.
//!
//! Builds Legacy, EIP-2930 and EIP-1559 transactions, has a remote signer sign
//! them, and keeps per (account, chain) nonce hints and history. Encoding and
//! assembly live in [`chain_eth`]; this crate owns the I/O.

pub mod cache;
pub mod config;
pub mod error;
pub mod network;
pub mod provider;
pub mod signer;
pub mod types;
pub mod wallet;

pub use chain_eth;

pub use cache::{AccountCache, ChainAccountRecord, HistoryEntry};
pub use config::{SignerProtocol, WalletConfig};
pub use error::{ProviderError, SignerError, WalletError};
pub use network::NetworkRegistry;
pub use provider::{JsonRpcProvider, NodeProvider};
pub use signer::{HttpSigner, RemoteSigner};
pub use types::TransactionIntent;
pub use wallet::{broadcast, wait_for_receipt, Wallet};
