//! Wallet configuration, passed explicitly at construction.

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::WalletError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the remote signer reports its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerProtocol {
    /// The signer returns the complete encoded signed transaction.
    SignedTransaction,
    /// The signer returns `(r, s, recovery_id)` only.
    RawSignature,
}

#[derive(Debug, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the signing service.
    pub endpoint: Url,
    /// Key identity the signer signs with.
    pub identity: String,
    pub protocol: SignerProtocol,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sent as a bearer token. Never logged.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub auth_token: Option<SecretString>,
    /// Hex SEC1 public key of `identity`. When set, it is used instead of
    /// asking the signer.
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// Chain selected at startup; unknown ids fall back to the default network.
    #[serde(default)]
    pub default_chain_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WalletConfig {
    pub signer: SignerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl WalletConfig {
    pub fn from_json_str(json: &str) -> Result<Self, WalletError> {
        let config: WalletConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<(), WalletError> {
        let signer = &self.signer;
        if !matches!(signer.endpoint.scheme(), "http" | "https") {
            return Err(WalletError::Config(format!(
                "signer endpoint must be http(s), got {}",
                signer.endpoint.scheme()
            )));
        }
        if signer.identity.trim().is_empty() {
            return Err(WalletError::Config("signer identity is empty".into()));
        }
        if signer.timeout_secs == 0 {
            return Err(WalletError::Config("signer timeout must be positive".into()));
        }
        if let Some(key) = &signer.public_key {
            let bytes = decode_public_key(key)?;
            chain_eth::address::pubkey_to_address(&bytes)?;
        }
        Ok(())
    }
}

/// Decodes a hex public key with or without the `0x` prefix.
pub(crate) fn decode_public_key(input: &str) -> Result<Vec<u8>, WalletError> {
    let hex_str = input.strip_prefix("0x").unwrap_or(input);
    hex::decode(hex_str).map_err(|e| WalletError::Config(format!("invalid public key hex: {e}")))
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
