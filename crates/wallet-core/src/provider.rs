//! Read and broadcast access to an Ethereum node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProviderError, WalletError};

/// Fields needed to estimate gas for a transaction before it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    /// `true` when execution succeeded.
    pub status: bool,
}

/// The node operations the wallet depends on.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Pending transaction count, i.e. the next usable nonce.
    async fn transaction_count(&self, address: Address) -> Result<u64, ProviderError>;

    async fn gas_price(&self) -> Result<u128, ProviderError>;

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError>;

    /// Submits signed envelope bytes and returns the hash the node reports.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ProviderError>;

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: B256,
    block_number: String,
    gas_used: String,
    #[serde(default)]
    status: Option<String>,
}

/// [`NodeProvider`] over JSON-RPC 2.0 on HTTP.
pub struct JsonRpcProvider {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    /// Connects to the preferred endpoint of a catalog network.
    pub fn for_network(
        network: &chain_eth::chains::NetworkDescriptor,
        timeout: Duration,
    ) -> Result<Self, WalletError> {
        let endpoint = network.rpc_url().ok_or_else(|| {
            WalletError::Config(format!("{} has no RPC endpoint", network.name))
        })?;
        let url = Url::parse(endpoint)
            .map_err(|e| WalletError::Config(format!("invalid RPC url {endpoint}: {e}")))?;
        Self::new(url, timeout)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("RPC request: method={}, id={}", method, id);

        let response = self
            .http
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let reply: RpcResponse = serde_json::from_str(&text).map_err(|e| {
            if status.is_success() {
                ProviderError::InvalidResponse(format!("{method}: {e}"))
            } else {
                ProviderError::Transport(format!("{method}: HTTP {status}"))
            }
        })?;
        decode_response(method, reply)
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, reply: RpcResponse) -> Result<T, ProviderError> {
    if let Some(err) = reply.error {
        warn!("RPC error: method={}, code={}, message={}", method, err.code, err.message);
        return Err(ProviderError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    serde_json::from_value(reply.result.unwrap_or(Value::Null))
        .map_err(|e| ProviderError::InvalidResponse(format!("{method}: {e}")))
}

#[async_trait]
impl NodeProvider for JsonRpcProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let hex: String = self.request("eth_chainId", json!([])).await?;
        parse_hex_u64(&hex)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, ProviderError> {
        let hex: String = self
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn gas_price(&self) -> Result<u128, ProviderError> {
        let hex: String = self.request("eth_gasPrice", json!([])).await?;
        parse_hex_u128(&hex)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError> {
        let hex: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_hex_u128(&hex)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ProviderError> {
        let hex: String = self
            .request("eth_estimateGas", json!([call_object(request)]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ProviderError> {
        self.request(
            "eth_sendRawTransaction",
            json!([format!("0x{}", hex::encode(raw))]),
        )
        .await
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        raw.map(convert_receipt).transpose()
    }
}

fn call_object(request: &CallRequest) -> Value {
    let mut call = json!({
        "from": request.from,
        "value": format!("{:#x}", request.value),
        "data": format!("0x{}", hex::encode(&request.data)),
    });
    if let Some(to) = request.to {
        call["to"] = json!(to);
    }
    call
}

fn convert_receipt(raw: RawReceipt) -> Result<TransactionReceipt, ProviderError> {
    Ok(TransactionReceipt {
        transaction_hash: raw.transaction_hash,
        block_number: parse_hex_u64(&raw.block_number)?,
        gas_used: parse_hex_u64(&raw.gas_used)?,
        // Pre-Byzantium receipts carry no status; treat them as successful.
        status: match raw.status.as_deref() {
            Some(s) => parse_hex_u64(s)? == 1,
            None => true,
        },
    })
}

pub(crate) fn parse_hex_u64(input: &str) -> Result<u64, ProviderError> {
    let digits = strip_quantity_prefix(input)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad quantity {input:?}: {e}")))
}

pub(crate) fn parse_hex_u128(input: &str) -> Result<u128, ProviderError> {
    let digits = strip_quantity_prefix(input)?;
    u128::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidResponse(format!("bad quantity {input:?}: {e}")))
}

fn strip_quantity_prefix(input: &str) -> Result<&str, ProviderError> {
    input
        .strip_prefix("0x")
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse(format!("bad quantity {input:?}")))
}
