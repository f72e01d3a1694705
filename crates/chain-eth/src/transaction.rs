use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::EthError;
use crate::rlp::{decode_u128, decode_u256, decode_u64, RlpItem};

/// EIP-2930 access list type byte.
pub const ACCESS_LIST_TX_TYPE: u8 = 0x01;
/// EIP-1559 fee market type byte.
pub const FEE_MARKET_TX_TYPE: u8 = 0x02;

/// The three wire formats this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Legacy,
    AccessList,
    #[default]
    FeeMarket,
}

impl TxType {
    /// Leading envelope byte, `None` for legacy transactions.
    pub fn type_byte(self) -> Option<u8> {
        match self {
            TxType::Legacy => None,
            TxType::AccessList => Some(ACCESS_LIST_TX_TYPE),
            TxType::FeeMarket => Some(FEE_MARKET_TX_TYPE),
        }
    }

    /// Number of fields in the unsigned list, excluding any EIP-155 trailer.
    pub fn unsigned_field_count(self) -> usize {
        match self {
            TxType::Legacy => 6,
            TxType::AccessList => 8,
            TxType::FeeMarket => 9,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            ACCESS_LIST_TX_TYPE => Some(TxType::AccessList),
            FEE_MARKET_TX_TYPE => Some(TxType::FeeMarket),
            _ => None,
        }
    }
}

/// An EIP-2930 access list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// A pre-EIP-2718 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// `None` deploys a contract.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    /// `Some` requests EIP-155 replay protection for that chain.
    pub chain_id: Option<u64>,
}

/// An EIP-2930 (type 1) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
}

/// An EIP-1559 (type 2) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeMarketTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
}

/// An unsigned transaction of any supported type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTransaction {
    Legacy(LegacyTransaction),
    AccessList(AccessListTransaction),
    FeeMarket(FeeMarketTransaction),
}

impl UnsignedTransaction {
    pub fn tx_type(&self) -> TxType {
        match self {
            UnsignedTransaction::Legacy(_) => TxType::Legacy,
            UnsignedTransaction::AccessList(_) => TxType::AccessList,
            UnsignedTransaction::FeeMarket(_) => TxType::FeeMarket,
        }
    }

    /// Chain the transaction is bound to; `None` for unprotected legacy.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.chain_id,
            UnsignedTransaction::AccessList(tx) => Some(tx.chain_id),
            UnsignedTransaction::FeeMarket(tx) => Some(tx.chain_id),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.nonce,
            UnsignedTransaction::AccessList(tx) => tx.nonce,
            UnsignedTransaction::FeeMarket(tx) => tx.nonce,
        }
    }

    pub fn to(&self) -> Option<Address> {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.to,
            UnsignedTransaction::AccessList(tx) => tx.to,
            UnsignedTransaction::FeeMarket(tx) => tx.to,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            UnsignedTransaction::Legacy(tx) => tx.value,
            UnsignedTransaction::AccessList(tx) => tx.value,
            UnsignedTransaction::FeeMarket(tx) => tx.value,
        }
    }

    /// The ordered unsigned field list prescribed by the transaction type.
    ///
    /// For legacy transactions this is the six-field body without the EIP-155
    /// `[chainId, "", ""]` trailer; see [`signing_payload`](Self::signing_payload).
    pub fn fields(&self) -> Vec<RlpItem> {
        match self {
            UnsignedTransaction::Legacy(tx) => vec![
                RlpItem::from_u64(tx.nonce),
                RlpItem::from_u128(tx.gas_price),
                RlpItem::from_u64(tx.gas_limit),
                to_item(tx.to),
                RlpItem::from_u256(tx.value),
                RlpItem::bytes(tx.data.to_vec()),
            ],
            UnsignedTransaction::AccessList(tx) => vec![
                RlpItem::from_u64(tx.chain_id),
                RlpItem::from_u64(tx.nonce),
                RlpItem::from_u128(tx.gas_price),
                RlpItem::from_u64(tx.gas_limit),
                to_item(tx.to),
                RlpItem::from_u256(tx.value),
                RlpItem::bytes(tx.data.to_vec()),
                access_list_item(&tx.access_list),
            ],
            UnsignedTransaction::FeeMarket(tx) => vec![
                RlpItem::from_u64(tx.chain_id),
                RlpItem::from_u64(tx.nonce),
                RlpItem::from_u128(tx.max_priority_fee_per_gas),
                RlpItem::from_u128(tx.max_fee_per_gas),
                RlpItem::from_u64(tx.gas_limit),
                to_item(tx.to),
                RlpItem::from_u256(tx.value),
                RlpItem::bytes(tx.data.to_vec()),
                access_list_item(&tx.access_list),
            ],
        }
    }

    /// The exact bytes the remote signer hashes and signs.
    ///
    /// - legacy: `rlp(fields)` or, with a chain id, `rlp(fields ++ [chainId, "", ""])`
    /// - typed: `type_byte || rlp(fields)`
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut fields = self.fields();
        if let UnsignedTransaction::Legacy(LegacyTransaction {
            chain_id: Some(chain_id),
            ..
        }) = self
        {
            fields.push(RlpItem::from_u64(*chain_id));
            fields.push(RlpItem::empty());
            fields.push(RlpItem::empty());
        }
        with_type_prefix(self.tx_type(), &RlpItem::List(fields))
    }

    /// Parses a signing payload produced by [`signing_payload`](Self::signing_payload).
    pub fn decode(payload: &[u8]) -> Result<Self, EthError> {
        let (tx_type, body) = split_type_prefix(payload)?;
        let item = RlpItem::decode(body)?;
        let fields = item
            .as_list()
            .ok_or_else(|| EthError::MalformedEncoding("transaction body is not a list".into()))?;

        if tx_type != TxType::Legacy {
            return Self::from_fields(tx_type, fields, None);
        }

        match fields.len() {
            6 => Self::from_fields(TxType::Legacy, fields, None),
            9 => {
                let (body, trailer) = fields.split_at(6);
                if trailer[1] != RlpItem::empty() || trailer[2] != RlpItem::empty() {
                    return Err(EthError::MalformedEncoding(
                        "EIP-155 trailer must end with two empty strings".into(),
                    ));
                }
                let chain_id = decode_u64(&trailer[0], "chain_id")?;
                Self::from_fields(TxType::Legacy, body, Some(chain_id))
            }
            n => Err(EthError::MalformedEncoding(format!(
                "legacy payload has {n} fields, expected 6 or 9"
            ))),
        }
    }

    /// Rebuilds a transaction from its unsigned field list.
    pub(crate) fn from_fields(
        tx_type: TxType,
        fields: &[RlpItem],
        legacy_chain_id: Option<u64>,
    ) -> Result<Self, EthError> {
        let expected = tx_type.unsigned_field_count();
        if fields.len() != expected {
            return Err(EthError::MalformedEncoding(format!(
                "{tx_type:?} transaction has {} fields, expected {expected}",
                fields.len()
            )));
        }

        let tx = match tx_type {
            TxType::Legacy => UnsignedTransaction::Legacy(LegacyTransaction {
                nonce: decode_u64(&fields[0], "nonce")?,
                gas_price: decode_u128(&fields[1], "gas_price")?,
                gas_limit: decode_u64(&fields[2], "gas_limit")?,
                to: decode_to(&fields[3])?,
                value: decode_u256(&fields[4], "value")?,
                data: decode_data(&fields[5])?,
                chain_id: legacy_chain_id,
            }),
            TxType::AccessList => UnsignedTransaction::AccessList(AccessListTransaction {
                chain_id: decode_u64(&fields[0], "chain_id")?,
                nonce: decode_u64(&fields[1], "nonce")?,
                gas_price: decode_u128(&fields[2], "gas_price")?,
                gas_limit: decode_u64(&fields[3], "gas_limit")?,
                to: decode_to(&fields[4])?,
                value: decode_u256(&fields[5], "value")?,
                data: decode_data(&fields[6])?,
                access_list: decode_access_list(&fields[7])?,
            }),
            TxType::FeeMarket => UnsignedTransaction::FeeMarket(FeeMarketTransaction {
                chain_id: decode_u64(&fields[0], "chain_id")?,
                nonce: decode_u64(&fields[1], "nonce")?,
                max_priority_fee_per_gas: decode_u128(&fields[2], "max_priority_fee_per_gas")?,
                max_fee_per_gas: decode_u128(&fields[3], "max_fee_per_gas")?,
                gas_limit: decode_u64(&fields[4], "gas_limit")?,
                to: decode_to(&fields[5])?,
                value: decode_u256(&fields[6], "value")?,
                data: decode_data(&fields[7])?,
                access_list: decode_access_list(&fields[8])?,
            }),
        };
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects transaction fields and validates them into an [`UnsignedTransaction`].
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    tx_type: TxType,
    chain_id: Option<u64>,
    nonce: Option<u64>,
    gas_price: Option<u128>,
    max_priority_fee_per_gas: Option<u128>,
    max_fee_per_gas: Option<u128>,
    gas_limit: Option<u64>,
    to: Option<Address>,
    value: U256,
    data: Bytes,
    access_list: Vec<AccessListItem>,
}

impl TransactionBuilder {
    pub fn new(tx_type: TxType) -> Self {
        Self {
            tx_type,
            ..Self::default()
        }
    }

    /// For legacy transactions a chain id turns on EIP-155 replay protection.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn max_priority_fee_per_gas(mut self, fee: u128) -> Self {
        self.max_priority_fee_per_gas = Some(fee);
        self
    }

    pub fn max_fee_per_gas(mut self, fee: u128) -> Self {
        self.max_fee_per_gas = Some(fee);
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Destination; leave unset (or pass `None`) to deploy a contract.
    pub fn to(mut self, to: Option<Address>) -> Self {
        self.to = to;
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn access_list(mut self, access_list: Vec<AccessListItem>) -> Self {
        self.access_list = access_list;
        self
    }

    pub fn build(self) -> Result<UnsignedTransaction, EthError> {
        let nonce = self.nonce.ok_or_else(|| EthError::field("nonce", "is required"))?;
        let gas_limit = self
            .gas_limit
            .ok_or_else(|| EthError::field("gas_limit", "is required"))?;

        if self.to.is_none() && self.data.is_empty() {
            return Err(EthError::field(
                "data",
                "contract creation requires init code",
            ));
        }

        let tx = match self.tx_type {
            TxType::Legacy => {
                if !self.access_list.is_empty() {
                    return Err(EthError::field(
                        "access_list",
                        "legacy transactions cannot carry an access list",
                    ));
                }
                UnsignedTransaction::Legacy(LegacyTransaction {
                    nonce,
                    gas_price: self
                        .gas_price
                        .ok_or_else(|| EthError::field("gas_price", "is required"))?,
                    gas_limit,
                    to: self.to,
                    value: self.value,
                    data: self.data,
                    chain_id: self.chain_id,
                })
            }
            TxType::AccessList => UnsignedTransaction::AccessList(AccessListTransaction {
                chain_id: self
                    .chain_id
                    .ok_or_else(|| EthError::field("chain_id", "is required"))?,
                nonce,
                gas_price: self
                    .gas_price
                    .ok_or_else(|| EthError::field("gas_price", "is required"))?,
                gas_limit,
                to: self.to,
                value: self.value,
                data: self.data,
                access_list: self.access_list,
            }),
            TxType::FeeMarket => {
                let max_priority_fee_per_gas = self
                    .max_priority_fee_per_gas
                    .ok_or_else(|| EthError::field("max_priority_fee_per_gas", "is required"))?;
                let max_fee_per_gas = self
                    .max_fee_per_gas
                    .ok_or_else(|| EthError::field("max_fee_per_gas", "is required"))?;
                if max_priority_fee_per_gas > max_fee_per_gas {
                    return Err(EthError::field(
                        "max_priority_fee_per_gas",
                        format!("{max_priority_fee_per_gas} exceeds max_fee_per_gas {max_fee_per_gas}"),
                    ));
                }
                UnsignedTransaction::FeeMarket(FeeMarketTransaction {
                    chain_id: self
                        .chain_id
                        .ok_or_else(|| EthError::field("chain_id", "is required"))?,
                    nonce,
                    max_priority_fee_per_gas,
                    max_fee_per_gas,
                    gas_limit,
                    to: self.to,
                    value: self.value,
                    data: self.data,
                    access_list: self.access_list,
                })
            }
        };
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Input parsing
// ---------------------------------------------------------------------------

/// Parses a non-negative quantity given as `0x`-hex or decimal text.
pub fn parse_quantity(field: &'static str, input: &str) -> Result<U256, EthError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(EthError::field(field, "must not be negative"));
    }
    let (digits, radix) = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (input, 10),
    };
    if digits.is_empty() {
        return Err(EthError::field(field, "is empty"));
    }
    U256::from_str_radix(digits, radix)
        .map_err(|e| EthError::field(field, format!("invalid quantity {input:?}: {e}")))
}

/// Like [`parse_quantity`] but bounded to `u128`, the width used for gas prices.
pub fn parse_u128_quantity(field: &'static str, input: &str) -> Result<u128, EthError> {
    let value = parse_quantity(field, input)?;
    u128::try_from(value).map_err(|_| EthError::field(field, "does not fit in 128 bits"))
}

/// Parses `0x`-prefixed (or bare) hex calldata.
pub fn parse_data(input: &str) -> Result<Bytes, EthError> {
    let hex_str = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    hex::decode(hex_str)
        .map(Bytes::from)
        .map_err(|e| EthError::field("data", format!("invalid hex: {e}")))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn with_type_prefix(tx_type: TxType, list: &RlpItem) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + list.encoded_len());
    if let Some(byte) = tx_type.type_byte() {
        out.push(byte);
    }
    list.encode_into(&mut out);
    out
}

/// Splits an envelope into its type and RLP body.
///
/// Bytes starting at `0xc0` or above are a bare legacy list; anything else must
/// be a known type byte.
pub(crate) fn split_type_prefix(bytes: &[u8]) -> Result<(TxType, &[u8]), EthError> {
    let first = *bytes
        .first()
        .ok_or_else(|| EthError::MalformedEncoding("empty transaction bytes".into()))?;
    if first >= alloy_rlp::EMPTY_LIST_CODE {
        return Ok((TxType::Legacy, bytes));
    }
    let tx_type = TxType::from_type_byte(first).ok_or_else(|| {
        EthError::MalformedEncoding(format!("unsupported transaction type 0x{first:02x}"))
    })?;
    Ok((tx_type, &bytes[1..]))
}

fn to_item(to: Option<Address>) -> RlpItem {
    match to {
        Some(address) => RlpItem::bytes(address.as_slice()),
        None => RlpItem::empty(),
    }
}

fn access_list_item(access_list: &[AccessListItem]) -> RlpItem {
    RlpItem::List(
        access_list
            .iter()
            .map(|entry| {
                RlpItem::list(vec![
                    RlpItem::bytes(entry.address.as_slice()),
                    RlpItem::List(
                        entry
                            .storage_keys
                            .iter()
                            .map(|key| RlpItem::bytes(key.as_slice()))
                            .collect(),
                    ),
                ])
            })
            .collect(),
    )
}

fn decode_to(item: &RlpItem) -> Result<Option<Address>, EthError> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| EthError::MalformedEncoding("to: expected string, got list".into()))?;
    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(bytes))),
        n => Err(EthError::MalformedEncoding(format!(
            "to: expected 20 bytes, got {n}"
        ))),
    }
}

fn decode_data(item: &RlpItem) -> Result<Bytes, EthError> {
    item.as_bytes()
        .map(Bytes::copy_from_slice)
        .ok_or_else(|| EthError::MalformedEncoding("data: expected string, got list".into()))
}

fn decode_access_list(item: &RlpItem) -> Result<Vec<AccessListItem>, EthError> {
    let malformed = |what: &str| EthError::MalformedEncoding(format!("access_list: {what}"));

    item.as_list()
        .ok_or_else(|| malformed("expected list"))?
        .iter()
        .map(|entry| {
            let pair = entry.as_list().ok_or_else(|| malformed("entry is not a list"))?;
            let [address, keys] = pair else {
                return Err(malformed("entry must have 2 elements"));
            };
            let address = address
                .as_bytes()
                .filter(|b| b.len() == 20)
                .map(Address::from_slice)
                .ok_or_else(|| malformed("address must be 20 bytes"))?;
            let storage_keys = keys
                .as_list()
                .ok_or_else(|| malformed("storage keys must be a list"))?
                .iter()
                .map(|key| {
                    key.as_bytes()
                        .filter(|b| b.len() == 32)
                        .map(B256::from_slice)
                        .ok_or_else(|| malformed("storage key must be 32 bytes"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AccessListItem {
                address,
                storage_keys,
            })
        })
        .collect()
}
