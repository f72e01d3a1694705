//! Structural RLP codec.
//!
//! [`RlpItem`] is a plain tree of byte strings and lists. Headers are written
//! and parsed with [`alloy_rlp::Header`], which already rejects non-canonical
//! length prefixes; this module adds the tree walk, strict whole-input
//! consumption and minimal integer helpers on top.

use alloy_primitives::U256;
use alloy_rlp::Header;

use crate::error::EthError;

/// A node in an RLP tree: either a byte string or an ordered list of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// The empty byte string, which is also how integer zero is encoded.
    pub fn empty() -> Self {
        RlpItem::Bytes(Vec::new())
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        RlpItem::Bytes(data.into())
    }

    pub fn list(items: impl Into<Vec<RlpItem>>) -> Self {
        RlpItem::List(items.into())
    }

    pub fn from_u64(value: u64) -> Self {
        RlpItem::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn from_u128(value: u128) -> Self {
        RlpItem::Bytes(trim_leading_zeros(&value.to_be_bytes()).to_vec())
    }

    pub fn from_u256(value: U256) -> Self {
        RlpItem::Bytes(trim_leading_zeros(&value.to_be_bytes::<32>()).to_vec())
    }

    /// Wraps a big-endian integer, dropping any leading zero bytes.
    pub fn uint_be(bytes: &[u8]) -> Self {
        RlpItem::Bytes(trim_leading_zeros(bytes).to_vec())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RlpItem::Bytes(b) => Some(b),
            RlpItem::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::Bytes(_) => None,
        }
    }

    /// Encodes this node into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            RlpItem::Bytes(b) if b.len() == 1 && b[0] < alloy_rlp::EMPTY_STRING_CODE => {
                out.push(b[0]);
            }
            RlpItem::Bytes(b) => {
                Header {
                    list: false,
                    payload_length: b.len(),
                }
                .encode(out);
                out.extend_from_slice(b);
            }
            RlpItem::List(items) => {
                let payload_length = items.iter().map(RlpItem::encoded_len).sum();
                Header {
                    list: true,
                    payload_length,
                }
                .encode(out);
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// Length of [`encode`](Self::encode)'s output, computed without allocating.
    pub fn encoded_len(&self) -> usize {
        match self {
            RlpItem::Bytes(b) if b.len() == 1 && b[0] < alloy_rlp::EMPTY_STRING_CODE => 1,
            RlpItem::Bytes(b) => alloy_rlp::length_of_length(b.len()) + b.len(),
            RlpItem::List(items) => {
                let payload: usize = items.iter().map(RlpItem::encoded_len).sum();
                alloy_rlp::length_of_length(payload) + payload
            }
        }
    }

    /// Decodes exactly one node spanning the whole input.
    pub fn decode(input: &[u8]) -> Result<Self, EthError> {
        let mut buf = input;
        let item = decode_item(&mut buf, 0)?;
        if !buf.is_empty() {
            return Err(EthError::MalformedEncoding(format!(
                "{} trailing bytes after top-level item",
                buf.len()
            )));
        }
        Ok(item)
    }
}

/// Deepest list nesting the decoder accepts. Transactions need four levels.
pub const MAX_DEPTH: usize = 16;

fn decode_item(buf: &mut &[u8], depth: usize) -> Result<RlpItem, EthError> {
    let header = Header::decode(buf)?;
    let payload = buf
        .get(..header.payload_length)
        .ok_or_else(|| EthError::MalformedEncoding("input too short".into()))?;
    *buf = &buf[header.payload_length..];

    if !header.list {
        return Ok(RlpItem::Bytes(payload.to_vec()));
    }

    if depth >= MAX_DEPTH {
        return Err(EthError::MalformedEncoding("nesting too deep".into()));
    }

    let mut inner = payload;
    let mut items = Vec::new();
    while !inner.is_empty() {
        items.push(decode_item(&mut inner, depth + 1)?);
    }
    Ok(RlpItem::List(items))
}

/// Strips leading zero bytes; all-zero input yields an empty slice.
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Reads a canonical unsigned integer of at most 8 bytes.
pub fn decode_u64(item: &RlpItem, field: &'static str) -> Result<u64, EthError> {
    let bytes = canonical_uint(item, field, 8)?;
    let mut padded = [0u8; 8];
    padded[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(u64::from_be_bytes(padded))
}

/// Reads a canonical unsigned integer of at most 16 bytes.
pub fn decode_u128(item: &RlpItem, field: &'static str) -> Result<u128, EthError> {
    let bytes = canonical_uint(item, field, 16)?;
    let mut padded = [0u8; 16];
    padded[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(u128::from_be_bytes(padded))
}

/// Reads a canonical unsigned integer of at most 32 bytes.
pub fn decode_u256(item: &RlpItem, field: &'static str) -> Result<U256, EthError> {
    let bytes = canonical_uint(item, field, 32)?;
    Ok(U256::from_be_slice(bytes))
}

fn canonical_uint<'a>(
    item: &'a RlpItem,
    field: &'static str,
    max_len: usize,
) -> Result<&'a [u8], EthError> {
    let bytes = item
        .as_bytes()
        .ok_or_else(|| EthError::MalformedEncoding(format!("{field}: expected string, got list")))?;
    if bytes.len() > max_len {
        return Err(EthError::MalformedEncoding(format!(
            "{field}: integer of {} bytes exceeds {max_len}",
            bytes.len()
        )));
    }
    if bytes.first() == Some(&0) {
        return Err(EthError::MalformedEncoding(format!(
            "{field}: integer has leading zero byte"
        )));
    }
    Ok(bytes)
}
