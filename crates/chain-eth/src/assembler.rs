//! Turns an unsigned transaction plus remote signature material into the final
//! broadcast bytes.
//!
//! Two signer protocols exist in the wild: one hands back the complete signed
//! transaction, the other only `(r, s, recovery_id)`. [`SignatureOutcome`]
//! names which one arrived and [`assemble`] dispatches on it.

use alloy_primitives::{Address, Bytes, B256};
use sha3::{Digest, Keccak256};

use crate::error::EthError;
use crate::rlp::{decode_u256, decode_u64, RlpItem};
use crate::signature::{recover_address, RawSignature};
use crate::transaction::{split_type_prefix, with_type_prefix, TxType, UnsignedTransaction};

/// What a remote signer returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// Complete, encoded, signed transaction.
    Signed(Bytes),
    /// Signature only; the caller splices it into the transaction.
    Signature(RawSignature),
}

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Envelope bytes, including the type prefix for typed transactions.
    pub raw: Bytes,
    /// Keccak-256 of `raw`.
    pub hash: B256,
    pub tx_type: TxType,
    pub nonce: u64,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// A signed transaction split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub tx: UnsignedTransaction,
    pub signature: RawSignature,
}

/// Produces the final signed transaction from whatever the signer returned.
pub fn assemble(
    tx: &UnsignedTransaction,
    outcome: SignatureOutcome,
) -> Result<SignedTransaction, EthError> {
    match outcome {
        SignatureOutcome::Signed(raw) => pass_through(tx, raw),
        SignatureOutcome::Signature(signature) => splice(tx, &signature),
    }
}

/// Accepts already-signed bytes after checking they sign `tx` and nothing else.
pub fn pass_through(tx: &UnsignedTransaction, raw: Bytes) -> Result<SignedTransaction, EthError> {
    let decoded = decode_signed(&raw)
        .map_err(|e| EthError::AssemblyError(format!("signer returned undecodable bytes: {e}")))?;

    if decoded.tx.tx_type() != tx.tx_type() {
        return Err(EthError::AssemblyError(format!(
            "signer returned a {:?} transaction for a {:?} request",
            decoded.tx.tx_type(),
            tx.tx_type()
        )));
    }
    if decoded.tx != *tx {
        return Err(EthError::AssemblyError(
            "signed transaction fields differ from the submitted transaction".into(),
        ));
    }

    Ok(finish(raw.to_vec(), tx))
}

/// Splices a raw signature into `tx`.
pub fn splice(tx: &UnsignedTransaction, signature: &RawSignature) -> Result<SignedTransaction, EthError> {
    let legacy_chain_id = match tx {
        UnsignedTransaction::Legacy(legacy) => legacy.chain_id,
        _ => None,
    };
    let raw = splice_fields(tx.tx_type(), legacy_chain_id, tx.fields(), signature)?;
    Ok(finish(raw, tx))
}

/// Appends signature fields to an unsigned field list and encodes the envelope.
///
/// Typed transactions get `[recovery_id, r, s]`; legacy transactions get
/// `[v, r, s]` with `v` from [`legacy_v`]. `r` and `s` are re-minimised.
pub fn splice_fields(
    tx_type: TxType,
    legacy_chain_id: Option<u64>,
    mut fields: Vec<RlpItem>,
    signature: &RawSignature,
) -> Result<Vec<u8>, EthError> {
    let expected = tx_type.unsigned_field_count();
    if fields.len() != expected {
        return Err(EthError::AssemblyError(format!(
            "{tx_type:?} transaction needs {expected} unsigned fields, got {}",
            fields.len()
        )));
    }
    if signature.recovery_id > 1 {
        return Err(EthError::AssemblyError(format!(
            "recovery id must be 0 or 1, got {}",
            signature.recovery_id
        )));
    }
    let signature = signature.normalize_s();

    let v = match tx_type {
        TxType::Legacy => legacy_v(signature.recovery_id, legacy_chain_id)?,
        TxType::AccessList | TxType::FeeMarket => u64::from(signature.recovery_id),
    };

    fields.push(RlpItem::from_u64(v));
    fields.push(RlpItem::uint_be(signature.r.as_slice()));
    fields.push(RlpItem::uint_be(signature.s.as_slice()));

    Ok(with_type_prefix(tx_type, &RlpItem::List(fields)))
}

/// Legacy `v`: `27 + recovery_id`, or `chain_id * 2 + 35 + recovery_id` under EIP-155.
pub fn legacy_v(recovery_id: u8, chain_id: Option<u64>) -> Result<u64, EthError> {
    let recovery_id = u64::from(recovery_id);
    match chain_id {
        None => Ok(27 + recovery_id),
        Some(chain_id) => chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + recovery_id))
            .ok_or_else(|| EthError::AssemblyError(format!("chain id {chain_id} overflows v"))),
    }
}

/// Parses signed envelope bytes into the unsigned transaction and its signature.
pub fn decode_signed(raw: &[u8]) -> Result<DecodedTransaction, EthError> {
    let (tx_type, body) = split_type_prefix(raw)?;
    let item = RlpItem::decode(body)?;
    let fields = item
        .as_list()
        .ok_or_else(|| EthError::MalformedEncoding("transaction body is not a list".into()))?;

    let expected = tx_type.unsigned_field_count() + 3;
    if fields.len() != expected {
        return Err(EthError::MalformedEncoding(format!(
            "signed {tx_type:?} transaction has {} fields, expected {expected}",
            fields.len()
        )));
    }
    let (unsigned, sig) = fields.split_at(expected - 3);

    let v = decode_u64(&sig[0], "v")?;
    let (recovery_id, legacy_chain_id) = match tx_type {
        TxType::Legacy => match v {
            27 | 28 => (v - 27, None),
            v if v >= 35 => ((v - 35) % 2, Some((v - 35) / 2)),
            v => {
                return Err(EthError::MalformedEncoding(format!("invalid legacy v {v}")));
            }
        },
        TxType::AccessList | TxType::FeeMarket => (v, None),
    };
    let recovery_id = u8::try_from(recovery_id)
        .ok()
        .filter(|id| *id <= 1)
        .ok_or_else(|| EthError::MalformedEncoding(format!("invalid y-parity {v}")))?;

    let r = B256::from(decode_u256(&sig[1], "r")?.to_be_bytes::<32>());
    let s = B256::from(decode_u256(&sig[2], "s")?.to_be_bytes::<32>());

    Ok(DecodedTransaction {
        tx: UnsignedTransaction::from_fields(tx_type, unsigned, legacy_chain_id)?,
        signature: RawSignature {
            r,
            s,
            recovery_id,
        },
    })
}

/// Recovers the address that signed the envelope `raw`.
pub fn recover_signer(raw: &[u8]) -> Result<Address, EthError> {
    let decoded = decode_signed(raw)?;
    recover_address(&decoded.tx.signing_payload(), &decoded.signature)
}

fn finish(raw: Vec<u8>, tx: &UnsignedTransaction) -> SignedTransaction {
    let hash = B256::from_slice(&Keccak256::digest(&raw));
    SignedTransaction {
        raw: Bytes::from(raw),
        hash,
        tx_type: tx.tx_type(),
        nonce: tx.nonce(),
    }
}
