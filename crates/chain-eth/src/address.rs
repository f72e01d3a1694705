use alloy_primitives::Address;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{EncodedPoint, PublicKey};
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Derives the Ethereum address for an SEC1-encoded secp256k1 public key.
///
/// Accepts both the 33-byte compressed and the 65-byte uncompressed form, which
/// covers what custody backends hand out. The address is the last 20 bytes of
/// the Keccak-256 hash of the 64-byte `x || y` coordinates.
pub fn pubkey_to_address(sec1_pubkey: &[u8]) -> Result<Address, EthError> {
    let encoded = EncodedPoint::from_bytes(sec1_pubkey)
        .map_err(|e| EthError::InvalidPublicKey(format!("invalid SEC1 encoding: {e}")))?;

    let pubkey: Option<PublicKey> = PublicKey::from_encoded_point(&encoded).into();
    let pubkey = pubkey.ok_or_else(|| {
        EthError::InvalidPublicKey("point is not on the secp256k1 curve".into())
    })?;

    let uncompressed = pubkey.to_encoded_point(false);
    let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

/// Parses a 0x-prefixed hex address.
///
/// All-lowercase and all-uppercase input is accepted as is. Mixed case must
/// carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    if !validate_address(address)? {
        return Err(EthError::InvalidAddress(format!(
            "EIP-55 checksum mismatch for {address}"
        )));
    }

    let bytes = hex::decode(&address[2..])
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    Ok(Address::from_slice(&bytes))
}

/// Validates an Ethereum address string.
///
/// Returns `Ok(false)` only for well-formed mixed-case input whose checksum does
/// not match; malformed input is an error.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    let hex_part = strip_hex_prefix(address)?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());

    if is_all_lower || is_all_upper {
        return Ok(true);
    }

    let checksummed = checksum_address(address)?;
    Ok(checksummed == address)
}

/// Applies EIP-55 mixed-case checksum encoding to an Ethereum address.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    let hex_part = strip_hex_prefix(address)?.to_lowercase();

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    // EIP-55: hash the lowercase hex address (without 0x).
    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        let hash_byte = hash[i / 2];
        let nibble = if i % 2 == 0 { hash_byte >> 4 } else { hash_byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    Ok(checksummed)
}

fn strip_hex_prefix(address: &str) -> Result<&str, EthError> {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))
}
