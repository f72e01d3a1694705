//! secp256k1 signature material and public-key recovery.
//!
//! The wallet never holds a private key. These helpers only work on signatures
//! produced elsewhere: normalising them, deriving the recovery id a bare
//! `r || s` is missing, and recovering the signer address for verification.

use alloy_primitives::{uint, Address, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::address::pubkey_to_address;
use crate::error::EthError;

/// Order `n` of the secp256k1 group.
pub const CURVE_ORDER: U256 =
    uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

/// An `(r, s, recovery_id)` triple as returned by raw-signature backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
    pub r: B256,
    pub s: B256,
    /// y-parity of the ephemeral point, 0 or 1.
    pub recovery_id: u8,
}

impl RawSignature {
    pub fn new(r: B256, s: B256, recovery_id: u8) -> Result<Self, EthError> {
        if recovery_id > 1 {
            return Err(EthError::AssemblyError(format!(
                "recovery id must be 0 or 1, got {recovery_id}"
            )));
        }
        Ok(Self { r, s, recovery_id })
    }

    /// Builds a signature from big-endian `r` and `s` of at most 32 bytes each.
    pub fn from_slices(r: &[u8], s: &[u8], recovery_id: u8) -> Result<Self, EthError> {
        Self::new(left_pad_32("r", r)?, left_pad_32("s", s)?, recovery_id)
    }

    /// Parses a 65-byte `r || s || v` signature where `v` is 0/1 or 27/28.
    pub fn from_rsv(signature: &[u8]) -> Result<Self, EthError> {
        if signature.len() != 65 {
            return Err(EthError::AssemblyError(format!(
                "expected 65-byte signature, got {}",
                signature.len()
            )));
        }
        let v = signature[64];
        let recovery_id = if v >= 27 { v - 27 } else { v };
        Self::from_slices(&signature[..32], &signature[32..64], recovery_id)
    }

    /// Rewrites a high `s` as `n - s` and flips the recovery id, which keeps
    /// the recovered key unchanged (EIP-2). Out-of-range `s` is left as is.
    pub fn normalize_s(self) -> Self {
        let s = U256::from_be_bytes(self.s.0);
        if s <= CURVE_ORDER >> 1 || s >= CURVE_ORDER {
            return self;
        }
        Self {
            r: self.r,
            s: B256::from((CURVE_ORDER - s).to_be_bytes::<32>()),
            recovery_id: self.recovery_id ^ 1,
        }
    }

    fn to_k256(self) -> Result<Signature, EthError> {
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(self.r.as_slice());
        compact[32..].copy_from_slice(self.s.as_slice());
        Signature::from_slice(&compact)
            .map_err(|e| EthError::RecoveryError(format!("invalid signature scalars: {e}")))
    }
}

/// Keccak-256 of a signing payload; the digest a remote signer signs.
pub fn signing_hash(payload: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(payload))
}

/// Recovers the address that produced `signature` over `payload`.
pub fn recover_address(payload: &[u8], signature: &RawSignature) -> Result<Address, EthError> {
    let digest = signing_hash(payload);
    let sig = signature.to_k256()?;
    let recid = RecoveryId::from_byte(signature.recovery_id)
        .ok_or_else(|| EthError::RecoveryError("invalid recovery id".into()))?;

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)
        .map_err(|e| EthError::RecoveryError(e.to_string()))?;
    pubkey_to_address(key.to_encoded_point(false).as_bytes())
}

/// Completes a bare 64-byte `r || s` signature into a [`RawSignature`].
///
/// `s` is normalised to the lower half of the curve order (EIP-2), then each
/// candidate recovery id is tried until the recovered key matches
/// `signer_pubkey` (SEC1, compressed or uncompressed).
pub fn complete_signature(
    payload: &[u8],
    compact: &[u8],
    signer_pubkey: &[u8],
) -> Result<RawSignature, EthError> {
    if compact.len() != 64 {
        return Err(EthError::AssemblyError(format!(
            "expected 64-byte signature, got {}",
            compact.len()
        )));
    }
    let expected = pubkey_to_address(signer_pubkey)?;

    let sig = Signature::from_slice(compact)
        .map_err(|e| EthError::RecoveryError(format!("invalid signature scalars: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    let bytes = sig.to_bytes();

    for recovery_id in 0..=1 {
        let candidate = RawSignature::from_slices(&bytes[..32], &bytes[32..], recovery_id)?;
        if matches!(recover_address(payload, &candidate), Ok(addr) if addr == expected) {
            return Ok(candidate);
        }
    }

    Err(EthError::RecoveryError(
        "signature does not match the signer public key".into(),
    ))
}

fn left_pad_32(name: &str, bytes: &[u8]) -> Result<B256, EthError> {
    if bytes.len() > 32 {
        return Err(EthError::AssemblyError(format!(
            "signature component {name} is {} bytes, expected at most 32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(B256::from(out))
}
