//! In-process stand-ins for the remote signer and the node.

#![allow(dead_code)]

pub mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use wallet_core::chain_eth::address::pubkey_to_address;
use wallet_core::chain_eth::assembler::{splice, SignatureOutcome};
use wallet_core::chain_eth::signature::RawSignature;
use wallet_core::chain_eth::transaction::UnsignedTransaction;
use wallet_core::provider::{CallRequest, TransactionReceipt};
use wallet_core::{NodeProvider, ProviderError, RemoteSigner, SignerError, SignerProtocol};

pub const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

pub fn signing_key(last_byte: u8) -> SigningKey {
    let mut key = [0u8; 32];
    key[31] = last_byte;
    SigningKey::from_bytes((&key).into()).unwrap()
}

pub fn address_of(key: &SigningKey) -> Address {
    pubkey_to_address(key.verifying_key().to_encoded_point(false).as_bytes()).unwrap()
}

/// Signs with a local key, speaking either protocol.
pub struct LocalSigner {
    key: SigningKey,
    protocol: SignerProtocol,
    pub calls: AtomicUsize,
    pub fail_with: Mutex<Option<SignerError>>,
    /// Signs a transaction with a bumped nonce instead of the one submitted.
    pub tamper: bool,
}

impl LocalSigner {
    pub fn new(key: SigningKey, protocol: SignerProtocol) -> Self {
        Self {
            key,
            protocol,
            calls: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
            tamper: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn raw_signature(&self, payload: &[u8]) -> RawSignature {
        let digest = Keccak256::digest(payload);
        let (sig, recid): (Signature, RecoveryId) = self.key.sign_prehash(&digest).unwrap();
        let bytes = sig.to_bytes();
        RawSignature::from_slices(&bytes[..32], &bytes[32..], recid.to_byte()).unwrap()
    }
}

#[async_trait]
impl RemoteSigner for LocalSigner {
    fn protocol(&self) -> SignerProtocol {
        self.protocol
    }

    async fn public_key(&self) -> Result<Vec<u8>, SignerError> {
        Ok(self
            .key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec())
    }

    async fn sign(&self, payload: &[u8], _chain_id: u64) -> Result<SignatureOutcome, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }

        let mut tx = UnsignedTransaction::decode(payload)
            .map_err(|e| SignerError::Rejected(e.to_string()))?;
        if self.tamper {
            if let UnsignedTransaction::FeeMarket(inner) = &mut tx {
                inner.nonce += 1;
            }
        }
        let signature = self.raw_signature(&tx.signing_payload());

        match self.protocol {
            SignerProtocol::RawSignature => Ok(SignatureOutcome::Signature(signature)),
            SignerProtocol::SignedTransaction => {
                let signed = splice(&tx, &signature).unwrap();
                Ok(SignatureOutcome::Signed(signed.raw))
            }
        }
    }
}

/// Scripted node.
pub struct MockProvider {
    pub chain_id: u64,
    pub nonce: Mutex<u64>,
    pub gas_price: u128,
    pub priority_fee: u128,
    pub gas_estimate: u64,
    pub calls: Mutex<Vec<&'static str>>,
    pub sent: Mutex<Vec<Bytes>>,
    /// Receipt polls that return `None` before the receipt appears.
    pub pending_polls: AtomicUsize,
    pub receipts: Mutex<HashMap<B256, TransactionReceipt>>,
}

impl MockProvider {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            nonce: Mutex::new(5),
            gas_price: 30_000_000_000,
            priority_fee: 2_000_000_000,
            gas_estimate: 21_000,
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            pending_polls: AtomicUsize::new(0),
            receipts: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn called(&self, method: &'static str) {
        self.calls.lock().push(method);
    }
}

#[async_trait]
impl NodeProvider for MockProvider {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        self.called("chain_id");
        Ok(self.chain_id)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64, ProviderError> {
        self.called("transaction_count");
        Ok(*self.nonce.lock())
    }

    async fn gas_price(&self) -> Result<u128, ProviderError> {
        self.called("gas_price");
        Ok(self.gas_price)
    }

    async fn max_priority_fee_per_gas(&self) -> Result<u128, ProviderError> {
        self.called("max_priority_fee_per_gas");
        Ok(self.priority_fee)
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, ProviderError> {
        self.called("estimate_gas");
        Ok(self.gas_estimate)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, ProviderError> {
        self.called("send_raw_transaction");
        self.sent.lock().push(Bytes::copy_from_slice(raw));
        Ok(B256::from_slice(&Keccak256::digest(raw)))
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.called("transaction_receipt");
        if self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(None);
        }
        Ok(self.receipts.lock().get(&hash).cloned())
    }
}
