//! Per (account, chain) nonce hints and sent-transaction history.
//!
//! The cache is advisory. The node is always asked for the nonce before a
//! transaction is built; the cached value only covers transactions the node
//! has not seen yet.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, B256};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub account: Address,
    pub chain_id: u64,
}

impl AccountKey {
    pub fn new(account: Address, chain_id: u64) -> Self {
        Self { account, chain_id }
    }
}

/// One signed transaction produced for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub raw: Bytes,
    pub hash: B256,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAccountRecord {
    /// Next nonce as far as this wallet knows; 0 when nothing was sent.
    pub nonce: u64,
    /// Oldest first. Duplicates are kept.
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Default)]
pub struct AccountCache {
    records: Mutex<HashMap<AccountKey, ChainAccountRecord>>,
}

impl AccountCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the record, creating an empty one if absent.
    pub fn get_record(&self, account: Address, chain_id: u64) -> ChainAccountRecord {
        self.records
            .lock()
            .entry(AccountKey::new(account, chain_id))
            .or_default()
            .clone()
    }

    /// Appends a signed transaction to the account's history.
    pub fn record_sent(
        &self,
        account: Address,
        chain_id: u64,
        raw: Bytes,
        timestamp: DateTime<Utc>,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            hash: B256::from_slice(&Keccak256::digest(&raw)),
            raw,
            timestamp,
        };

        let mut records = self.records.lock();
        let record = records.entry(AccountKey::new(account, chain_id)).or_default();
        record.history.push(entry.clone());
        debug!(
            "Recorded transaction: account={}, chain_id={}, hash={}, history_len={}",
            account,
            chain_id,
            entry.hash,
            record.history.len()
        );
        entry
    }

    /// Nonce to use given what the node reports.
    pub fn next_nonce(&self, account: Address, chain_id: u64, node_nonce: u64) -> u64 {
        let cached = self
            .records
            .lock()
            .get(&AccountKey::new(account, chain_id))
            .map_or(0, |r| r.nonce);
        node_nonce.max(cached)
    }

    /// Marks `used` as consumed so the next hint is at least `used + 1`.
    pub fn advance_nonce(&self, account: Address, chain_id: u64, used: u64) {
        let mut records = self.records.lock();
        let record = records.entry(AccountKey::new(account, chain_id)).or_default();
        record.nonce = record.nonce.max(used.saturating_add(1));
    }

    /// Drops the history and the nonce hint for one account on one chain.
    pub fn clear(&self, account: Address, chain_id: u64) {
        if let Some(record) = self.records.lock().get_mut(&AccountKey::new(account, chain_id)) {
            record.history.clear();
            record.nonce = 0;
        }
        debug!("Cleared history: account={}, chain_id={}", account, chain_id);
    }
}
