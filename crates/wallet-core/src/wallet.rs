//! Orchestrates transaction construction, remote signing and bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use chain_eth::address::pubkey_to_address;
use chain_eth::assembler::{assemble, recover_signer, SignedTransaction};
use chain_eth::chains::NetworkDescriptor;
use chain_eth::error::EthError;
use chain_eth::transaction::{TransactionBuilder, TxType};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::cache::{AccountCache, AccountKey, HistoryEntry};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::network::NetworkRegistry;
use crate::provider::{CallRequest, NodeProvider, TransactionReceipt};
use crate::signer::{HttpSigner, RemoteSigner};
use crate::types::{TransactionIntent, ValidatedIntent};

/// A keyless wallet: it builds transactions and has a remote signer sign them.
pub struct Wallet<S> {
    signer: S,
    cache: AccountCache,
    networks: NetworkRegistry,
    account_locks: AccountLocks,
}

impl Wallet<HttpSigner> {
    pub fn from_config(config: &WalletConfig) -> Result<Self, WalletError> {
        let signer = HttpSigner::new(&config.signer)?;
        Ok(Self::new(
            signer,
            NetworkRegistry::new(config.network.default_chain_id),
        ))
    }
}

impl<S: RemoteSigner> Wallet<S> {
    pub fn new(signer: S, networks: NetworkRegistry) -> Self {
        Self {
            signer,
            cache: AccountCache::new(),
            networks,
            account_locks: AccountLocks::default(),
        }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn cache(&self) -> &AccountCache {
        &self.cache
    }

    /// Address controlled by the signer's identity.
    pub async fn account_address(&self) -> Result<Address, WalletError> {
        let public_key = self.signer.public_key().await?;
        Ok(pubkey_to_address(&public_key)?)
    }

    /// Builds, signs and records one transaction for `account` on `network`.
    ///
    /// `provider` must serve `network`. The fetch-nonce, sign, record sequence
    /// is serialised per (account, chain), so concurrent calls never reuse a
    /// nonce. A failed signature leaves the cache untouched and is not retried.
    pub async fn build_and_sign<P>(
        &self,
        provider: &P,
        intent: &TransactionIntent,
        account: Address,
        network: &NetworkDescriptor,
    ) -> Result<SignedTransaction, WalletError>
    where
        P: NodeProvider + ?Sized,
    {
        let intent = intent.validate(network)?;

        let served = provider.chain_id().await?;
        if served != network.chain_id {
            return Err(WalletError::ChainMismatch {
                expected: network.chain_id,
                actual: served,
            });
        }

        let held = self
            .account_locks
            .acquire(AccountKey::new(account, network.chain_id));
        let _guard = held.lock.lock().await;

        let node_nonce = provider.transaction_count(account).await?;
        let nonce = self.cache.next_nonce(account, network.chain_id, node_nonce);
        if nonce != node_nonce {
            debug!(
                "Node nonce behind local state: account={}, node={}, using={}",
                account, node_nonce, nonce
            );
        }

        let mut builder = TransactionBuilder::new(intent.tx_type)
            .nonce(nonce)
            .to(intent.to)
            .value(intent.value)
            .data(intent.data.clone())
            .access_list(intent.access_list.clone());
        if intent.tx_type != TxType::Legacy || intent.replay_protected {
            builder = builder.chain_id(network.chain_id);
        }
        builder = apply_fees(provider, &intent, builder).await?;

        let gas_limit = match intent.gas_limit {
            Some(limit) => limit,
            None => {
                provider
                    .estimate_gas(&CallRequest {
                        from: account,
                        to: intent.to,
                        value: intent.value,
                        data: intent.data.clone(),
                    })
                    .await?
            }
        };
        let tx = builder.gas_limit(gas_limit).build()?;

        let payload = tx.signing_payload();
        let outcome = self.signer.sign(&payload, network.chain_id).await?;
        let signed = assemble(&tx, outcome)?;

        let signer = recover_signer(&signed.raw)?;
        if signer != account {
            return Err(EthError::AssemblyError(format!(
                "signature recovers to {signer}, expected {account}"
            ))
            .into());
        }

        self.cache
            .record_sent(account, network.chain_id, signed.raw.clone(), Utc::now());
        self.cache.advance_nonce(account, network.chain_id, nonce);

        info!(
            "Signed {:?} tx: account={}, chain_id={}, nonce={}, hash={}",
            signed.tx_type,
            account,
            network.chain_id,
            nonce,
            signed.hash_hex()
        );
        Ok(signed)
    }

    /// Signed transactions for `account` on `network`, oldest first.
    pub fn get_history(&self, account: Address, network: &NetworkDescriptor) -> Vec<HistoryEntry> {
        self.cache.get_record(account, network.chain_id).history
    }

    pub fn clear_history(&self, account: Address, network: &NetworkDescriptor) {
        self.cache.clear(account, network.chain_id);
    }

    pub fn list_networks(&self) -> Vec<&'static NetworkDescriptor> {
        self.networks.list_networks()
    }

    pub fn active_network(&self) -> &'static NetworkDescriptor {
        self.networks.active()
    }

    /// Selects another network. The caller must connect a provider for it.
    pub fn switch_network(&self, chain_id: u64) -> Result<&'static NetworkDescriptor, WalletError> {
        Ok(self.networks.switch_to(chain_id)?)
    }
}

/// Per-(account, chain) signing locks. An entry exists only while some call
/// holds or waits on it.
#[derive(Default)]
struct AccountLocks {
    locks: Mutex<HashMap<AccountKey, Arc<AsyncMutex<()>>>>,
}

impl AccountLocks {
    fn acquire(&self, key: AccountKey) -> HeldLock<'_> {
        let lock = self.locks.lock().entry(key).or_default().clone();
        HeldLock {
            owner: self,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// A reference into [`AccountLocks`] that prunes its entry when the last
/// user lets go, including when the owning future is dropped.
struct HeldLock<'a> {
    owner: &'a AccountLocks,
    key: AccountKey,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for HeldLock<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock();
        // Clones are only taken under the map lock, so two means ours and the map's.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Fills the fee fields the intent left open from the node.
///
/// Fee market transactions without an explicit cap get
/// `max_fee = gas_price + priority_fee`.
async fn apply_fees<P>(
    provider: &P,
    intent: &ValidatedIntent,
    builder: TransactionBuilder,
) -> Result<TransactionBuilder, WalletError>
where
    P: NodeProvider + ?Sized,
{
    match intent.tx_type {
        TxType::Legacy | TxType::AccessList => {
            let gas_price = match intent.gas_price {
                Some(price) => price,
                None => provider.gas_price().await?,
            };
            Ok(builder.gas_price(gas_price))
        }
        TxType::FeeMarket => {
            let priority = match intent.max_priority_fee_per_gas {
                Some(fee) => fee,
                None => provider.max_priority_fee_per_gas().await?,
            };
            let max_fee = match intent.max_fee_per_gas {
                Some(fee) => fee,
                None => provider.gas_price().await?.saturating_add(priority),
            };
            // A node-suggested tip may exceed a user-set cap.
            let priority = match intent.max_priority_fee_per_gas {
                Some(fee) => fee,
                None => priority.min(max_fee),
            };
            Ok(builder
                .max_priority_fee_per_gas(priority)
                .max_fee_per_gas(max_fee))
        }
    }
}

/// Submits a signed transaction.
pub async fn broadcast<P>(provider: &P, signed: &SignedTransaction) -> Result<B256, WalletError>
where
    P: NodeProvider + ?Sized,
{
    let hash = provider.send_raw_transaction(&signed.raw).await?;
    if hash != signed.hash {
        warn!(
            "Node reported a different hash: local={}, node={}",
            signed.hash_hex(),
            hash
        );
    }
    info!("Broadcast tx: hash={}", hash);
    Ok(hash)
}

/// Polls for a receipt up to `max_attempts` times, `poll_interval` apart.
///
/// Returns `Ok(None)` if the transaction is still pending afterwards.
pub async fn wait_for_receipt<P>(
    provider: &P,
    hash: B256,
    poll_interval: Duration,
    max_attempts: u32,
) -> Result<Option<TransactionReceipt>, WalletError>
where
    P: NodeProvider + ?Sized,
{
    for attempt in 1..=max_attempts {
        if let Some(receipt) = provider.transaction_receipt(hash).await? {
            info!(
                "Receipt found: hash={}, block={}, status={}",
                hash, receipt.block_number, receipt.status
            );
            return Ok(Some(receipt));
        }
        debug!("Receipt pending: hash={}, attempt={}/{}", hash, attempt, max_attempts);
        if attempt < max_attempts {
            tokio::time::sleep(poll_interval).await;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> AccountKey {
        AccountKey::new(Address::repeat_byte(byte), 1)
    }

    #[test]
    fn lock_entry_is_pruned_after_release() {
        let locks = AccountLocks::default();
        let held = locks.acquire(key(1));
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn lock_entry_survives_while_another_caller_waits() {
        let locks = AccountLocks::default();
        let first = locks.acquire(key(1));
        let second = locks.acquire(key(1));
        let other = locks.acquire(key(2));
        assert!(Arc::ptr_eq(&first.lock, &second.lock));
        assert_eq!(locks.len(), 2);

        drop(first);
        assert_eq!(locks.len(), 2);
        drop(second);
        drop(other);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn abandoned_wait_releases_the_entry() {
        let locks = AccountLocks::default();
        let held = locks.acquire(key(1));
        let guard = held.lock.lock().await;

        let waiter = async {
            let queued = locks.acquire(key(1));
            let _guard = queued.lock.lock().await;
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(10), waiter).await;
        assert!(timed_out.is_err());
        assert_eq!(locks.len(), 1);

        drop(guard);
        drop(held);
        assert_eq!(locks.len(), 0);
    }
}
