//! End-to-end tests through the public API:
//! intent -> node state -> remote signature -> assembled bytes -> history.

mod common;

use std::time::Duration;

use alloy_primitives::{Address, B256};
use common::{address_of, signing_key, LocalSigner, MockProvider, DEAD};
use wallet_core::chain_eth::assembler::{decode_signed, recover_signer};
use wallet_core::chain_eth::chains::{BSC, ETHEREUM, POLYGON};
use wallet_core::chain_eth::error::EthError;
use wallet_core::chain_eth::transaction::{TxType, UnsignedTransaction, FEE_MARKET_TX_TYPE};
use wallet_core::provider::TransactionReceipt;
use wallet_core::{
    broadcast, wait_for_receipt, NetworkRegistry, SignerError, SignerProtocol, TransactionIntent,
    Wallet, WalletError,
};

fn wallet(protocol: SignerProtocol) -> (Wallet<LocalSigner>, Address) {
    let key = signing_key(1);
    let account = address_of(&key);
    (
        Wallet::new(LocalSigner::new(key, protocol), NetworkRegistry::default()),
        account,
    )
}

fn one_eth() -> TransactionIntent {
    TransactionIntent::transfer(DEAD, "0xde0b6b3a7640000")
}

// ─── Signing pipeline ────────────────────────────────────────────────

#[tokio::test]
async fn sequential_calls_use_increasing_nonces() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);

    // The node keeps reporting 5 because nothing was broadcast.
    let first = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    let second = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();

    assert_eq!(first.nonce, 5);
    assert_eq!(second.nonce, 6);
    assert_ne!(first.hash, second.hash);

    let history = wallet.get_history(account, &ETHEREUM);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].hash, first.hash);
    assert_eq!(history[1].hash, second.hash);
    assert!(history[0].timestamp <= history[1].timestamp);
}

#[tokio::test]
async fn node_nonce_wins_when_ahead_of_cache() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);

    wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    *provider.nonce.lock() = 40;

    let signed = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    assert_eq!(signed.nonce, 40);
}

#[tokio::test]
async fn concurrent_calls_never_share_a_nonce() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);
    let intent = one_eth();

    let (a, b) = tokio::join!(
        wallet.build_and_sign(&provider, &intent, account, &ETHEREUM),
        wallet.build_and_sign(&provider, &intent, account, &ETHEREUM),
    );
    let mut nonces = [a.unwrap().nonce, b.unwrap().nonce];
    nonces.sort_unstable();
    assert_eq!(nonces, [5, 6]);
}

#[tokio::test]
async fn fee_market_output_is_typed_and_recovers_to_account() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);

    let signed = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();

    assert_eq!(signed.tx_type, TxType::FeeMarket);
    assert_eq!(signed.raw[0], FEE_MARKET_TX_TYPE);
    assert_eq!(recover_signer(&signed.raw).unwrap(), account);

    let decoded = decode_signed(&signed.raw).unwrap();
    let UnsignedTransaction::FeeMarket(tx) = decoded.tx else {
        panic!("expected a fee market transaction");
    };
    assert_eq!(tx.chain_id, 1);
    assert_eq!(tx.gas_limit, provider.gas_estimate);
    assert_eq!(tx.max_priority_fee_per_gas, provider.priority_fee);
    assert_eq!(tx.max_fee_per_gas, provider.gas_price + provider.priority_fee);
}

#[tokio::test]
async fn both_signer_protocols_produce_identical_bytes() {
    let provider = MockProvider::new(1);

    let (raw_wallet, account) = wallet(SignerProtocol::RawSignature);
    let spliced = raw_wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();

    let (signed_wallet, _) = wallet(SignerProtocol::SignedTransaction);
    let passed_through = signed_wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();

    assert_eq!(spliced, passed_through);
}

#[tokio::test]
async fn legacy_network_gets_eip155_signature() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(56);

    let signed = wallet
        .build_and_sign(&provider, &one_eth(), account, &BSC)
        .await
        .unwrap();

    assert_eq!(signed.tx_type, TxType::Legacy);
    assert!(signed.raw[0] >= 0xc0);
    let decoded = decode_signed(&signed.raw).unwrap();
    assert_eq!(decoded.tx.chain_id(), Some(56));
    assert_eq!(recover_signer(&signed.raw).unwrap(), account);
    assert!(provider.calls().contains(&"gas_price"));
    assert!(!provider.calls().contains(&"max_priority_fee_per_gas"));
}

#[tokio::test]
async fn unprotected_legacy_has_no_chain_id() {
    let (wallet, account) = wallet(SignerProtocol::SignedTransaction);
    let provider = MockProvider::new(1);
    let intent = TransactionIntent {
        tx_type: Some(TxType::Legacy),
        replay_protected: false,
        gas_price: Some("20000000000".into()),
        gas_limit: Some(21_000),
        ..one_eth()
    };

    let signed = wallet
        .build_and_sign(&provider, &intent, account, &ETHEREUM)
        .await
        .unwrap();
    let decoded = decode_signed(&signed.raw).unwrap();
    assert_eq!(decoded.tx.chain_id(), None);

    // Explicit gas fields mean no fee or estimate lookups.
    assert_eq!(provider.calls(), ["chain_id", "transaction_count"]);
}

#[tokio::test]
async fn access_list_transaction_round_trips() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(137);
    let intent = TransactionIntent {
        tx_type: Some(TxType::AccessList),
        access_list: vec![wallet_core::types::AccessListEntry {
            address: DEAD.into(),
            storage_keys: vec![format!("0x{}", "ab".repeat(32))],
        }],
        ..one_eth()
    };

    let signed = wallet
        .build_and_sign(&provider, &intent, account, &POLYGON)
        .await
        .unwrap();
    assert_eq!(signed.raw[0], 0x01);
    let UnsignedTransaction::AccessList(tx) = decode_signed(&signed.raw).unwrap().tx else {
        panic!("expected an access list transaction");
    };
    assert_eq!(tx.access_list[0].storage_keys, [B256::repeat_byte(0xab)]);
}

// ─── Failure paths ───────────────────────────────────────────────────

#[tokio::test]
async fn invalid_intent_fails_before_any_network_call() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);
    let intent = TransactionIntent::transfer(DEAD, "-1");

    let err = wallet
        .build_and_sign(&provider, &intent, account, &ETHEREUM)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WalletError::Eth(EthError::InvalidTransactionField { field: "value", .. })
    ));
    assert!(provider.calls().is_empty());
    assert_eq!(wallet.signer().calls(), 0);
}

#[tokio::test]
async fn signer_failure_is_not_retried_and_leaves_cache_untouched() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);
    *wallet.signer().fail_with.lock() = Some(SignerError::Indeterminate("timed out".into()));

    let err = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::Signer(SignerError::Indeterminate(_))));
    assert!(!err.is_retriable());
    assert_eq!(wallet.signer().calls(), 1);
    assert!(wallet.get_history(account, &ETHEREUM).is_empty());

    // The failed attempt did not consume a nonce.
    *wallet.signer().fail_with.lock() = None;
    let signed = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    assert_eq!(signed.nonce, 5);
}

#[tokio::test]
async fn unauthorized_identity_surfaces_as_signer_error() {
    let (wallet, account) = wallet(SignerProtocol::SignedTransaction);
    let provider = MockProvider::new(1);
    *wallet.signer().fail_with.lock() = Some(SignerError::Unauthorized);

    let err = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Signer(SignerError::Unauthorized)));
}

#[tokio::test]
async fn provider_on_wrong_chain_is_refused() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(137);

    let err = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WalletError::ChainMismatch {
            expected: 1,
            actual: 137
        }
    ));
    assert_eq!(wallet.signer().calls(), 0);
}

#[tokio::test]
async fn signature_from_another_key_is_rejected() {
    let account = address_of(&signing_key(1));
    let wallet = Wallet::new(
        LocalSigner::new(signing_key(2), SignerProtocol::RawSignature),
        NetworkRegistry::default(),
    );
    let provider = MockProvider::new(1);

    let err = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::Eth(EthError::AssemblyError(_))));
    assert!(wallet.get_history(account, &ETHEREUM).is_empty());
}

#[tokio::test]
async fn tampered_pass_through_is_rejected() {
    let key = signing_key(1);
    let account = address_of(&key);
    let mut signer = LocalSigner::new(key, SignerProtocol::SignedTransaction);
    signer.tamper = true;
    let wallet = Wallet::new(signer, NetworkRegistry::default());

    let err = wallet
        .build_and_sign(&MockProvider::new(1), &one_eth(), account, &ETHEREUM)
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::Eth(EthError::AssemblyError(_))));
}

// ─── History and networks ────────────────────────────────────────────

#[tokio::test]
async fn clear_history_is_per_chain() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);

    wallet
        .build_and_sign(&MockProvider::new(1), &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    wallet
        .build_and_sign(&MockProvider::new(56), &one_eth(), account, &BSC)
        .await
        .unwrap();

    wallet.clear_history(account, &ETHEREUM);

    assert!(wallet.get_history(account, &ETHEREUM).is_empty());
    assert_eq!(wallet.get_history(account, &BSC).len(), 1);

    // With the hint gone the node nonce is used again.
    let signed = wallet
        .build_and_sign(&MockProvider::new(1), &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();
    assert_eq!(signed.nonce, 5);
}

#[tokio::test]
async fn network_switching() {
    let (wallet, _) = wallet(SignerProtocol::RawSignature);
    assert_eq!(wallet.active_network().chain_id, 1);
    assert!(wallet.list_networks().len() >= 10);

    assert_eq!(wallet.switch_network(137).unwrap().name, "Polygon");
    assert!(matches!(
        wallet.switch_network(999_999),
        Err(WalletError::Eth(EthError::UnknownChain(999_999)))
    ));
    assert_eq!(wallet.active_network().chain_id, 137);
}

#[tokio::test]
async fn account_address_comes_from_signer_public_key() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    assert_eq!(wallet.account_address().await.unwrap(), account);
}

// ─── Broadcast ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn broadcast_then_wait_for_receipt() {
    let (wallet, account) = wallet(SignerProtocol::RawSignature);
    let provider = MockProvider::new(1);
    let signed = wallet
        .build_and_sign(&provider, &one_eth(), account, &ETHEREUM)
        .await
        .unwrap();

    let hash = broadcast(&provider, &signed).await.unwrap();
    assert_eq!(hash, signed.hash);
    assert_eq!(provider.sent.lock()[0], signed.raw);

    provider.receipts.lock().insert(
        hash,
        TransactionReceipt {
            transaction_hash: hash,
            block_number: 100,
            gas_used: 21_000,
            status: true,
        },
    );
    provider
        .pending_polls
        .store(2, std::sync::atomic::Ordering::SeqCst);

    let receipt = wait_for_receipt(&provider, hash, Duration::from_secs(2), 5)
        .await
        .unwrap()
        .expect("mined on the third poll");
    assert_eq!(receipt.block_number, 100);
    let polls = provider
        .calls()
        .iter()
        .filter(|c| **c == "transaction_receipt")
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test(start_paused = true)]
async fn wait_for_receipt_gives_up() {
    let provider = MockProvider::new(1);
    let receipt = wait_for_receipt(&provider, B256::ZERO, Duration::from_secs(1), 3)
        .await
        .unwrap();
    assert!(receipt.is_none());
}
