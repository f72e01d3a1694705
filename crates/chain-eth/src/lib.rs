//! EVM transaction support for the keyless wallet.
//!
//! This crate provides:
//! - A structural RLP codec with canonical-form decoding
//! - Legacy, EIP-2930 and EIP-1559 transaction models and their signing payloads
//! - Assembly of remote signature material into broadcast-ready transactions
//! - Signature recovery for verifying what a remote signer produced
//! - EIP-55 address parsing and public-key-to-address derivation
//! - The static catalog of supported EVM networks

pub mod address;
pub mod assembler;
pub mod chains;
pub mod error;
pub mod rlp;
pub mod signature;
pub mod transaction;
