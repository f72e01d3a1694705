use alloy_primitives::{Address, Bytes, B256, U256};
use chain_eth::address::parse_address;
use chain_eth::chains::NetworkDescriptor;
use chain_eth::error::EthError;
use chain_eth::transaction::{
    parse_data, parse_quantity, parse_u128_quantity, AccessListItem, TxType,
};
use serde::{Deserialize, Serialize};

/// Access list entry as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListEntry {
    pub address: String,
    #[serde(default)]
    pub storage_keys: Vec<String>,
}

/// What the user asked for, before validation.
///
/// Quantities are decimal or `0x`-hex strings in wei. Unset fee and gas fields
/// are filled in from the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionIntent {
    /// `None` deploys `data` as a contract.
    pub to: Option<String>,
    pub value: String,
    pub data: String,
    /// Defaults to what the network supports best.
    pub tx_type: Option<TxType>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    pub access_list: Vec<AccessListEntry>,
    /// Legacy only. `false` signs without EIP-155 replay protection.
    pub replay_protected: bool,
}

impl Default for TransactionIntent {
    fn default() -> Self {
        Self {
            to: None,
            value: "0".into(),
            data: String::new(),
            tx_type: None,
            gas_limit: None,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            access_list: Vec::new(),
            replay_protected: true,
        }
    }
}

impl TransactionIntent {
    /// Plain value transfer.
    pub fn transfer(to: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            to: Some(to.into()),
            value: value.into(),
            ..Self::default()
        }
    }

    /// Contract creation with `init_code` as hex.
    pub fn deploy(init_code: impl Into<String>) -> Self {
        Self {
            data: init_code.into(),
            ..Self::default()
        }
    }

    /// Checks every user-supplied field for `network` without touching the node.
    pub fn validate(&self, network: &NetworkDescriptor) -> Result<ValidatedIntent, EthError> {
        let tx_type = self.tx_type.unwrap_or_else(|| network.default_tx_type());
        if tx_type == TxType::FeeMarket && !network.supports_eip1559 {
            return Err(EthError::field(
                "tx_type",
                format!("{} does not support fee market transactions", network.name),
            ));
        }

        let to = self.to.as_deref().map(parse_address).transpose()?;
        let value = parse_quantity("value", &self.value)?;
        let data = parse_data(&self.data)?;
        if to.is_none() && data.is_empty() {
            return Err(EthError::field("data", "contract creation requires init code"));
        }
        if self.gas_limit == Some(0) {
            return Err(EthError::field("gas_limit", "must be positive"));
        }

        let gas_price = parse_optional("gas_price", self.gas_price.as_deref())?;
        let max_fee_per_gas = parse_optional("max_fee_per_gas", self.max_fee_per_gas.as_deref())?;
        let max_priority_fee_per_gas = parse_optional(
            "max_priority_fee_per_gas",
            self.max_priority_fee_per_gas.as_deref(),
        )?;

        match tx_type {
            TxType::Legacy | TxType::AccessList => {
                if max_fee_per_gas.is_some() || max_priority_fee_per_gas.is_some() {
                    return Err(EthError::field(
                        "max_fee_per_gas",
                        format!("not used by {tx_type:?} transactions, set gas_price"),
                    ));
                }
            }
            TxType::FeeMarket => {
                if gas_price.is_some() {
                    return Err(EthError::field(
                        "gas_price",
                        "not used by fee market transactions",
                    ));
                }
                if let (Some(max), Some(tip)) = (max_fee_per_gas, max_priority_fee_per_gas) {
                    if tip > max {
                        return Err(EthError::field(
                            "max_priority_fee_per_gas",
                            format!("{tip} exceeds max_fee_per_gas {max}"),
                        ));
                    }
                }
            }
        }

        if tx_type == TxType::Legacy && !self.access_list.is_empty() {
            return Err(EthError::field(
                "access_list",
                "legacy transactions cannot carry an access list",
            ));
        }
        let access_list = self
            .access_list
            .iter()
            .map(parse_access_list_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ValidatedIntent {
            tx_type,
            to,
            value,
            data,
            gas_limit: self.gas_limit,
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            access_list,
            replay_protected: self.replay_protected,
        })
    }
}

/// A [`TransactionIntent`] with every field parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntent {
    pub tx_type: TxType,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
    pub access_list: Vec<AccessListItem>,
    pub replay_protected: bool,
}

fn parse_optional(field: &'static str, input: Option<&str>) -> Result<Option<u128>, EthError> {
    input.map(|s| parse_u128_quantity(field, s)).transpose()
}

fn parse_access_list_entry(entry: &AccessListEntry) -> Result<AccessListItem, EthError> {
    let storage_keys = entry
        .storage_keys
        .iter()
        .map(|key| {
            let bytes = parse_data(key)
                .map_err(|_| EthError::field("access_list", format!("invalid storage key {key}")))?;
            if bytes.len() != 32 {
                return Err(EthError::field(
                    "access_list",
                    format!("storage key must be 32 bytes, got {}", bytes.len()),
                ));
            }
            Ok(B256::from_slice(&bytes))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AccessListItem {
        address: parse_address(&entry.address)?,
        storage_keys,
    })
}
