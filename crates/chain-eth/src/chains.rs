use serde::Serialize;

use crate::error::EthError;
use crate::transaction::TxType;

/// A block explorer front-end for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Explorer {
    pub name: &'static str,
    pub url: &'static str,
}

/// Definition of an EVM-compatible blockchain network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub name: &'static str,
    /// Ordered by preference; the first entry is the default endpoint.
    pub rpc_endpoints: &'static [&'static str],
    pub symbol: &'static str,
    pub decimals: u8,
    pub explorers: &'static [Explorer],
    pub faucets: &'static [&'static str],
    pub supports_eip1559: bool,
    pub is_testnet: bool,
}

impl NetworkDescriptor {
    /// Preferred RPC endpoint.
    pub fn rpc_url(&self) -> Option<&'static str> {
        self.rpc_endpoints.first().copied()
    }

    /// Transaction type to build when the caller does not ask for one.
    pub fn default_tx_type(&self) -> TxType {
        if self.supports_eip1559 {
            TxType::FeeMarket
        } else {
            TxType::Legacy
        }
    }
}

/// Ethereum Mainnet (chain ID 1).
pub const ETHEREUM: NetworkDescriptor = NetworkDescriptor {
    chain_id: 1,
    name: "Ethereum Mainnet",
    rpc_endpoints: &["https://cloudflare-eth.com", "https://eth.llamarpc.com"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[Explorer {
        name: "etherscan",
        url: "https://etherscan.io",
    }],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: false,
};

/// BNB Smart Chain (chain ID 56).
pub const BSC: NetworkDescriptor = NetworkDescriptor {
    chain_id: 56,
    name: "BNB Smart Chain",
    rpc_endpoints: &[
        "https://bsc-dataseed1.binance.org",
        "https://bsc-dataseed2.binance.org",
        "https://bsc-dataseed3.binance.org",
    ],
    symbol: "BNB",
    decimals: 18,
    explorers: &[Explorer {
        name: "bscscan",
        url: "https://bscscan.com",
    }],
    faucets: &["https://free-online-app.com/faucet-for-eth-evm-chains/"],
    supports_eip1559: false,
    is_testnet: false,
};

/// Polygon PoS (chain ID 137).
pub const POLYGON: NetworkDescriptor = NetworkDescriptor {
    chain_id: 137,
    name: "Polygon",
    rpc_endpoints: &["https://polygon-rpc.com", "https://polygon-bor.publicnode.com"],
    symbol: "MATIC",
    decimals: 18,
    explorers: &[Explorer {
        name: "polygonscan",
        url: "https://polygonscan.com",
    }],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: false,
};

/// Arbitrum One (chain ID 42161).
pub const ARBITRUM: NetworkDescriptor = NetworkDescriptor {
    chain_id: 42161,
    name: "Arbitrum One",
    rpc_endpoints: &["https://arb1.arbitrum.io/rpc"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[
        Explorer {
            name: "Arbiscan",
            url: "https://arbiscan.io",
        },
        Explorer {
            name: "Arbitrum Explorer",
            url: "https://explorer.arbitrum.io",
        },
    ],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: false,
};

/// Optimism (chain ID 10).
pub const OPTIMISM: NetworkDescriptor = NetworkDescriptor {
    chain_id: 10,
    name: "Optimism",
    rpc_endpoints: &["https://mainnet.optimism.io"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[Explorer {
        name: "etherscan",
        url: "https://optimistic.etherscan.io",
    }],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: false,
};

/// Base (chain ID 8453).
pub const BASE: NetworkDescriptor = NetworkDescriptor {
    chain_id: 8453,
    name: "Base",
    rpc_endpoints: &["https://mainnet.base.org"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[Explorer {
        name: "basescan",
        url: "https://basescan.org",
    }],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: false,
};

/// Avalanche C-Chain (chain ID 43114).
pub const AVALANCHE: NetworkDescriptor = NetworkDescriptor {
    chain_id: 43114,
    name: "Avalanche C-Chain",
    rpc_endpoints: &["https://api.avax.network/ext/bc/C/rpc"],
    symbol: "AVAX",
    decimals: 18,
    explorers: &[Explorer {
        name: "snowtrace",
        url: "https://snowtrace.io",
    }],
    faucets: &["https://free-online-app.com/faucet-for-eth-evm-chains/"],
    supports_eip1559: true,
    is_testnet: false,
};

/// Fantom Opera (chain ID 250).
pub const FANTOM: NetworkDescriptor = NetworkDescriptor {
    chain_id: 250,
    name: "Fantom Opera",
    rpc_endpoints: &["https://rpc.ftm.tools"],
    symbol: "FTM",
    decimals: 18,
    explorers: &[Explorer {
        name: "ftmscan",
        url: "https://ftmscan.com",
    }],
    faucets: &["https://free-online-app.com/faucet-for-eth-evm-chains/"],
    supports_eip1559: false,
    is_testnet: false,
};

/// Sepolia Testnet (chain ID 11155111).
pub const SEPOLIA: NetworkDescriptor = NetworkDescriptor {
    chain_id: 11155111,
    name: "Sepolia",
    rpc_endpoints: &["https://rpc.sepolia.org"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[Explorer {
        name: "etherscan",
        url: "https://sepolia.etherscan.io",
    }],
    faucets: &["https://sepoliafaucet.com"],
    supports_eip1559: true,
    is_testnet: true,
};

/// Polygon Amoy Testnet (chain ID 80002).
pub const POLYGON_AMOY: NetworkDescriptor = NetworkDescriptor {
    chain_id: 80002,
    name: "Polygon Amoy",
    rpc_endpoints: &["https://rpc-amoy.polygon.technology"],
    symbol: "MATIC",
    decimals: 18,
    explorers: &[Explorer {
        name: "polygonscan",
        url: "https://amoy.polygonscan.com",
    }],
    faucets: &["https://faucet.polygon.technology"],
    supports_eip1559: true,
    is_testnet: true,
};

/// Local development node (chain ID 1337).
pub const LOCALHOST: NetworkDescriptor = NetworkDescriptor {
    chain_id: 1337,
    name: "Localhost 8545",
    rpc_endpoints: &["http://127.0.0.1:8545"],
    symbol: "ETH",
    decimals: 18,
    explorers: &[],
    faucets: &[],
    supports_eip1559: true,
    is_testnet: true,
};

/// All supported EVM networks, in menu order.
const ALL_CHAINS: &[&NetworkDescriptor] = &[
    &ETHEREUM,
    &BSC,
    &POLYGON,
    &ARBITRUM,
    &OPTIMISM,
    &BASE,
    &AVALANCHE,
    &FANTOM,
    &SEPOLIA,
    &POLYGON_AMOY,
    &LOCALHOST,
];

/// Network selected when no preference is stored.
pub const DEFAULT_CHAIN: &NetworkDescriptor = &ETHEREUM;

/// Returns the network for a chain ID, or `None` if unsupported.
pub fn get_chain(chain_id: u64) -> Option<&'static NetworkDescriptor> {
    ALL_CHAINS
        .iter()
        .find(|c| c.chain_id == chain_id)
        .copied()
}

/// Like [`get_chain`] but with a typed error for unknown chains.
pub fn require_chain(chain_id: u64) -> Result<&'static NetworkDescriptor, EthError> {
    get_chain(chain_id).ok_or(EthError::UnknownChain(chain_id))
}

/// Returns all supported networks.
pub fn supported_chains() -> Vec<&'static NetworkDescriptor> {
    ALL_CHAINS.to_vec()
}
