use chain_eth::chains::{self, NetworkDescriptor, DEFAULT_CHAIN};
use chain_eth::error::EthError;
use parking_lot::RwLock;
use tracing::{info, warn};

/// The selected network over the static catalog.
///
/// Switching only changes the selection. Connecting a provider for the new
/// chain and reloading per-chain state is up to the caller.
#[derive(Debug)]
pub struct NetworkRegistry {
    active: RwLock<&'static NetworkDescriptor>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NetworkRegistry {
    /// Starts on `preferred`, or the default network if it is unset or unknown.
    pub fn new(preferred: Option<u64>) -> Self {
        let active = match preferred.map(|id| (id, chains::get_chain(id))) {
            Some((_, Some(network))) => network,
            Some((id, None)) => {
                warn!(
                    "Unknown preferred chain {}, falling back to {}",
                    id, DEFAULT_CHAIN.name
                );
                DEFAULT_CHAIN
            }
            None => DEFAULT_CHAIN,
        };
        Self {
            active: RwLock::new(active),
        }
    }

    pub fn list_networks(&self) -> Vec<&'static NetworkDescriptor> {
        chains::supported_chains()
    }

    pub fn active(&self) -> &'static NetworkDescriptor {
        *self.active.read()
    }

    pub fn get(&self, chain_id: u64) -> Result<&'static NetworkDescriptor, EthError> {
        chains::require_chain(chain_id)
    }

    /// Selects `chain_id`. The previous selection stays if the id is unknown.
    pub fn switch_to(&self, chain_id: u64) -> Result<&'static NetworkDescriptor, EthError> {
        let network = chains::require_chain(chain_id)?;
        let previous = std::mem::replace(&mut *self.active.write(), network);
        info!(
            "Switched network: from={} ({}), to={} ({})",
            previous.name, previous.chain_id, network.name, network.chain_id
        );
        Ok(network)
    }
}
