use std::{fmt::Display, sync::Arc};

use crate::network::{
    address::{Address, Mask},
    router::RouterId,
    subnet::{Network, NetworkRef},
};

/// A router's binding of a local address to a subnet.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub address: Address,
    /// Link speed in bits per second, as reported by ifSpeed.
    pub speed: u64,
    network: NetworkRef,
}

impl Interface {
    /// Builds the interface together with the transient network derived from `address`/`mask`.
    pub fn new(name: impl Into<String>, address: Address, mask: Mask, speed: u64) -> Self {
        Self {
            name: name.into(),
            address,
            speed,
            network: Network::for_interface(address, mask),
        }
    }

    pub fn network(&self) -> &NetworkRef {
        &self.network
    }

    pub fn mask(&self) -> Mask {
        self.network.mask()
    }

    pub fn speed_mbps(&self) -> u64 {
        self.speed / 1_000_000
    }

    /// Points the interface at the canonical instance of its network.
    /// Returns `false` when it already referenced that instance.
    pub(crate) fn rebind(&mut self, canonical: &NetworkRef) -> bool {
        debug_assert_eq!(self.network.key(), canonical.key());
        if Arc::ptr_eq(&self.network, canonical) {
            return false;
        }
        self.network = Arc::clone(canonical);
        true
    }

    /// Every router attached to this interface's network except `self_router`.
    pub fn peers(&self, self_router: &RouterId) -> Vec<RouterId> {
        self.network.other_routers(self_router)
    }
}

impl Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Name: {}, Ip: {}, {}, Speed: {} Mbps",
            self.name,
            self.address,
            self.network,
            self.speed_mbps()
        )
    }
}
