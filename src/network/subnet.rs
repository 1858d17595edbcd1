use std::{
    fmt::Display,
    hash::{Hash, Hasher},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
};

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::network::{
    address::{Address, Mask},
    router::RouterId,
};

/// Identity of a subnet: its network address and mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetworkKey {
    pub address: Address,
    pub mask: Mask,
}

impl NetworkKey {
    pub fn new(address: Address, mask: Mask) -> Self {
        Self { address, mask }
    }

    /// Key of the subnet that `address` belongs to under `mask`.
    pub fn containing(address: Address, mask: Mask) -> Self {
        Self::new(address.network_address(mask), mask)
    }

    pub fn to_uuidv5(&self) -> Uuid {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.address.to_bits().to_be_bytes());
        bytes[4..].copy_from_slice(&self.mask.to_bits().to_be_bytes());
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes)
    }

    /// `None` for non-contiguous masks, which `ipnetwork` cannot express.
    pub fn to_ipv4_network(&self) -> Option<Ipv4Network> {
        if !self.mask.is_contiguous() {
            return None;
        }
        Ipv4Network::new(self.address.into(), self.mask.to_cidr()).ok()
    }
}

/// CIDR notation, or address and dotted mask when the mask has no prefix length.
impl Display for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_ipv4_network() {
            Some(network) => write!(f, "{network}"),
            None => write!(f, "{} mask {}", self.address, self.mask),
        }
    }
}

/// A router attached to a network, as observed through one of its interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub router: RouterId,
    /// Address of the first interface seen on the network.
    pub address: Address,
    /// Further addresses the same router holds on the network.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<Address>,
}

impl Host {
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        std::iter::once(self.address).chain(self.secondary.iter().copied())
    }
}

/// A subnet plus the routers that were seen attaching to it.
///
/// Equality and hashing only look at the [`NetworkKey`]; the host set is
/// accumulated during discovery and does not take part in identity.
#[derive(Debug)]
pub struct Network {
    key: NetworkKey,
    hosts: RwLock<Vec<Host>>,
}

pub type NetworkRef = Arc<Network>;

impl Default for NetworkKey {
    fn default() -> Self {
        Self::new(Address::UNSPECIFIED, Mask::DEFAULT)
    }
}

impl Network {
    pub fn new(key: NetworkKey) -> Self {
        Self {
            key,
            hosts: RwLock::new(Vec::new()),
        }
    }

    /// Transient network derived from an interface address and its mask.
    pub fn for_interface(address: Address, mask: Mask) -> NetworkRef {
        Arc::new(Self::new(NetworkKey::containing(address, mask)))
    }

    pub fn key(&self) -> NetworkKey {
        self.key
    }

    pub fn address(&self) -> Address {
        self.key.address
    }

    pub fn mask(&self) -> Mask {
        self.key.mask
    }

    fn read_hosts(&self) -> RwLockReadGuard<'_, Vec<Host>> {
        self.hosts.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `router` as attached. Returns `false` if it already was, in which
    /// case a new `address` is kept as one of its secondary addresses.
    pub fn add_host(&self, router: &RouterId, address: Address) -> bool {
        let mut hosts = self.hosts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(host) = hosts.iter_mut().find(|h| &h.router == router) {
            if !host.addresses().any(|a| a == address) {
                host.secondary.push(address);
            }
            return false;
        }
        hosts.push(Host {
            router: router.clone(),
            address,
            secondary: Vec::new(),
        });
        true
    }

    /// Snapshot of the attached hosts in attachment order.
    pub fn hosts(&self) -> Vec<Host> {
        self.read_hosts().clone()
    }

    pub fn host_count(&self) -> usize {
        self.read_hosts().len()
    }

    /// Membership in the recorded host set. This is not a range check:
    /// an address inside the subnet that no discovered router uses is not contained.
    pub fn contains(&self, address: Address) -> bool {
        self.read_hosts().iter().any(|h| h.addresses().any(|a| a == address))
    }

    pub fn has_router(&self, router: &RouterId) -> bool {
        self.read_hosts().iter().any(|h| &h.router == router)
    }

    /// Routers attached to this network other than `router`, in attachment order.
    pub fn other_routers(&self, router: &RouterId) -> Vec<RouterId> {
        self.read_hosts()
            .iter()
            .filter(|h| &h.router != router)
            .map(|h| h.router.clone())
            .collect()
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Network {}

impl Hash for Network {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Network: {}", self.key)
    }
}
