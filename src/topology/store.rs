/*!
This module provides the finished topology produced by a discovery run.

This module defines:
- `Topology`: discovered routers in a stable order plus the canonical networks they share.
- `TopologySnapshot`: a serializable, one-way dump of a `Topology` used by the JSON export.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::{
    address::{Address, Mask},
    router::{RouteEntry, Router, RouterId, StepFailure},
    subnet::{Host, NetworkKey, NetworkRef},
};

/// Discovered routers and the canonical networks connecting them.
#[derive(Debug, Default)]
pub struct Topology {
    routers: Vec<Router>,
    networks: BTreeMap<NetworkKey, NetworkRef>,
    interrupted: bool,
}

impl Topology {
    pub(crate) fn new(
        routers: Vec<Router>,
        networks: BTreeMap<NetworkKey, NetworkRef>,
        interrupted: bool,
    ) -> Self {
        Self {
            routers,
            networks,
            interrupted,
        }
    }

    /// Routers with the seed first, then by name.
    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    /// Canonical networks ordered by (address, mask).
    pub fn networks(&self) -> impl Iterator<Item = &NetworkRef> {
        self.networks.values()
    }

    pub fn network(&self, key: &NetworkKey) -> Option<&NetworkRef> {
        self.networks.get(key)
    }

    pub fn router(&self, id: &RouterId) -> Option<&Router> {
        self.routers.iter().find(|r| &r.id == id)
    }

    /// The router owning an interface with exactly this address, falling back to
    /// the address a router was reached at.
    pub fn router_by_address(&self, address: Address) -> Option<&Router> {
        self.routers
            .iter()
            .find(|r| r.owns_address(address))
            .or_else(|| self.routers.iter().find(|r| r.address == address))
    }

    pub fn seed(&self) -> Option<&Router> {
        self.routers.first()
    }

    /// Whether discovery was stopped by cancellation or the deadline.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn partial_routers(&self) -> impl Iterator<Item = &Router> {
        self.routers.iter().filter(|r| r.is_partial())
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot::from(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub address: Address,
    pub mask: Mask,
    pub speed: u64,
    pub network: NetworkKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterSnapshot {
    pub id: RouterId,
    pub address: Address,
    pub interfaces: Vec<InterfaceSnapshot>,
    pub routes: Vec<RouteEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<StepFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub network: NetworkKey,
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub interrupted: bool,
    pub routers: Vec<RouterSnapshot>,
    pub networks: Vec<NetworkSnapshot>,
}

impl From<&Router> for RouterSnapshot {
    fn from(router: &Router) -> Self {
        Self {
            id: router.id.clone(),
            address: router.address,
            interfaces: router
                .interfaces
                .iter()
                .map(|i| InterfaceSnapshot {
                    name: i.name.clone(),
                    address: i.address,
                    mask: i.mask(),
                    speed: i.speed,
                    network: i.network().key(),
                })
                .collect(),
            routes: router.routes.clone(),
            failures: router.failures.clone(),
        }
    }
}

impl From<&Topology> for TopologySnapshot {
    fn from(topology: &Topology) -> Self {
        Self {
            interrupted: topology.interrupted,
            routers: topology.routers.iter().map(RouterSnapshot::from).collect(),
            networks: topology
                .networks()
                .map(|n| NetworkSnapshot {
                    network: n.key(),
                    hosts: n.hosts(),
                })
                .collect(),
        }
    }
}
