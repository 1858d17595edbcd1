use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
};

use tracing::debug;

use crate::{
    network::{
        router::{Router, RouterId},
        subnet::{NetworkKey, NetworkRef},
    },
    topology::store::Topology,
};

/// Merges the networks each router derived on its own into one shared instance per
/// (address, mask), and records which routers attach to each of them.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    routers: Vec<Router>,
    seed: Option<RouterId>,
    interrupted: bool,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router listed first in the finished topology.
    pub fn seed(mut self, seed: RouterId) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn interrupted(mut self, interrupted: bool) -> Self {
        self.interrupted = interrupted;
        self
    }

    pub fn add_router(&mut self, router: Router) {
        self.routers.push(router);
    }

    pub fn build(self) -> Topology {
        let Self {
            mut routers,
            seed,
            interrupted,
        } = self;

        routers.sort_by(|a, b| {
            let a_seed = seed.as_ref() == Some(&a.id);
            let b_seed = seed.as_ref() == Some(&b.id);
            b_seed.cmp(&a_seed).then_with(|| a.id.cmp(&b.id))
        });

        let mut networks: BTreeMap<NetworkKey, NetworkRef> = BTreeMap::new();
        let mut merged = 0;
        for router in &mut routers {
            for interface in &mut router.interfaces {
                match networks.entry(interface.network().key()) {
                    Entry::Vacant(entry) => {
                        entry.insert(Arc::clone(interface.network()));
                    }
                    Entry::Occupied(entry) => {
                        if interface.rebind(entry.get()) {
                            merged += 1;
                        }
                    }
                }
            }
        }

        for router in &routers {
            for interface in &router.interfaces {
                interface.network().add_host(&router.id, interface.address);
            }
        }

        debug!(
            routers = routers.len(),
            networks = networks.len(),
            merged,
            "canonicalized networks"
        );
        Topology::new(routers, networks, interrupted)
    }
}
