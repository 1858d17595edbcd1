use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::{
    network::{address::Address, router::Router},
    topology::store::Topology,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("no discovered router has address {0}")]
    UnknownOrigin(Address),
    #[error("no discovered router has interface address {0}")]
    UnknownDestination(Address),
    #[error("{destination} is not reachable from {origin}")]
    Unreachable { origin: Address, destination: Address },
}

impl Router {
    /// Breadth-first search from this router to the router owning `destination`.
    ///
    /// Routers are adjacent when they were recorded on a common network. The
    /// returned path starts with this router and ends with the owner of
    /// `destination`; it is empty when no such router can be reached.
    pub fn shortest_path<'t>(&self, topology: &'t Topology, destination: Address) -> Vec<&'t Router> {
        let Some(origin) = topology.router(&self.id) else {
            return Vec::new();
        };

        let mut predecessors: HashMap<Address, Option<&'t Router>> = HashMap::from([(origin.address, None)]);
        let mut queue = VecDeque::from([origin]);

        while let Some(current) = queue.pop_front() {
            if current.owns_address(destination) {
                let mut path = vec![current];
                let mut cursor = current;
                while let Some(&Some(previous)) = predecessors.get(&cursor.address) {
                    path.push(previous);
                    cursor = previous;
                }
                path.reverse();
                return path;
            }

            for peer in current.adjacent_routers() {
                let Some(peer) = topology.router(&peer) else {
                    continue;
                };
                if predecessors.contains_key(&peer.address) {
                    continue;
                }
                predecessors.insert(peer.address, Some(current));
                queue.push_back(peer);
            }
        }

        Vec::new()
    }
}

/// Answers path queries between addresses of a discovered topology.
pub struct PathFinder<'t> {
    topology: &'t Topology,
}

impl<'t> PathFinder<'t> {
    pub fn new(topology: &'t Topology) -> Self {
        Self { topology }
    }

    pub fn shortest_path(&self, origin: Address, destination: Address) -> Result<Vec<&'t Router>, PathError> {
        let from = self
            .topology
            .router_by_address(origin)
            .ok_or(PathError::UnknownOrigin(origin))?;
        if !self.topology.routers().iter().any(|r| r.owns_address(destination)) {
            return Err(PathError::UnknownDestination(destination));
        }
        let path = from.shortest_path(self.topology, destination);
        if path.is_empty() {
            return Err(PathError::Unreachable { origin, destination });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ExplorerConfig,
        data_aquisition::replay::ReplayConnector,
        network::{interface::Interface, router::RouterId},
        topology::{builder::TopologyBuilder, explorer::Explorer},
    };

    async fn discover(fixture: &str, seed: &str) -> Topology {
        let connector = ReplayConnector::from_json(fixture).unwrap();
        Explorer::new(Arc::new(connector), ExplorerConfig::default())
            .explore(seed.parse().unwrap())
            .await
            .unwrap()
    }

    fn names(path: &[&Router]) -> Vec<String> {
        path.iter().map(|r| r.id.to_string()).collect()
    }

    #[tokio::test]
    async fn test_chain_path() {
        let topology = discover(include_str!("../../test_data/chain.json"), "10.0.12.1").await;
        let r1 = topology.router(&RouterId::from("R1")).unwrap();

        let path = r1.shortest_path(&topology, "192.168.3.1".parse().unwrap());
        assert_eq!(names(&path), ["R1", "R2", "R3"]);

        let path = r1.shortest_path(&topology, "10.0.23.1".parse().unwrap());
        assert_eq!(names(&path), ["R1", "R2"]);
    }

    #[tokio::test]
    async fn test_path_to_own_address() {
        let topology = discover(include_str!("../../test_data/chain.json"), "10.0.12.1").await;
        let r1 = topology.router(&RouterId::from("R1")).unwrap();
        let path = r1.shortest_path(&topology, "192.168.1.1".parse().unwrap());
        assert_eq!(names(&path), ["R1"]);
    }

    #[tokio::test]
    async fn test_unreachable_is_empty() {
        let topology = discover(include_str!("../../test_data/chain.json"), "10.0.12.1").await;
        let r1 = topology.router(&RouterId::from("R1")).unwrap();
        // Loopbacks and down interfaces are never recorded
        assert!(r1.shortest_path(&topology, "3.3.3.3".parse().unwrap()).is_empty());
        assert!(r1.shortest_path(&topology, "172.16.0.1".parse().unwrap()).is_empty());
        // Inside a known subnet, but nobody owns it
        assert!(r1.shortest_path(&topology, "192.168.3.77".parse().unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_multi_access_network_is_one_hop() {
        let topology = discover(include_str!("../../test_data/shared.json"), "192.168.0.2").await;
        let finder = PathFinder::new(&topology);
        let path = finder
            .shortest_path("192.168.0.2".parse().unwrap(), "10.3.0.1".parse().unwrap())
            .unwrap();
        assert_eq!(names(&path), ["R2", "R3"]);
    }

    #[tokio::test]
    async fn test_path_finder_reasons() {
        let topology = discover(include_str!("../../test_data/chain.json"), "10.0.12.1").await;
        let finder = PathFinder::new(&topology);

        let path = finder
            .shortest_path("10.0.12.1".parse().unwrap(), "192.168.3.1".parse().unwrap())
            .unwrap();
        assert_eq!(names(&path), ["R1", "R2", "R3"]);

        assert_eq!(
            finder.shortest_path("8.8.8.8".parse().unwrap(), "192.168.3.1".parse().unwrap()),
            Err(PathError::UnknownOrigin("8.8.8.8".parse().unwrap()))
        );
        assert_eq!(
            finder.shortest_path("10.0.12.1".parse().unwrap(), "8.8.8.8".parse().unwrap()),
            Err(PathError::UnknownDestination("8.8.8.8".parse().unwrap()))
        );
    }

    #[test]
    fn test_disconnected_islands() {
        let mask = "255.255.255.252".parse().unwrap();
        let mut a = Router::new("10.0.0.1".parse().unwrap());
        a.id = RouterId::from("A");
        a.add_interface(Interface::new("e0", "10.0.0.1".parse().unwrap(), mask, 0));
        let mut b = Router::new("10.9.0.1".parse().unwrap());
        b.id = RouterId::from("B");
        b.add_interface(Interface::new("e0", "10.9.0.1".parse().unwrap(), mask, 0));

        let mut builder = TopologyBuilder::new();
        builder.add_router(a);
        builder.add_router(b);
        let topology = builder.build();

        let finder = PathFinder::new(&topology);
        let origin = "10.0.0.1".parse().unwrap();
        let destination = "10.9.0.1".parse().unwrap();
        assert_eq!(
            finder.shortest_path(origin, destination),
            Err(PathError::Unreachable { origin, destination })
        );
    }
}
