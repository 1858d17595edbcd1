use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    data_aquisition::{
        core::{QueryClient, QueryError, QueryResult, QueryValue},
        oids,
    },
    network::{
        address::{Address, Mask},
        interface::Interface,
        subnet::NetworkKey,
    },
};

/// Router identity: the system name the device reports, not any of its addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterId(String);

impl RouterId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_uuidv5(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.0.as_bytes())
    }
}

impl From<&str> for RouterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Display for RouterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ipCidrRouteType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    Other,
    Reject,
    Local,
    Remote,
    Unknown(i64),
}

impl From<i64> for RouteType {
    fn from(value: i64) -> Self {
        match value {
            1 => RouteType::Other,
            2 => RouteType::Reject,
            3 => RouteType::Local,
            4 => RouteType::Remote,
            other => RouteType::Unknown(other),
        }
    }
}

impl Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteType::Other => write!(f, "other"),
            RouteType::Reject => write!(f, "reject"),
            RouteType::Local => write!(f, "local"),
            RouteType::Remote => write!(f, "remote"),
            RouteType::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: NetworkKey,
    pub next_hop: Address,
    pub route_type: RouteType,
}

impl Display for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Network: {:15} Netmask: {:15} Next hop: {:15} Type: {}",
            self.destination.address.to_string(),
            self.destination.mask.to_string(),
            self.next_hop.to_string(),
            self.route_type
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStep {
    Identity,
    Interfaces,
    Routes,
    Neighbors,
}

impl Display for DiscoveryStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DiscoveryStep::Identity => "identity",
            DiscoveryStep::Interfaces => "interfaces",
            DiscoveryStep::Routes => "routes",
            DiscoveryStep::Neighbors => "neighbors",
        };
        write!(f, "{name}")
    }
}

/// A step of discovery that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: DiscoveryStep,
    pub reason: String,
}

/// Represents a router discovered in the network.
#[derive(Debug, Clone)]
pub struct Router {
    pub id: RouterId,
    /// Address the router was reached at.
    pub address: Address,
    pub interfaces: Vec<Interface>,
    pub routes: Vec<RouteEntry>,
    pub failures: Vec<StepFailure>,
}

/// Separates "the agent does not have this object" from "the agent did not answer".
fn optional(result: QueryResult<QueryValue>) -> QueryResult<Option<QueryValue>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_transient() => Err(e),
        Err(e) => {
            debug!(error = %e, "object missing");
            Ok(None)
        }
    }
}

impl Router {
    /// Provisional router, known only by the address it was observed at.
    pub fn new(address: Address) -> Self {
        Self {
            id: RouterId::default(),
            address,
            interfaces: Vec::new(),
            routes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_identified(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn mark_partial(&mut self, step: DiscoveryStep, error: &QueryError) {
        warn!(router = %self.id, address = %self.address, %step, %error, "discovery step failed");
        self.failures.push(StepFailure {
            step,
            reason: error.to_string(),
        });
    }

    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
    }

    pub fn add_route(&mut self, route: RouteEntry) {
        self.routes.push(route);
    }

    /// Whether one of the router's interfaces carries exactly `address`.
    pub fn owns_address(&self, address: Address) -> bool {
        self.interfaces.iter().any(|i| i.address == address)
    }

    pub fn networks(&self) -> Vec<NetworkKey> {
        self.interfaces.iter().map(|i| i.network().key()).collect()
    }

    /// Routers sharing a network with this one, in interface order, without repeats.
    pub fn adjacent_routers(&self) -> Vec<RouterId> {
        let mut adjacent: Vec<RouterId> = Vec::new();
        for peer in self.interfaces.iter().flat_map(|i| i.peers(&self.id)) {
            if !adjacent.contains(&peer) {
                adjacent.push(peer);
            }
        }
        adjacent
    }

    /// Two routers are neighbors if they have an interface on the same network.
    pub fn is_neighbor(&self, other: &Router) -> bool {
        let theirs = other.networks();
        self.networks().iter().any(|n| theirs.contains(n))
    }

    /// Names the router after the address it answered on, for agents without a usable sysName.
    pub fn name_by_address(&mut self) {
        self.id = RouterId::new(self.address.to_string());
    }

    /// Resolves the router's name (sysName.0).
    pub async fn fetch_identity(&mut self, client: &dyn QueryClient) -> QueryResult<&RouterId> {
        let name = client.get(oids::SYS_NAME).await?.as_text();
        let name = name.trim();
        if name.is_empty() {
            self.name_by_address();
        } else {
            self.id = RouterId::new(name);
        }
        debug!(address = %self.address, router = %self.id, "identified router");
        Ok(&self.id)
    }

    /// Reads every local address binding and keeps the interfaces that are up and not loopbacks.
    pub async fn fetch_interfaces(&mut self, client: &dyn QueryClient) -> QueryResult<usize> {
        let bindings = client.walk(oids::IP_AD_ENT_IF_INDEX).await?;
        let mut added = 0;
        for binding in bindings {
            let address: Address = match binding.index.parse() {
                Ok(address) => address,
                Err(e) => {
                    warn!(router = %self.id, index = %binding.index, error = %e, "skipping malformed address binding");
                    continue;
                }
            };
            let Some(if_index) = binding.value.as_integer() else {
                warn!(router = %self.id, %address, value = ?binding.value, "binding without interface index");
                continue;
            };
            let if_index = if_index.to_string();

            let description = optional(client.get(&oids::instance(oids::IF_DESCR, &if_index)).await)?;
            let mask = optional(client.get(&oids::instance(oids::IP_AD_ENT_NET_MASK, &binding.index)).await)?;
            let speed = optional(client.get(&oids::instance(oids::IF_SPEED, &if_index)).await)?;
            let if_type = optional(client.get(&oids::instance(oids::IF_TYPE, &if_index)).await)?;
            let status = optional(client.get(&oids::instance(oids::IF_OPER_STATUS, &if_index)).await)?;

            let if_type = if_type.as_ref().and_then(QueryValue::as_integer);
            let status = status.as_ref().and_then(QueryValue::as_integer);
            if if_type == Some(oids::IF_TYPE_SOFTWARE_LOOPBACK) || status == Some(oids::IF_STATUS_DOWN) {
                debug!(router = %self.id, %address, ?if_type, ?status, "ignoring loopback or down interface");
                continue;
            }

            let mask: Mask = match mask.as_ref().map(QueryValue::as_address) {
                Some(Ok(mask)) => mask.into(),
                Some(Err(e)) => {
                    warn!(router = %self.id, %address, error = %e, "skipping interface with malformed mask");
                    continue;
                }
                None => {
                    warn!(router = %self.id, %address, "skipping interface without mask");
                    continue;
                }
            };
            let name = description.map(|d| d.as_text()).unwrap_or_default();
            let speed = speed
                .and_then(|s| s.as_integer())
                .and_then(|s| u64::try_from(s).ok())
                .unwrap_or(0);

            self.add_interface(Interface::new(name, address, mask, speed));
            added += 1;
        }
        debug!(router = %self.id, interfaces = added, "fetched interfaces");
        Ok(added)
    }

    /// Reads the CIDR routing table, keeping the agent's enumeration order.
    pub async fn fetch_routes(&mut self, client: &dyn QueryClient) -> QueryResult<usize> {
        let destinations = client.walk(oids::IP_CIDR_ROUTE_DEST).await?;
        let mut added = 0;
        for row in destinations {
            let destination = match row.value.as_address() {
                Ok(destination) => destination,
                Err(e) => {
                    warn!(router = %self.id, index = %row.index, error = %e, "skipping malformed route");
                    continue;
                }
            };
            let mask = optional(client.get(&oids::instance(oids::IP_CIDR_ROUTE_MASK, &row.index)).await)?;
            let next_hop = optional(client.get(&oids::instance(oids::IP_CIDR_ROUTE_NEXT_HOP, &row.index)).await)?;
            let mask = mask.as_ref().map(QueryValue::as_address);
            let next_hop = next_hop.as_ref().map(QueryValue::as_address);
            let (mask, next_hop) = match (mask, next_hop) {
                (Some(Ok(mask)), Some(Ok(next_hop))) => (mask, next_hop),
                (Some(Err(e)), _) | (_, Some(Err(e))) => {
                    warn!(router = %self.id, index = %row.index, error = %e, "skipping malformed route");
                    continue;
                }
                _ => {
                    warn!(router = %self.id, index = %row.index, "skipping route without mask or next hop");
                    continue;
                }
            };
            let route_type = optional(client.get(&oids::instance(oids::IP_CIDR_ROUTE_TYPE, &row.index)).await)?
                .and_then(|t| t.as_integer())
                .map_or(RouteType::Unknown(0), RouteType::from);

            self.add_route(RouteEntry {
                destination: NetworkKey::new(destination, mask.into()),
                next_hop,
                route_type,
            });
            added += 1;
        }
        debug!(router = %self.id, routes = added, "fetched routing table");
        Ok(added)
    }

    /// Raw OSPF neighbor addresses. Duplicates are passed through as reported.
    pub async fn discover_neighbors(&self, client: &dyn QueryClient) -> QueryResult<Vec<Address>> {
        let rows = client.walk(oids::OSPF_NBR_IP_ADDR).await?;
        let neighbors = rows
            .into_iter()
            .filter_map(|row| match row.value.as_address() {
                Ok(address) => Some(address),
                Err(e) => {
                    warn!(router = %self.id, index = %row.index, error = %e, "skipping malformed neighbor");
                    None
                }
            })
            .collect::<Vec<_>>();
        debug!(router = %self.id, neighbors = neighbors.len(), "read OSPF neighbors");
        Ok(neighbors)
    }
}

impl PartialEq for Router {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Router {}

impl Display for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name: {}, Address: {}", self.id, self.address)?;
        if self.is_partial() {
            let steps: Vec<String> = self.failures.iter().map(|s| s.step.to_string()).collect();
            write!(f, " (partial: {})", steps.join(", "))?;
        }
        write!(f, ", Interfaces:")?;
        for interface in &self.interfaces {
            write!(f, "\n  {interface}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_aquisition::replay::ReplayConnector;

    const R1: &str = r#"{
        "devices": {
            "10.0.12.1": {
                "objects": {
                    "1.3.6.1.2.1.1.5.0": { "type": "text", "value": "R1" },

                    "1.3.6.1.2.1.4.20.1.2.10.0.12.1": { "type": "integer", "value": 1 },
                    "1.3.6.1.2.1.4.20.1.2.10.0.13.1": { "type": "integer", "value": 2 },
                    "1.3.6.1.2.1.4.20.1.2.127.0.0.1": { "type": "integer", "value": 3 },
                    "1.3.6.1.2.1.4.20.1.2.10.9.9.1": { "type": "integer", "value": 4 },
                    "1.3.6.1.2.1.4.20.1.3.10.0.12.1": { "type": "ip_address", "value": "255.255.255.252" },
                    "1.3.6.1.2.1.4.20.1.3.10.0.13.1": { "type": "ip_address", "value": "255.255.255.0" },
                    "1.3.6.1.2.1.4.20.1.3.127.0.0.1": { "type": "ip_address", "value": "255.0.0.0" },
                    "1.3.6.1.2.1.4.20.1.3.10.9.9.1": { "type": "ip_address", "value": "255.255.255.0" },

                    "1.3.6.1.2.1.2.2.1.2.1": { "type": "text", "value": "GigabitEthernet0/0" },
                    "1.3.6.1.2.1.2.2.1.2.2": { "type": "text", "value": "GigabitEthernet0/1" },
                    "1.3.6.1.2.1.2.2.1.2.3": { "type": "text", "value": "Loopback0" },
                    "1.3.6.1.2.1.2.2.1.2.4": { "type": "text", "value": "GigabitEthernet0/2" },
                    "1.3.6.1.2.1.2.2.1.3.1": { "type": "integer", "value": 6 },
                    "1.3.6.1.2.1.2.2.1.3.2": { "type": "integer", "value": 6 },
                    "1.3.6.1.2.1.2.2.1.3.3": { "type": "integer", "value": 24 },
                    "1.3.6.1.2.1.2.2.1.3.4": { "type": "integer", "value": 6 },
                    "1.3.6.1.2.1.2.2.1.5.1": { "type": "unsigned32", "value": 1000000000 },
                    "1.3.6.1.2.1.2.2.1.5.2": { "type": "unsigned32", "value": 100000000 },
                    "1.3.6.1.2.1.2.2.1.8.1": { "type": "integer", "value": 1 },
                    "1.3.6.1.2.1.2.2.1.8.2": { "type": "integer", "value": 1 },
                    "1.3.6.1.2.1.2.2.1.8.3": { "type": "integer", "value": 1 },
                    "1.3.6.1.2.1.2.2.1.8.4": { "type": "integer", "value": 2 },

                    "1.3.6.1.2.1.4.24.4.1.1.10.0.12.0.255.255.255.252.0.0.0.0.0": { "type": "ip_address", "value": "10.0.12.0" },
                    "1.3.6.1.2.1.4.24.4.1.1.10.0.23.0.255.255.255.252.0.10.0.12.2": { "type": "ip_address", "value": "10.0.23.0" },
                    "1.3.6.1.2.1.4.24.4.1.2.10.0.12.0.255.255.255.252.0.0.0.0.0": { "type": "ip_address", "value": "255.255.255.252" },
                    "1.3.6.1.2.1.4.24.4.1.2.10.0.23.0.255.255.255.252.0.10.0.12.2": { "type": "ip_address", "value": "255.255.255.252" },
                    "1.3.6.1.2.1.4.24.4.1.4.10.0.12.0.255.255.255.252.0.0.0.0.0": { "type": "ip_address", "value": "0.0.0.0" },
                    "1.3.6.1.2.1.4.24.4.1.4.10.0.23.0.255.255.255.252.0.10.0.12.2": { "type": "ip_address", "value": "10.0.12.2" },
                    "1.3.6.1.2.1.4.24.4.1.6.10.0.12.0.255.255.255.252.0.0.0.0.0": { "type": "integer", "value": 3 },
                    "1.3.6.1.2.1.4.24.4.1.6.10.0.23.0.255.255.255.252.0.10.0.12.2": { "type": "integer", "value": 4 },

                    "1.3.6.1.2.1.14.10.1.1.10.0.12.2.0": { "type": "ip_address", "value": "10.0.12.2" },
                    "1.3.6.1.2.1.14.10.1.1.10.0.13.3.0": { "type": "ip_address", "value": "10.0.13.3" },
                    "1.3.6.1.2.1.14.10.1.1.10.0.13.4.0": { "type": "ip_address", "value": "10.0.12.2" }
                }
            }
        }
    }"#;

    fn client() -> crate::data_aquisition::replay::ReplayClient {
        ReplayConnector::from_json(R1)
            .unwrap()
            .client("10.0.12.1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_fetch_identity() {
        let mut router = Router::new("10.0.12.1".parse().unwrap());
        assert!(!router.is_identified());
        router.fetch_identity(&client()).await.unwrap();
        assert_eq!(router.id, RouterId::from("R1"));
    }

    #[tokio::test]
    async fn test_fetch_interfaces_skips_loopback_and_down() {
        let mut router = Router::new("10.0.12.1".parse().unwrap());
        router.fetch_identity(&client()).await.unwrap();
        let added = router.fetch_interfaces(&client()).await.unwrap();

        assert_eq!(added, 2);
        let names: Vec<_> = router.interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["GigabitEthernet0/0", "GigabitEthernet0/1"]);
        assert_eq!(router.interfaces[0].network().key().to_string(), "10.0.12.0/30");
        assert_eq!(router.interfaces[1].speed_mbps(), 100);
        assert!(router.owns_address("10.0.13.1".parse().unwrap()));
        assert!(!router.owns_address("127.0.0.1".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_routes_in_table_order() {
        let mut router = Router::new("10.0.12.1".parse().unwrap());
        router.fetch_routes(&client()).await.unwrap();

        assert_eq!(router.routes.len(), 2);
        assert_eq!(router.routes[0].destination.to_string(), "10.0.12.0/30");
        assert_eq!(router.routes[0].route_type, RouteType::Local);
        assert!(router.routes[0].next_hop.is_unspecified());
        assert_eq!(router.routes[1].next_hop.to_string(), "10.0.12.2");
        assert_eq!(router.routes[1].route_type, RouteType::Remote);
    }

    #[tokio::test]
    async fn test_fetch_routes_skips_malformed_row() {
        let json = r#"{
            "devices": {
                "10.0.0.1": {
                    "objects": {
                        "1.3.6.1.2.1.4.24.4.1.1.10.1.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "10.1.0.0" },
                        "1.3.6.1.2.1.4.24.4.1.1.10.2.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "10.2.0.0" },
                        "1.3.6.1.2.1.4.24.4.1.1.10.3.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "10.3.0.0" },
                        "1.3.6.1.2.1.4.24.4.1.2.10.1.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "255.255.255.0" },
                        "1.3.6.1.2.1.4.24.4.1.2.10.2.0.0.255.255.255.0.0.0.0.0.0": { "type": "text", "value": "garbage" },
                        "1.3.6.1.2.1.4.24.4.1.2.10.3.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "255.255.255.0" },
                        "1.3.6.1.2.1.4.24.4.1.4.10.1.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "0.0.0.0" },
                        "1.3.6.1.2.1.4.24.4.1.4.10.2.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "0.0.0.0" },
                        "1.3.6.1.2.1.4.24.4.1.4.10.3.0.0.255.255.255.0.0.0.0.0.0": { "type": "ip_address", "value": "10.1.0.2" }
                    }
                }
            }
        }"#;
        let client = ReplayConnector::from_json(json).unwrap().client("10.0.0.1".parse().unwrap());
        let mut router = Router::new("10.0.0.1".parse().unwrap());

        assert_eq!(router.fetch_routes(&client).await.unwrap(), 2);
        let destinations: Vec<String> = router.routes.iter().map(|r| r.destination.to_string()).collect();
        assert_eq!(destinations, ["10.1.0.0/24", "10.3.0.0/24"]);
        assert_eq!(router.routes[1].next_hop.to_string(), "10.1.0.2");
        assert_eq!(router.routes[0].route_type, RouteType::Unknown(0));
    }

    #[tokio::test]
    async fn test_discover_neighbors_keeps_duplicates() {
        let router = Router::new("10.0.12.1".parse().unwrap());
        let neighbors = router.discover_neighbors(&client()).await.unwrap();
        let neighbors: Vec<String> = neighbors.iter().map(Address::to_string).collect();
        assert_eq!(neighbors, ["10.0.12.2", "10.0.13.3", "10.0.12.2"]);
    }

    #[test]
    fn test_equality_is_by_name() {
        let mut a = Router::new("10.0.0.1".parse().unwrap());
        let mut b = Router::new("10.9.9.9".parse().unwrap());
        a.id = RouterId::from("R1");
        b.id = RouterId::from("R1");
        assert_eq!(a, b);
    }

    #[test]
    fn test_is_neighbor_by_shared_network() {
        let mut a = Router::new("10.0.12.1".parse().unwrap());
        let mut b = Router::new("10.0.12.2".parse().unwrap());
        let mask: Mask = "255.255.255.252".parse().unwrap();
        a.add_interface(Interface::new("e0", "10.0.12.1".parse().unwrap(), mask, 0));
        b.add_interface(Interface::new("e0", "10.0.12.2".parse().unwrap(), mask, 0));
        assert!(a.is_neighbor(&b));

        let mut c = Router::new("10.0.99.2".parse().unwrap());
        c.add_interface(Interface::new("e0", "10.0.99.2".parse().unwrap(), mask, 0));
        assert!(!a.is_neighbor(&c));
    }
}
