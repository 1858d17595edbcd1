use std::collections::HashMap;

use petgraph::{
    Undirected,
    dot::{Config, Dot},
    graph::NodeIndex,
    stable_graph::{EdgeReference, StableGraph},
};
use uuid::Uuid;

use crate::{network::subnet::NetworkKey, topology::store::Topology};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderNodeKind {
    Router { partial: bool },
    /// Stand-in for a subnet shared by more than two routers.
    Network,
}

#[derive(Debug, Clone)]
pub struct RenderNode {
    pub id: Uuid,
    pub label: String,
    pub kind: RenderNodeKind,
}

/// Edge labeled by the network it runs over.
#[derive(Debug, Clone)]
pub struct RenderEdge {
    pub network: NetworkKey,
}

/// Graph form of a [`Topology`] for drawing.
///
/// Every router becomes a node. Subnets with exactly two routers become a
/// direct edge between them, larger subnets get a node of their own with an
/// edge to each attached router. Subnets seen by a single router are left out.
pub struct TopologyGraph {
    pub graph: StableGraph<RenderNode, RenderEdge, Undirected>,
    pub node_id_to_index_map: HashMap<Uuid, NodeIndex>,
}

impl TopologyGraph {
    pub fn build(topology: &Topology) -> Self {
        let mut graph = StableGraph::default();
        let mut node_id_to_index_map = HashMap::new();

        for router in topology.routers() {
            let id = router.id.to_uuidv5();
            let index = graph.add_node(RenderNode {
                id,
                label: router.id.to_string(),
                kind: RenderNodeKind::Router {
                    partial: router.is_partial(),
                },
            });
            node_id_to_index_map.insert(id, index);
        }

        for network in topology.networks() {
            let key = network.key();
            let attached: Vec<NodeIndex> = network
                .hosts()
                .iter()
                .filter_map(|h| node_id_to_index_map.get(&h.router.to_uuidv5()).copied())
                .collect();

            match attached.as_slice() {
                [] | [_] => {}
                [a, b] => {
                    graph.add_edge(*a, *b, RenderEdge { network: key });
                }
                routers => {
                    let id = key.to_uuidv5();
                    let net_index = graph.add_node(RenderNode {
                        id,
                        label: key.to_string(),
                        kind: RenderNodeKind::Network,
                    });
                    node_id_to_index_map.insert(id, net_index);
                    for router in routers {
                        graph.add_edge(*router, net_index, RenderEdge { network: key });
                    }
                }
            }
        }

        Self {
            graph,
            node_id_to_index_map,
        }
    }

    pub fn node_index(&self, id: &Uuid) -> Option<NodeIndex> {
        self.node_id_to_index_map.get(id).copied()
    }

    /// Graphviz DOT text.
    pub fn to_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge: EdgeReference<'_, RenderEdge>| format!("label = {:?} ", edge.weight().network.to_string()),
            &|_, (_, node): (NodeIndex, &RenderNode)| {
                let shape = match node.kind {
                    RenderNodeKind::Router { partial: false } => "shape = box ",
                    RenderNodeKind::Router { partial: true } => "shape = box style = dashed ",
                    RenderNodeKind::Network => "shape = ellipse ",
                };
                format!("label = {:?} {shape}", node.label)
            },
        );
        format!("{dot:?}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::ExplorerConfig, data_aquisition::replay::ReplayConnector, network::router::RouterId,
        topology::explorer::Explorer,
    };

    async fn discover(fixture: &str, seed: &str) -> Topology {
        let connector = ReplayConnector::from_json(fixture).unwrap();
        Explorer::new(Arc::new(connector), ExplorerConfig::default())
            .explore(seed.parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_point_to_point_links_are_direct_edges() {
        let topology = discover(include_str!("../../test_data/chain.json"), "10.0.12.1").await;
        let rendered = TopologyGraph::build(&topology);

        // Three routers, stub LANs left out
        assert_eq!(rendered.graph.node_count(), 3);
        assert_eq!(rendered.graph.edge_count(), 2);
        let r1 = rendered.node_index(&RouterId::from("R1").to_uuidv5()).unwrap();
        let r2 = rendered.node_index(&RouterId::from("R2").to_uuidv5()).unwrap();
        let edge = rendered.graph.find_edge(r1, r2).unwrap();
        assert_eq!(rendered.graph[edge].network.to_string(), "10.0.12.0/30");
    }

    #[tokio::test]
    async fn test_shared_subnet_gets_its_own_node() {
        let topology = discover(include_str!("../../test_data/shared.json"), "192.168.0.1").await;
        let rendered = TopologyGraph::build(&topology);

        // R1..R3 plus 192.168.0.0/24
        assert_eq!(rendered.graph.node_count(), 4);
        // Three spokes plus the R1-R3 point-to-point link
        assert_eq!(rendered.graph.edge_count(), 4);

        let lan = NetworkKey::new("192.168.0.0".parse().unwrap(), "255.255.255.0".parse().unwrap());
        let lan_index = rendered.node_index(&lan.to_uuidv5()).unwrap();
        assert_eq!(rendered.graph[lan_index].kind, RenderNodeKind::Network);
        assert_eq!(rendered.graph.neighbors(lan_index).count(), 3);
    }

    #[tokio::test]
    async fn test_dot_output() {
        let topology = discover(include_str!("../../test_data/shared.json"), "192.168.0.1").await;
        let dot = TopologyGraph::build(&topology).to_dot();

        assert!(dot.starts_with("graph {"));
        assert!(dot.contains(r#"label = "R1" shape = box"#));
        assert!(dot.contains(r#"label = "192.168.0.0/24" shape = ellipse"#));
        assert!(dot.contains(r#"label = "10.0.13.0/30""#));
    }
}
