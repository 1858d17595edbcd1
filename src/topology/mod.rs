/*!
Topology module

Turns a seed address into a finished, queryable topology.

Structure:
- `explorer`: work-list crawl over OSPF neighbors (`Explorer`, `ExploreError`).
- `builder`: merges per-router networks into canonical shared instances.
- `store`: the finished `Topology` and its serializable snapshot.
- `path`: shortest-path search between router addresses.
- `render`: petgraph view of the topology and DOT output.
- `report`: plain-text listings for the command line.
*/

pub mod builder;
pub mod explorer;
pub mod path;
pub mod render;
pub mod report;
pub mod store;

pub use explorer::{ExploreError, Explorer};
pub use path::{PathError, PathFinder};
pub use store::Topology;
