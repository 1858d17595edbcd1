/*!
Crawl of the routed network starting from a seed device.

Every reachable router is visited once: its identity is resolved first and
checked against the set of known names, and only unseen routers are
populated (interfaces, routes) and asked for their OSPF neighbors. Each
neighbor address becomes a new task on the work list.
*/

use std::{collections::HashSet, future::Future, sync::Arc};

use thiserror::Error;
use tokio::{
    sync::{Mutex, Semaphore, watch},
    task::JoinSet,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    config::ExplorerConfig,
    data_aquisition::core::{Connector, QueryError, QueryResult},
    network::{
        address::Address,
        router::{DiscoveryStep, Router, RouterId},
    },
    topology::{builder::TopologyBuilder, store::Topology},
};

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("seed {address} could not be identified: {source}")]
    Seed {
        address: Address,
        #[source]
        source: QueryError,
    },
    #[error("discovery task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of visiting one address.
enum Visit {
    /// The router answering there was already discovered through another address.
    Known(RouterId),
    Discovered {
        router: Router,
        neighbors: Vec<Address>,
    },
}

type VisitedSet = Arc<Mutex<HashSet<RouterId>>>;

pub struct Explorer {
    connector: Arc<dyn Connector>,
    config: ExplorerConfig,
    cancel: Option<watch::Receiver<bool>>,
}

impl Explorer {
    pub fn new(connector: Arc<dyn Connector>, config: ExplorerConfig) -> Self {
        Self {
            connector,
            config,
            cancel: None,
        }
    }

    /// Discovery stops once `true` is sent on the channel.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Resolves once discovery should stop. Never resolves without a signal or deadline.
    fn stop_signal(&self) -> impl Future<Output = ()> + use<> {
        let cancel = self.cancel.clone();
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        async move {
            let cancelled = async move {
                match cancel {
                    Some(mut rx) => {
                        if rx.wait_for(|&stop| stop).await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    }
                    None => std::future::pending::<()>().await,
                }
            };
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = cancelled => {}
                        _ = tokio::time::sleep_until(deadline) => {
                            warn!("discovery deadline reached");
                        }
                    }
                }
                None => cancelled.await,
            }
        }
    }

    fn spawn_visit(
        &self,
        tasks: &mut JoinSet<(Address, QueryResult<Visit>)>,
        permits: &Arc<Semaphore>,
        visited: &VisitedSet,
        address: Address,
        is_seed: bool,
    ) {
        let connector = Arc::clone(&self.connector);
        let permits = Arc::clone(permits);
        let visited = Arc::clone(visited);
        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            (address, visit(connector.as_ref(), address, is_seed, &visited).await)
        });
    }

    /// Discovers every router reachable from `seed` and builds the topology.
    ///
    /// Failing to identify the seed is fatal. Any other failure only affects
    /// the router it happened on. On cancellation or deadline the routers
    /// committed so far are returned.
    pub async fn explore(&self, seed: Address) -> Result<Topology, ExploreError> {
        info!(%seed, concurrency = self.config.concurrency, "starting discovery");
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let visited: VisitedSet = Arc::default();
        let mut queued: HashSet<Address> = HashSet::from([seed]);
        let mut tasks = JoinSet::new();
        let mut builder = TopologyBuilder::new();
        let mut seed_id = None;
        let mut discovered = 0usize;

        self.spawn_visit(&mut tasks, &permits, &visited, seed, true);

        let stop = self.stop_signal();
        tokio::pin!(stop);
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    warn!(pending = tasks.len(), "discovery interrupted, keeping committed routers");
                    tasks.abort_all();
                    interrupted = true;
                    break;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let (address, visit) = joined?;
                    match visit {
                        Ok(Visit::Discovered { router, neighbors }) => {
                            if address == seed {
                                seed_id = Some(router.id.clone());
                            }
                            info!(
                                router = %router.id,
                                %address,
                                interfaces = router.interfaces.len(),
                                routes = router.routes.len(),
                                partial = router.is_partial(),
                                "discovered router"
                            );
                            // Addresses of a known router need no visit of their own
                            queued.extend(router.interfaces.iter().map(|i| i.address));
                            for neighbor in neighbors {
                                if queued.insert(neighbor) {
                                    self.spawn_visit(&mut tasks, &permits, &visited, neighbor, false);
                                }
                            }
                            builder.add_router(router);
                            discovered += 1;
                        }
                        Ok(Visit::Known(id)) => {
                            debug!(router = %id, %address, "already discovered, skipping");
                        }
                        Err(source) if address == seed => {
                            tasks.abort_all();
                            return Err(ExploreError::Seed { address, source });
                        }
                        Err(error) => {
                            warn!(%address, %error, "neighbor could not be reached");
                        }
                    }
                }
            }
        }

        if let Some(seed_id) = seed_id {
            builder = builder.seed(seed_id);
        }
        info!(routers = discovered, interrupted, "discovery finished");
        Ok(builder.interrupted(interrupted).build())
    }
}

/// Identifies the router at `address` and, if it is new, populates it.
///
/// Only the seed must answer its name. Any other router that does not is
/// named after `address`, marked partial and still populated.
async fn visit(
    connector: &dyn Connector,
    address: Address,
    is_seed: bool,
    visited: &Mutex<HashSet<RouterId>>,
) -> QueryResult<Visit> {
    let client = connector.connect(address).await?;
    let mut router = Router::new(address);
    let id = match router.fetch_identity(client.as_ref()).await.map(RouterId::clone) {
        Ok(id) => id,
        Err(e) if is_seed => return Err(e),
        Err(e) => {
            router.name_by_address();
            router.mark_partial(DiscoveryStep::Identity, &e);
            router.id.clone()
        }
    };

    if !visited.lock().await.insert(id.clone()) {
        return Ok(Visit::Known(id));
    }

    if let Err(e) = router.fetch_interfaces(client.as_ref()).await {
        router.mark_partial(DiscoveryStep::Interfaces, &e);
    }
    if let Err(e) = router.fetch_routes(client.as_ref()).await {
        router.mark_partial(DiscoveryStep::Routes, &e);
    }
    let neighbors = match router.discover_neighbors(client.as_ref()).await {
        Ok(neighbors) => neighbors,
        Err(e) => {
            router.mark_partial(DiscoveryStep::Neighbors, &e);
            Vec::new()
        }
    };
    Ok(Visit::Discovered { router, neighbors })
}
