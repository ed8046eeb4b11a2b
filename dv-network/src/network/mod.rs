//! In-memory network implementation
//!
//! Provides an in-memory network of hosts and routers, connected by point-to-point links. Every
//! node and every link runs as its own task, so packets are processed in whatever order the
//! runtime happens to schedule them.

pub mod host;
pub mod interface;
pub mod link;
pub mod router;
pub mod spec;

use crate::address::NodeId;
use crate::network::host::{Host, HostHandle};
use crate::network::interface::Interface;
use crate::network::link::NetworkLink;
use crate::network::router::{Router, RouterHandle};
use crate::network::spec::{LinkEndpoint, NetworkSpec, NodeKind};
use crate::routing::RoutingTable;
use crate::routing::cost::Neighbor;
use crate::trace::stats::NetworkStats;
use crate::trace::tracer::NetworkTracer;
use anyhow::{Context, bail};
use fastrand::Rng;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct InMemoryNetwork {
    hosts: BTreeMap<NodeId, Arc<Host>>,
    routers: BTreeMap<NodeId, Arc<Router>>,
    links: Vec<Arc<NetworkLink>>,
    tracer: Arc<NetworkTracer>,
    running: Mutex<Option<RunningTasks>>,
}

struct RunningTasks {
    nodes_token: CancellationToken,
    links_token: CancellationToken,
    node_tasks: Vec<JoinHandle<()>>,
    link_tasks: Vec<JoinHandle<()>>,
}

impl InMemoryNetwork {
    /// Initializes a new [`InMemoryNetwork`] based on the provided spec
    ///
    /// The topology is validated up front, so a network that initializes successfully is fully
    /// wired: every router interface leads to exactly one neighbor and every host is attached
    /// through its single interface.
    pub fn initialize(
        spec: NetworkSpec,
        tracer: Arc<NetworkTracer>,
        mut rng: Rng,
    ) -> anyhow::Result<Arc<Self>> {
        let mut kinds = HashMap::new();
        for node in &spec.nodes {
            if kinds.insert(node.id.clone(), node.kind).is_some() {
                bail!("duplicate node id `{}`", node.id);
            }
        }

        let mut used_endpoints = HashSet::new();
        let mut link_ids = HashSet::new();
        let mut links_per_node: HashMap<NodeId, usize> = HashMap::new();
        for link in &spec.links {
            if !link_ids.insert(link.id.clone()) {
                bail!("duplicate link id `{}`", link.id);
            }

            if link.source.node == link.target.node {
                bail!("link `{}` connects node `{}` to itself", link.id, link.source.node);
            }

            if !(0.0..=1.0).contains(&link.packet_loss_ratio) {
                bail!(
                    "link `{}` has an invalid packet loss ratio ({}); it must be between 0 and 1",
                    link.id,
                    link.packet_loss_ratio
                );
            }

            for endpoint in [&link.source, &link.target] {
                let Some(kind) = kinds.get(&endpoint.node) else {
                    bail!(
                        "link `{}` references unknown node `{}`",
                        link.id,
                        endpoint.node
                    );
                };

                if *kind == NodeKind::Host && endpoint.interface != 0 {
                    bail!(
                        "link `{}` is attached to host interface {endpoint}, but hosts only have interface 0",
                        link.id,
                    );
                }

                if !used_endpoints.insert(endpoint.clone()) {
                    bail!(
                        "link `{}` uses interface {endpoint}, which is already connected to another link",
                        link.id,
                    );
                }

                *links_per_node.entry(endpoint.node.clone()).or_default() += 1;
            }
        }

        let settings = &spec.settings;
        let mut hosts = BTreeMap::new();
        let mut routers = BTreeMap::new();
        for node in &spec.nodes {
            match node.kind {
                NodeKind::Host => {
                    if links_per_node.get(&node.id).copied().unwrap_or(0) != 1 {
                        bail!("host `{}` must be connected to exactly one link", node.id);
                    }

                    let host = Host::new(node.id.clone(), node.max_queue_size)
                        .with_tracer(tracer.clone())
                        .with_poll_interval(settings.poll_interval);
                    hosts.insert(node.id.clone(), Arc::new(host));
                }
                NodeKind::Router => {
                    let neighbors = spec
                        .links
                        .iter()
                        .filter_map(|link| {
                            let (local, remote) = link.endpoints_from(&node.id)?;
                            Some(Neighbor::new(remote.node.clone(), local.interface, link.cost))
                        })
                        .collect();

                    let router = Router::new(node.id.clone(), neighbors, node.max_queue_size)
                        .with_context(|| format!("invalid router `{}`", node.id))?
                        .with_tracer(tracer.clone())
                        .with_poll_interval(settings.poll_interval)
                        .with_advertisement_interval(settings.advertisement_interval)
                        .with_max_advertisement_routes(settings.max_advertisement_routes);
                    routers.insert(node.id.clone(), Arc::new(router));
                }
            }
        }

        let mut network = Self {
            hosts,
            routers,
            links: Vec::new(),
            tracer: tracer.clone(),
            running: Mutex::new(None),
        };

        for link in &spec.links {
            let a = network.interface(&link.source)?;
            let b = network.interface(&link.target)?;
            let link = NetworkLink::new(
                link.id.clone(),
                a,
                b,
                link.delay,
                link.packet_loss_ratio,
                Rng::with_seed(rng.u64(..)),
                tracer.clone(),
            )
            .with_poll_interval(settings.poll_interval);
            network.links.push(Arc::new(link));
        }

        tracing::info!(
            hosts = network.hosts.len(),
            routers = network.routers.len(),
            links = network.links.len(),
            "network initialized"
        );

        Ok(Arc::new(network))
    }

    fn interface(&self, endpoint: &LinkEndpoint) -> anyhow::Result<Arc<Interface>> {
        if let Some(host) = self.hosts.get(&endpoint.node) {
            return Ok(host.interface().clone());
        }

        self.routers
            .get(&endpoint.node)
            .and_then(|router| router.interface(endpoint.interface))
            .cloned()
            .with_context(|| format!("interface {endpoint} does not exist"))
    }

    /// Spawns one task per node and per link
    ///
    /// Routers advertise their initial table as soon as their task starts.
    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            bail!("the network is already running");
        }

        let nodes_token = CancellationToken::new();
        let links_token = CancellationToken::new();

        let mut node_tasks = Vec::new();
        for host in self.hosts.values() {
            let host = host.clone();
            let token = nodes_token.clone();
            node_tasks.push(tokio::spawn(async move { host.run(token).await }));
        }

        for router in self.routers.values() {
            let router = router.clone();
            let token = nodes_token.clone();
            node_tasks.push(tokio::spawn(async move { router.run(token).await }));
        }

        let link_tasks = self
            .links
            .iter()
            .map(|link| {
                let link = link.clone();
                let token = links_token.clone();
                tokio::spawn(async move { link.run(token).await })
            })
            .collect();

        *running = Some(RunningTasks {
            nodes_token,
            links_token,
            node_tasks,
            link_tasks,
        });

        Ok(())
    }

    /// Stops all tasks and waits for them to finish
    ///
    /// Nodes are stopped before links, so a router waiting for room in an outbound queue always
    /// sees that queue drained and can observe the cancellation.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.nodes_token.cancel();
        for task in running.node_tasks {
            if let Err(e) = task.await {
                tracing::error!("node task failed: {e}");
            }
        }

        running.links_token.cancel();
        for task in running.link_tasks {
            if let Err(e) = task.await {
                tracing::error!("link task failed: {e}");
            }
        }

        tracing::info!("network stopped");
    }

    /// Waits until no routing table has changed for `quiet_period`
    ///
    /// The quiet period should comfortably exceed the slowest link's delay, otherwise an
    /// advertisement still in flight can be mistaken for convergence. Fails if the network is
    /// still changing after `timeout` (checked once per quiet period).
    pub async fn wait_for_convergence(
        &self,
        quiet_period: Duration,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let deadline = Instant::now() + timeout;
        let mut last_update_count = self.tracer.route_update_count();

        loop {
            tokio::time::sleep(quiet_period).await;

            let update_count = self.tracer.route_update_count();
            if update_count == last_update_count {
                tracing::info!(route_updates = update_count, "routing tables converged");
                return Ok(());
            }

            if Instant::now() >= deadline {
                bail!(
                    "routing tables did not converge within {}ms",
                    timeout.as_millis()
                );
            }

            last_update_count = update_count;
        }
    }

    /// Sends `data` from host `source` to `destination`
    ///
    /// Fails if the host does not exist or its outbound queue is full (the packet is lost in that
    /// case, which is reported as usual).
    pub fn send(
        &self,
        source: &NodeId,
        destination: NodeId,
        data: impl Into<Vec<u8>>,
    ) -> anyhow::Result<()> {
        let host = self
            .hosts
            .get(source)
            .with_context(|| format!("host `{source}` does not exist"))?;
        host.send(destination, data)
            .with_context(|| format!("host `{source}` failed to send packet"))
    }

    pub fn host(&self, id: &NodeId) -> Option<HostHandle> {
        self.hosts.get(id).map(|host| host.handle())
    }

    pub fn router(&self, id: &NodeId) -> Option<RouterHandle> {
        self.routers.get(id).map(|router| router.handle())
    }

    pub fn hosts(&self) -> impl Iterator<Item = HostHandle> + '_ {
        self.hosts.values().map(|host| host.handle())
    }

    pub fn routers(&self) -> impl Iterator<Item = RouterHandle> + '_ {
        self.routers.values().map(|router| router.handle())
    }

    /// A snapshot of every router's routing table
    pub fn routing_tables(&self) -> BTreeMap<NodeId, RoutingTable> {
        self.routers
            .iter()
            .map(|(id, router)| (id.clone(), router.routing_table()))
            .collect()
    }

    pub fn tracer(&self) -> &Arc<NetworkTracer> {
        &self.tracer
    }

    pub fn stats(&self) -> NetworkStats {
        self.tracer.stats()
    }
}
