use crate::address::NodeId;
use crate::network::interface::{Direction, Interface};
use crate::packet::{NetworkPacket, Protocol};
use crate::routing::RoutingTable;
use crate::routing::advertisement::RoutingAdvertisement;
use crate::routing::cost::{CostTable, Neighbor, RouterConfigError};
use crate::trace::stats::NodeStats;
use crate::trace::step::DropReason;
use crate::trace::tracer::NetworkTracer;
use futures_util::{FutureExt, select_biased};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_ADVERTISEMENT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const DEFAULT_MAX_ADVERTISEMENT_ROUTES: usize = 32;

/// Read-only view on a router, for use outside of the router's own task
#[derive(Clone)]
pub struct RouterHandle {
    id: NodeId,
    routing_table: Arc<Mutex<RoutingTable>>,
    tracer: Arc<NetworkTracer>,
}

impl RouterHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// A snapshot of the router's current routing table
    pub fn routing_table(&self) -> RoutingTable {
        self.routing_table.lock().clone()
    }

    pub fn stats(&self) -> NodeStats {
        self.tracer.stats().node(&self.id)
    }
}

/// A router with one interface per neighbor, running the distance-vector protocol
///
/// The routing table is only modified by the router itself, in response to advertisements
/// received from its neighbors.
pub struct Router {
    id: NodeId,
    costs: CostTable,
    interfaces: Vec<Arc<Interface>>,
    routing_table: Arc<Mutex<RoutingTable>>,
    tracer: Arc<NetworkTracer>,
    advertisement_interval: Option<Duration>,
    poll_interval: Duration,
    max_advertisement_routes: usize,
}

impl Router {
    /// Creates a router with one interface per neighbor, each with queues of `max_queue_size`
    /// packets (0 means unbounded)
    pub fn new(
        id: NodeId,
        neighbors: Vec<Neighbor>,
        max_queue_size: usize,
    ) -> Result<Self, RouterConfigError> {
        let costs = CostTable::new(&id, neighbors)?;
        let interfaces = (0..costs.len())
            .map(|_| Arc::new(Interface::new(max_queue_size)))
            .collect();
        let routing_table = RoutingTable::new(id.clone(), &costs);

        Ok(Self {
            id,
            costs,
            interfaces,
            routing_table: Arc::new(Mutex::new(routing_table)),
            tracer: Arc::new(NetworkTracer::new()),
            advertisement_interval: Some(DEFAULT_ADVERTISEMENT_INTERVAL),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_advertisement_routes: DEFAULT_MAX_ADVERTISEMENT_ROUTES,
        })
    }

    pub fn with_tracer(mut self, tracer: Arc<NetworkTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Sets the interval between unsolicited advertisements (`None` disables them, so only
    /// table changes trigger advertisements)
    pub fn with_advertisement_interval(mut self, interval: Option<Duration>) -> Self {
        self.advertisement_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_advertisement_routes(mut self, max_routes: usize) -> Self {
        self.max_advertisement_routes = max_routes.max(1);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn interfaces(&self) -> &[Arc<Interface>] {
        &self.interfaces
    }

    pub fn interface(&self, index: usize) -> Option<&Arc<Interface>> {
        self.interfaces.get(index)
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    /// A snapshot of the current routing table
    pub fn routing_table(&self) -> RoutingTable {
        self.routing_table.lock().clone()
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            id: self.id.clone(),
            routing_table: self.routing_table.clone(),
            tracer: self.tracer.clone(),
        }
    }

    /// Takes at most one packet from each interface's inbound queue and processes it
    ///
    /// Returns the number of packets taken from the queues.
    pub async fn process_queues(&self) -> usize {
        let mut processed = 0;
        for interface in 0..self.interfaces.len() {
            let Some(bytes) = self.interfaces[interface].get(Direction::In) else {
                continue;
            };

            processed += 1;
            let packet = match NetworkPacket::decode(&bytes) {
                Ok(packet) => packet,
                Err(e) => {
                    self.tracer
                        .track_packet_dropped(&self.id, interface, DropReason::Malformed, &e);
                    continue;
                }
            };

            match packet.protocol {
                Protocol::Data => self.forward_packet(packet, interface).await,
                Protocol::Control => {
                    self.update_routes(packet, interface).await;
                }
            }
        }

        processed
    }

    /// Forwards a data packet towards its destination, through the cheapest known next hop
    async fn forward_packet(&self, packet: NetworkPacket, from_interface: usize) {
        if packet.destination == self.id {
            self.tracer.track_packet_delivered(&self.id, &packet.payload);
            return;
        }

        let Some(to_interface) = self.interface_towards(&packet.destination) else {
            self.tracer.track_packet_dropped(
                &self.id,
                from_interface,
                DropReason::NoRoute,
                &format_args!("{packet:?}"),
            );
            return;
        };

        let bytes = match packet.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.tracer
                    .track_packet_dropped(&self.id, from_interface, DropReason::Malformed, &e);
                return;
            }
        };

        match self.interfaces[to_interface]
            .put(bytes, Direction::Out, true)
            .await
        {
            Ok(()) => self.tracer.track_packet_forwarded(
                &self.id,
                &packet.destination,
                from_interface,
                to_interface,
            ),
            Err(e) => self.tracer.track_packet_dropped(
                &self.id,
                to_interface,
                DropReason::QueueFull,
                &e,
            ),
        }
    }

    /// Resolves the interface leading to the next hop towards `destination`
    fn interface_towards(&self, destination: &NodeId) -> Option<usize> {
        let next_hop = self.routing_table.lock().next_hop(destination).cloned()?;
        self.costs.neighbor(&next_hop).map(|n| n.interface)
    }

    /// Sends the full routing table to the neighbor on `interface`
    pub async fn send_routes(&self, interface: usize) {
        let Some(neighbor) = self.costs.neighbor_on(interface) else {
            return;
        };

        // Snapshot the table, so the lock is not held while waiting for queue space
        let advertisement = self.routing_table.lock().to_advertisement();
        for part in advertisement.split(self.max_advertisement_routes) {
            let packet = NetworkPacket::control(neighbor.id.clone(), part.encode());
            let bytes = match packet.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.tracer
                        .track_packet_dropped(&self.id, interface, DropReason::Malformed, &e);
                    return;
                }
            };

            match self.interfaces[interface]
                .put(bytes, Direction::Out, true)
                .await
            {
                Ok(()) => self
                    .tracer
                    .track_advertisement_sent(&self.id, interface, &part),
                Err(e) => self.tracer.track_packet_dropped(
                    &self.id,
                    interface,
                    DropReason::QueueFull,
                    &e,
                ),
            }
        }
    }

    /// Sends the full routing table to every neighbor, except the one on `except_interface`
    pub async fn advertise(&self, except_interface: Option<usize>) {
        for interface in 0..self.interfaces.len() {
            if Some(interface) == except_interface {
                continue;
            }

            self.send_routes(interface).await;
        }
    }

    /// Relaxes the routing table with the advertisement carried by `packet`, and propagates any
    /// change to the other neighbors
    ///
    /// Returns whether the routing table changed.
    async fn update_routes(&self, packet: NetworkPacket, interface: usize) -> bool {
        let advertisement = match RoutingAdvertisement::decode(&packet.payload) {
            Ok(advertisement) => advertisement,
            Err(e) => {
                self.tracer
                    .track_packet_dropped(&self.id, interface, DropReason::Malformed, &e);
                return false;
            }
        };

        let Some(neighbor) = self.costs.neighbor_on(interface) else {
            return false;
        };

        if advertisement.origin != neighbor.id {
            self.tracer.track_packet_dropped(
                &self.id,
                interface,
                DropReason::UnexpectedOrigin,
                &format_args!(
                    "advertisement from {} arrived through the link to {}",
                    advertisement.origin, neighbor.id
                ),
            );
            return false;
        }

        self.tracer
            .track_advertisement_received(&self.id, interface, &advertisement);

        let updated_routes: Vec<_> = {
            let mut routing_table = self.routing_table.lock();
            routing_table
                .relax(&neighbor.id, neighbor.cost, &advertisement.routes)
                .into_iter()
                .filter_map(|destination| {
                    let route = routing_table.route(&destination)?.clone();
                    Some((destination, route))
                })
                .collect()
        };

        if updated_routes.is_empty() {
            return false;
        }

        for (destination, route) in &updated_routes {
            self.tracer
                .track_route_updated(&self.id, destination, &route.via, route.cost);
        }

        // Split horizon: the neighbor that triggered the update already knows about it
        self.advertise(Some(interface)).await;
        true
    }

    /// Runs the router's polling loop until cancelled
    ///
    /// The router announces its table to all neighbors when starting, and then again after every
    /// change and every advertisement interval.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        tracing::info!(router = %self.id, interfaces = self.interfaces.len(), "router started");
        self.advertise(None).await;

        let mut next_periodic_advertisement =
            self.advertisement_interval.map(|interval| Instant::now() + interval);

        while !cancellation_token.is_cancelled() {
            let processed = self.process_queues().await;

            if let Some(deadline) = next_periodic_advertisement {
                if Instant::now() >= deadline {
                    self.advertise(None).await;
                    // Deadlines missed while waiting for queue room are skipped
                    next_periodic_advertisement =
                        self.advertisement_interval.map(|interval| Instant::now() + interval);
                }
            }

            if processed > 0 {
                // More packets might be waiting, so only give other tasks a chance to run
                tokio::task::yield_now().await;
            } else {
                select_biased! {
                    _ = cancellation_token.cancelled().fuse() => {}
                    _ = tokio::time::sleep(self.poll_interval).fuse() => {}
                }
            }
        }

        tracing::info!(router = %self.id, "router stopped");
    }
}
