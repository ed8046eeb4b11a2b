use crate::address::NodeId;
use crate::routing::advertisement::RoutingAdvertisement;
use crate::trace::stats::NetworkStats;
use crate::trace::step::{
    AdvertisementEvent, DropReason, PacketDelivered, PacketDropped, PacketForwarded, PacketLost,
    PacketSent, RouteUpdated, SimulationStep, SimulationStepKind,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;

/// Records everything noteworthy that happens in the network, and logs it
pub struct NetworkTracer {
    simulation_start: Instant,
    recorded_steps: Mutex<Vec<SimulationStep>>,
    already_warned_full_links: Mutex<HashSet<Arc<str>>>,
}

impl Default for NetworkTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTracer {
    pub fn new() -> Self {
        Self {
            simulation_start: Instant::now(),
            recorded_steps: Default::default(),
            already_warned_full_links: Default::default(),
        }
    }

    pub fn steps(&self) -> Vec<SimulationStep> {
        self.recorded_steps.lock().clone()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats::from_steps(&self.recorded_steps.lock())
    }

    /// The number of routing table entries changed so far, across all routers
    pub fn route_update_count(&self) -> usize {
        self.recorded_steps
            .lock()
            .iter()
            .filter(|step| matches!(step.kind, SimulationStepKind::RouteUpdated(_)))
            .count()
    }

    fn record(&self, kind: SimulationStepKind) {
        self.recorded_steps.lock().push(SimulationStep {
            relative_time: self.simulation_start.elapsed(),
            kind,
        });
    }

    pub fn track_packet_sent(&self, node_id: &NodeId, destination: &NodeId, size: usize) {
        tracing::debug!(node = %node_id, %destination, size, "packet sent");
        self.record(SimulationStepKind::PacketSent(PacketSent {
            node_id: node_id.clone(),
            destination: destination.clone(),
            packet_size_bytes: size,
        }));
    }

    pub fn track_packet_forwarded(
        &self,
        node_id: &NodeId,
        destination: &NodeId,
        from_interface: usize,
        to_interface: usize,
    ) {
        tracing::debug!(
            node = %node_id,
            %destination,
            from_interface,
            to_interface,
            "packet forwarded"
        );
        self.record(SimulationStepKind::PacketForwarded(PacketForwarded {
            node_id: node_id.clone(),
            destination: destination.clone(),
            from_interface,
            to_interface,
        }));
    }

    pub fn track_packet_delivered(&self, node_id: &NodeId, payload: &[u8]) {
        tracing::info!(
            node = %node_id,
            payload = %String::from_utf8_lossy(payload),
            "packet received"
        );
        self.record(SimulationStepKind::PacketDelivered(PacketDelivered {
            node_id: node_id.clone(),
            payload_size_bytes: payload.len(),
        }));
    }

    pub fn track_packet_dropped(
        &self,
        node_id: &NodeId,
        interface: usize,
        reason: DropReason,
        details: &dyn std::fmt::Display,
    ) {
        tracing::warn!(node = %node_id, interface, %reason, "packet dropped: {details}");
        self.record(SimulationStepKind::PacketDropped(PacketDropped {
            node_id: node_id.clone(),
            interface,
            reason,
        }));
    }

    pub fn track_packet_lost(&self, link_id: &Arc<str>, reason: DropReason) {
        match reason {
            DropReason::QueueFull => {
                // Saturated links would otherwise flood the output
                let first_loss = self
                    .already_warned_full_links
                    .lock()
                    .insert(link_id.clone());
                if first_loss {
                    tracing::warn!(
                        link = %link_id,
                        "packet lost because the receiving queue was full (further losses on this link are logged at debug level)"
                    );
                } else {
                    tracing::debug!(link = %link_id, %reason, "packet lost");
                }
            }
            _ => tracing::debug!(link = %link_id, %reason, "packet lost"),
        }

        self.record(SimulationStepKind::PacketLost(PacketLost {
            link_id: link_id.clone(),
            reason,
        }));
    }

    pub fn track_advertisement_sent(
        &self,
        node_id: &NodeId,
        interface: usize,
        advertisement: &RoutingAdvertisement,
    ) {
        tracing::debug!(
            node = %node_id,
            interface,
            routes = advertisement.routes.len(),
            "routing update sent"
        );
        self.record(SimulationStepKind::AdvertisementSent(AdvertisementEvent {
            node_id: node_id.clone(),
            interface,
            origin: advertisement.origin.clone(),
            routes: advertisement.routes.len(),
        }));
    }

    pub fn track_advertisement_received(
        &self,
        node_id: &NodeId,
        interface: usize,
        advertisement: &RoutingAdvertisement,
    ) {
        tracing::debug!(
            node = %node_id,
            interface,
            origin = %advertisement.origin,
            routes = advertisement.routes.len(),
            "routing update received"
        );
        self.record(SimulationStepKind::AdvertisementReceived(
            AdvertisementEvent {
                node_id: node_id.clone(),
                interface,
                origin: advertisement.origin.clone(),
                routes: advertisement.routes.len(),
            },
        ));
    }

    pub fn track_route_updated(
        &self,
        node_id: &NodeId,
        destination: &NodeId,
        via: &NodeId,
        cost: u32,
    ) {
        tracing::info!(node = %node_id, %destination, %via, cost, "route updated");
        self.record(SimulationStepKind::RouteUpdated(RouteUpdated {
            node_id: node_id.clone(),
            destination: destination.clone(),
            via: via.clone(),
            cost,
        }));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routing::advertisement::AdvertisedRoute;
    use crate::trace::stats::NodeStats;
    use std::time::Duration;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_are_timestamped_and_summarized() {
        let tracer = NetworkTracer::new();
        tracer.track_packet_sent(&id("H1"), &id("H2"), 10);
        tokio::time::sleep(Duration::from_millis(5)).await;
        tracer.track_packet_forwarded(&id("RA"), &id("H2"), 0, 1);
        tracer.track_packet_dropped(&id("RA"), 1, DropReason::NoRoute, &"no route");
        tracer.track_route_updated(&id("RA"), &id("H2"), &id("RB"), 3);
        tracer.track_route_updated(&id("RB"), &id("H1"), &id("RA"), 2);

        let link: Arc<str> = "RA-RB".into();
        tracer.track_packet_lost(&link, DropReason::QueueFull);
        tracer.track_packet_lost(&link, DropReason::QueueFull);

        let steps = tracer.steps();
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0].relative_time, Duration::ZERO);
        assert_eq!(steps[1].relative_time, Duration::from_millis(5));
        assert_eq!(tracer.route_update_count(), 2);

        let stats = tracer.stats();
        assert_eq!(stats.node(&id("H1")).sent, 1);
        assert_eq!(stats.node(&id("RA")).forwarded, 1);
        assert_eq!(stats.node(&id("RA")).dropped, 1);
        assert_eq!(stats.node(&id("RA")).route_updates, 1);
        assert_eq!(stats.node(&id("RZ")), NodeStats::default());
        assert_eq!(stats.by_link["RA-RB"].lost, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_log_format() {
        let tracer = NetworkTracer::new();
        let advertisement = RoutingAdvertisement {
            origin: id("RA"),
            routes: vec![AdvertisedRoute {
                destination: id("RA"),
                via: id("RA"),
                cost: 0,
            }],
        };
        tracer.track_advertisement_sent(&id("RA"), 2, &advertisement);

        let json = serde_json::to_value(tracer.steps()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "relative_time_ns": 0,
                "type": "advertisementSent",
                "data": {
                    "node_id": "RA",
                    "interface": 2,
                    "origin": "RA",
                    "routes": 1
                }
            }])
        );
    }
}
