use crate::address::NodeId;
use crate::trace::step::{SimulationStep, SimulationStepKind};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct NetworkStats {
    pub by_node: BTreeMap<NodeId, NodeStats>,
    pub by_link: BTreeMap<Arc<str>, LinkStats>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub sent: usize,
    pub forwarded: usize,
    pub delivered: usize,
    pub dropped: usize,
    pub advertisements_sent: usize,
    pub advertisements_received: usize,
    pub route_updates: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub lost: usize,
}

impl NetworkStats {
    pub(crate) fn from_steps(steps: &[SimulationStep]) -> Self {
        let mut stats = NetworkStats::default();
        for step in steps {
            if let SimulationStepKind::PacketLost(lost) = &step.kind {
                stats.by_link.entry(lost.link_id.clone()).or_default().lost += 1;
                continue;
            }

            let Some(node_id) = step.kind.node_id() else {
                continue;
            };

            let node = stats.by_node.entry(node_id.clone()).or_default();
            match &step.kind {
                SimulationStepKind::PacketSent(_) => node.sent += 1,
                SimulationStepKind::PacketForwarded(_) => node.forwarded += 1,
                SimulationStepKind::PacketDelivered(_) => node.delivered += 1,
                SimulationStepKind::PacketDropped(_) => node.dropped += 1,
                SimulationStepKind::AdvertisementSent(_) => node.advertisements_sent += 1,
                SimulationStepKind::AdvertisementReceived(_) => {
                    node.advertisements_received += 1
                }
                SimulationStepKind::RouteUpdated(_) => node.route_updates += 1,
                SimulationStepKind::PacketLost(_) => {}
            }
        }

        stats
    }

    pub fn node(&self, id: &NodeId) -> NodeStats {
        self.by_node.get(id).cloned().unwrap_or_default()
    }
}
