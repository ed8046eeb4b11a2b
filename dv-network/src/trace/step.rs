use crate::address::NodeId;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, DurationNanoSeconds, serde_as};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationStep {
    #[serde_as(as = "DurationNanoSeconds")]
    #[serde(rename = "relative_time_ns")]
    pub relative_time: Duration,
    #[serde(flatten)]
    pub kind: SimulationStepKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "data")]
pub enum SimulationStepKind {
    /// A host handed a data packet to the network
    PacketSent(PacketSent),
    /// A router forwarded a data packet through one of its interfaces
    PacketForwarded(PacketForwarded),
    /// A data packet reached its destination node
    PacketDelivered(PacketDelivered),
    /// A node discarded a packet
    PacketDropped(PacketDropped),
    /// A link lost a packet, either at random or because the receiving queue was full
    PacketLost(PacketLost),
    /// A router sent (part of) its routing table to a neighbor
    AdvertisementSent(AdvertisementEvent),
    /// A router received (part of) a neighbor's routing table
    AdvertisementReceived(AdvertisementEvent),
    /// A router adopted a new best route
    RouteUpdated(RouteUpdated),
}

impl SimulationStepKind {
    /// The node this step happened at, if it happened at a node
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            SimulationStepKind::PacketSent(e) => Some(&e.node_id),
            SimulationStepKind::PacketForwarded(e) => Some(&e.node_id),
            SimulationStepKind::PacketDelivered(e) => Some(&e.node_id),
            SimulationStepKind::PacketDropped(e) => Some(&e.node_id),
            SimulationStepKind::PacketLost(_) => None,
            SimulationStepKind::AdvertisementSent(e) => Some(&e.node_id),
            SimulationStepKind::AdvertisementReceived(e) => Some(&e.node_id),
            SimulationStepKind::RouteUpdated(e) => Some(&e.node_id),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketSent {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    #[serde_as(as = "DisplayFromStr")]
    pub destination: NodeId,
    pub packet_size_bytes: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketForwarded {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    #[serde_as(as = "DisplayFromStr")]
    pub destination: NodeId,
    pub from_interface: usize,
    pub to_interface: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketDelivered {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    pub payload_size_bytes: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketDropped {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    pub interface: usize,
    pub reason: DropReason,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacketLost {
    pub link_id: Arc<str>,
    pub reason: DropReason,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdvertisementEvent {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    pub interface: usize,
    #[serde_as(as = "DisplayFromStr")]
    pub origin: NodeId,
    pub routes: usize,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteUpdated {
    #[serde_as(as = "DisplayFromStr")]
    pub node_id: NodeId,
    #[serde_as(as = "DisplayFromStr")]
    pub destination: NodeId,
    #[serde_as(as = "DisplayFromStr")]
    pub via: NodeId,
    pub cost: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// The routing table has no entry for the destination
    NoRoute,
    /// The target queue was at capacity
    QueueFull,
    /// The packet could not be decoded (or encoded)
    Malformed,
    /// A control packet whose origin is not the neighbor wired to the receiving interface
    UnexpectedOrigin,
    /// A data packet arrived at a host it was not addressed to
    Misdelivered,
    /// Random loss injected by the link
    Injected,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            DropReason::NoRoute => "no route to destination",
            DropReason::QueueFull => "queue full",
            DropReason::Malformed => "malformed packet",
            DropReason::UnexpectedOrigin => "advertisement from unexpected origin",
            DropReason::Misdelivered => "packet addressed to another node",
            DropReason::Injected => "injected loss",
        };

        f.write_str(reason)
    }
}
