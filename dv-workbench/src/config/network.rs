use dv_network::address::NodeId;
use dv_network::network::spec::{
    LinkEndpoint, NetworkLinkSpec, NetworkNodeSpec, NetworkSpec, NodeKind, NodeSettings,
};
use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct NetworkSpecJson {
    nodes: Vec<NetworkNodeJson>,
    links: Vec<NetworkLinkJson>,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct NetworkNodeJson {
    #[serde_as(as = "DisplayFromStr")]
    id: NodeId,
    #[serde(rename = "type")]
    #[serde(default = "default_network_node_kind")]
    kind: NetworkNodeKindJson,
    /// Overrides the default capacity of the node's interface queues
    #[serde(default)]
    max_queue_size: Option<usize>,
}

fn default_network_node_kind() -> NetworkNodeKindJson {
    NetworkNodeKindJson::Router
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
enum NetworkNodeKindJson {
    Router,
    Host,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct LinkEndpointJson {
    #[serde_as(as = "DisplayFromStr")]
    node: NodeId,
    /// The index of the node's interface the link is plugged into (always 0 for hosts)
    #[serde(default)]
    interface: usize,
}

#[derive(Deserialize, Clone)]
struct NetworkLinkJson {
    id: String,
    source: LinkEndpointJson,
    target: LinkEndpointJson,
    /// The cost of the link, as seen by the routing protocol
    #[serde(default = "default_link_cost")]
    cost: u32,
    /// The delay of the link, in milliseconds
    #[serde(default)]
    delay_ms: u64,
    /// The ratio of packets that will be lost (the value must be between 0 and 1)
    #[serde(default)]
    packet_loss_ratio: f64,
}

fn default_link_cost() -> u32 {
    1
}

impl NetworkSpecJson {
    /// Converts the JSON graph into a network spec, filling in defaults from `settings` and
    /// `default_max_queue_size`
    pub fn into_spec(self, settings: NodeSettings, default_max_queue_size: usize) -> NetworkSpec {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| NetworkNodeSpec {
                id: n.id,
                kind: match n.kind {
                    NetworkNodeKindJson::Router => NodeKind::Router,
                    NetworkNodeKindJson::Host => NodeKind::Host,
                },
                max_queue_size: n.max_queue_size.unwrap_or(default_max_queue_size),
            })
            .collect();

        let links = self.links.into_iter().map(|l| l.into()).collect();

        NetworkSpec {
            nodes,
            links,
            settings,
        }
    }
}

impl From<LinkEndpointJson> for LinkEndpoint {
    fn from(e: LinkEndpointJson) -> Self {
        LinkEndpoint::new(e.node, e.interface)
    }
}

impl From<NetworkLinkJson> for NetworkLinkSpec {
    fn from(l: NetworkLinkJson) -> Self {
        NetworkLinkSpec {
            id: l.id.into_boxed_str().into(),
            source: l.source.into(),
            target: l.target.into(),
            cost: l.cost,
            delay: Duration::from_millis(l.delay_ms),
            packet_loss_ratio: l.packet_loss_ratio,
        }
    }
}

/// A data packet a host should send at a given point in the run
#[serde_as]
#[derive(Deserialize, Clone, Debug)]
pub struct TrafficJson {
    /// Time at which the packet is sent, relative to the start of the run
    pub at_ms: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub source: NodeId,
    #[serde_as(as = "DisplayFromStr")]
    pub destination: NodeId,
    pub payload: String,
}
