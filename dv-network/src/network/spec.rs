use crate::address::NodeId;
use crate::network::router::{
    DEFAULT_ADVERTISEMENT_INTERVAL, DEFAULT_MAX_ADVERTISEMENT_ROUTES, DEFAULT_POLL_INTERVAL,
};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct NetworkSpec {
    pub nodes: Vec<NetworkNodeSpec>,
    pub links: Vec<NetworkLinkSpec>,
    pub settings: NodeSettings,
}

#[derive(Clone, Debug)]
pub struct NetworkNodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Capacity of each of the node's interface queues (0 means unbounded)
    pub max_queue_size: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Host,
    Router,
}

/// One side of a link: a node and the index of the interface the link is plugged into
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkEndpoint {
    pub node: NodeId,
    pub interface: usize,
}

impl LinkEndpoint {
    pub fn new(node: NodeId, interface: usize) -> Self {
        Self { node, interface }
    }
}

impl Display for LinkEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.node, self.interface)
    }
}

/// A bidirectional link, with the same properties in both directions
#[derive(Clone, Debug)]
pub struct NetworkLinkSpec {
    pub id: Arc<str>,
    pub source: LinkEndpoint,
    pub target: LinkEndpoint,
    /// The cost routers attach to the link, used when computing routes
    pub cost: u32,
    pub delay: Duration,
    pub packet_loss_ratio: f64,
}

impl NetworkLinkSpec {
    /// Returns the `(local, remote)` endpoints as seen from `node`, if the link is attached to it
    pub fn endpoints_from(&self, node: &NodeId) -> Option<(&LinkEndpoint, &LinkEndpoint)> {
        if &self.source.node == node {
            Some((&self.source, &self.target))
        } else if &self.target.node == node {
            Some((&self.target, &self.source))
        } else {
            None
        }
    }
}

/// Settings shared by every node in the network
#[derive(Clone, Debug)]
pub struct NodeSettings {
    pub poll_interval: Duration,
    pub advertisement_interval: Option<Duration>,
    pub max_advertisement_routes: usize,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            advertisement_interval: Some(DEFAULT_ADVERTISEMENT_INTERVAL),
            max_advertisement_routes: DEFAULT_MAX_ADVERTISEMENT_ROUTES,
        }
    }
}
