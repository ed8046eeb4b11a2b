//! A distance-vector routing simulation over an in-memory network
//!
//! Hosts and routers exchange byte packets through interface queues, connected by links with a
//! configurable delay and loss ratio. Routers learn their routing tables by advertising them to
//! their neighbors, and forward data packets along the cheapest known path.

pub mod address;
pub mod network;
pub mod packet;
pub mod routing;
pub mod trace;
