use crate::address::NodeId;
use crate::network::interface::{Direction, Interface, QueueFull};
use crate::network::router::DEFAULT_POLL_INTERVAL;
use crate::packet::{EncodingError, NetworkPacket, Protocol};
use crate::trace::step::DropReason;
use crate::trace::tracer::NetworkTracer;
use futures_util::{FutureExt, select_biased};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum HostSendError {
    #[error("packet could not be encoded: {0}")]
    Encoding(#[from] EncodingError),
    #[error("packet lost: {0}")]
    QueueFull(#[from] QueueFull),
}

/// Read-only view on a host, for use outside of the host's own task
#[derive(Clone)]
pub struct HostHandle {
    id: NodeId,
    received: Arc<Mutex<Vec<NetworkPacket>>>,
}

impl HostHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The data packets received so far, in order of arrival
    pub fn received(&self) -> Vec<NetworkPacket> {
        self.received.lock().clone()
    }
}

impl Debug for HostHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "host ({})", self.id)
    }
}

/// An end host, attached to the network through a single interface
pub struct Host {
    id: NodeId,
    interface: Arc<Interface>,
    received: Arc<Mutex<Vec<NetworkPacket>>>,
    tracer: Arc<NetworkTracer>,
    poll_interval: Duration,
}

impl Host {
    pub fn new(id: NodeId, max_queue_size: usize) -> Self {
        Self {
            id,
            interface: Arc::new(Interface::new(max_queue_size)),
            received: Default::default(),
            tracer: Arc::new(NetworkTracer::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_tracer(mut self, tracer: Arc<NetworkTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            id: self.id.clone(),
            received: self.received.clone(),
        }
    }

    /// Sends `data` to `destination`, without waiting if the interface's queue is full
    ///
    /// A packet that cannot be enqueued is lost; this is reported and returned as an error, but
    /// is otherwise business as usual for an unreliable network.
    pub fn send(
        &self,
        destination: NodeId,
        data: impl Into<Vec<u8>>,
    ) -> Result<(), HostSendError> {
        let packet = NetworkPacket::data(destination, data);
        let bytes = match packet.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.tracer
                    .track_packet_dropped(&self.id, 0, DropReason::Malformed, &e);
                return Err(e.into());
            }
        };

        let size = bytes.len();
        match self.interface.try_put(bytes, Direction::Out) {
            Ok(()) => {
                self.tracer
                    .track_packet_sent(&self.id, &packet.destination, size);
                Ok(())
            }
            Err(e) => {
                self.tracer
                    .track_packet_dropped(&self.id, 0, DropReason::QueueFull, &e);
                Err(e.into())
            }
        }
    }

    /// Takes the next data packet from the interface, if any
    ///
    /// Control packets (routing advertisements from the attached router) are ignored.
    pub fn receive(&self) -> Option<NetworkPacket> {
        let bytes = self.interface.get(Direction::In)?;
        let packet = match NetworkPacket::decode(&bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.tracer
                    .track_packet_dropped(&self.id, 0, DropReason::Malformed, &e);
                return None;
            }
        };

        match packet.protocol {
            Protocol::Control => {
                tracing::trace!(host = %self.id, "ignoring control packet");
                None
            }
            Protocol::Data if packet.destination != self.id => {
                self.tracer.track_packet_dropped(
                    &self.id,
                    0,
                    DropReason::Misdelivered,
                    &format_args!("{packet:?}"),
                );
                None
            }
            Protocol::Data => {
                self.tracer.track_packet_delivered(&self.id, &packet.payload);
                self.received.lock().push(packet.clone());
                Some(packet)
            }
        }
    }

    /// Runs the host's polling loop until cancelled, collecting received packets
    pub async fn run(&self, cancellation_token: CancellationToken) {
        tracing::info!(host = %self.id, "host started");
        while !cancellation_token.is_cancelled() {
            let busy = !self.interface.is_empty(Direction::In);
            self.receive();

            if busy {
                tokio::task::yield_now().await;
            } else {
                select_biased! {
                    _ = cancellation_token.cancelled().fuse() => {}
                    _ = tokio::time::sleep(self.poll_interval).fuse() => {}
                }
            }
        }

        tracing::info!(host = %self.id, "host stopped");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn test_send_enqueues_data_packet() {
        let host = Host::new(id("H1"), 0);
        host.send(id("H2"), "hello").unwrap();

        let bytes = host.interface().get(Direction::Out).unwrap();
        assert_eq!(bytes, b"000H21hello");
    }

    #[test]
    fn test_send_on_full_queue_reports_loss() {
        let host = Host::new(id("H1"), 1);
        host.send(id("H2"), "first").unwrap();

        let result = host.send(id("H2"), "second");
        assert!(matches!(result, Err(HostSendError::QueueFull(_))));
        assert_eq!(host.interface().len(Direction::Out), 1);
    }

    #[test]
    fn test_receive() {
        let host = Host::new(id("H2"), 0);
        assert!(host.receive().is_none());

        let packet = NetworkPacket::data(id("H2"), "hello");
        host.interface()
            .try_put(packet.encode().unwrap(), Direction::In)
            .unwrap();

        assert_eq!(host.receive(), Some(packet.clone()));
        assert_eq!(host.handle().received(), vec![packet]);
    }

    #[test]
    fn test_receive_skips_control_malformed_and_misdelivered_packets() {
        let host = Host::new(id("H2"), 0);
        let inputs = [
            NetworkPacket::control(id("H2"), "RA;RA|RA|0").encode().unwrap(),
            b"0H".to_vec(),
            NetworkPacket::data(id("H3"), "not mine").encode().unwrap(),
        ];
        for bytes in inputs {
            host.interface().try_put(bytes, Direction::In).unwrap();
        }

        for _ in 0..3 {
            assert!(host.receive().is_none());
        }
        assert!(host.handle().received().is_empty());
    }
}
