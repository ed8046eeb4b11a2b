use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::{Debug, Display, Formatter};
use std::pin::pin;
use thiserror::Error;
use tokio::sync::Notify;

/// Side of an [`Interface`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Packets received from the link, waiting to be processed by the node
    In,
    /// Packets produced by the node, waiting to be carried by the link
    Out,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

/// A non-blocking put found the queue at capacity. The rejected packet is handed back.
#[derive(Error)]
#[error("queue is full (capacity: {capacity} packets)")]
pub struct QueueFull {
    pub capacity: usize,
    pub packet: Vec<u8>,
}

impl Debug for QueueFull {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "QueueFull {{ capacity: {}, packet: {:?} }}",
            self.capacity,
            String::from_utf8_lossy(&self.packet)
        )
    }
}

/// One end of a simulated duplex link: a pair of FIFO queues holding encoded packets
///
/// The owning node reads from [`Direction::In`] and writes to [`Direction::Out`], while the link
/// does the opposite.
pub struct Interface {
    inbound: PacketQueue,
    outbound: PacketQueue,
}

impl Interface {
    /// Creates an interface whose queues hold at most `max_size` packets each (0 means unbounded)
    pub fn new(max_size: usize) -> Self {
        Self {
            inbound: PacketQueue::new(max_size),
            outbound: PacketQueue::new(max_size),
        }
    }

    /// The maximum number of packets per queue, or `None` if the queues are unbounded
    pub fn capacity(&self) -> Option<usize> {
        self.inbound.capacity()
    }

    /// Enqueues a packet, either waiting for room (`block = true`) or failing right away if the
    /// queue is full
    pub async fn put(
        &self,
        packet: Vec<u8>,
        direction: Direction,
        block: bool,
    ) -> Result<(), QueueFull> {
        if block {
            self.put_blocking(packet, direction).await;
            Ok(())
        } else {
            self.try_put(packet, direction)
        }
    }

    pub fn try_put(&self, packet: Vec<u8>, direction: Direction) -> Result<(), QueueFull> {
        self.queue(direction).try_push(packet)
    }

    /// Enqueues a packet, suspending the calling task until the queue has room
    pub async fn put_blocking(&self, packet: Vec<u8>, direction: Direction) {
        self.queue(direction).push(packet).await
    }

    /// Dequeues the oldest packet, if any (never waits)
    pub fn get(&self, direction: Direction) -> Option<Vec<u8>> {
        self.queue(direction).pop()
    }

    pub fn len(&self, direction: Direction) -> usize {
        self.queue(direction).len()
    }

    pub fn is_empty(&self, direction: Direction) -> bool {
        self.len(direction) == 0
    }

    fn queue(&self, direction: Direction) -> &PacketQueue {
        match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        }
    }
}

struct PacketQueue {
    packets: Mutex<VecDeque<Vec<u8>>>,
    max_size: usize,
    notify_space_available: Notify,
}

impl PacketQueue {
    fn new(max_size: usize) -> Self {
        Self {
            packets: Mutex::new(VecDeque::new()),
            max_size,
            notify_space_available: Notify::new(),
        }
    }

    fn capacity(&self) -> Option<usize> {
        (self.max_size != 0).then_some(self.max_size)
    }

    fn try_push(&self, packet: Vec<u8>) -> Result<(), QueueFull> {
        let mut packets = self.packets.lock();
        if self.max_size != 0 && packets.len() >= self.max_size {
            return Err(QueueFull {
                capacity: self.max_size,
                packet,
            });
        }

        packets.push_back(packet);
        Ok(())
    }

    async fn push(&self, mut packet: Vec<u8>) {
        loop {
            // Register interest before checking, so a pop in between is not missed
            let mut space_available = pin!(self.notify_space_available.notified());
            space_available.as_mut().enable();

            match self.try_push(packet) {
                Ok(()) => return,
                Err(full) => packet = full.packet,
            }

            space_available.await;
        }
    }

    fn pop(&self) -> Option<Vec<u8>> {
        let packet = self.packets.lock().pop_front();
        if packet.is_some() {
            self.notify_space_available.notify_waiters();
        }

        packet
    }

    fn len(&self) -> usize {
        self.packets.lock().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_get_on_empty_queue_returns_none() {
        let interface = Interface::new(2);
        assert!(interface.get(Direction::In).is_none());
        assert!(interface.get(Direction::Out).is_none());
    }

    #[test]
    fn test_queues_are_fifo_and_independent() {
        let interface = Interface::new(0);
        interface.try_put(b"a".to_vec(), Direction::Out).unwrap();
        interface.try_put(b"b".to_vec(), Direction::Out).unwrap();
        interface.try_put(b"c".to_vec(), Direction::In).unwrap();

        assert_eq!(interface.len(Direction::Out), 2);
        assert_eq!(interface.len(Direction::In), 1);
        assert_eq!(interface.get(Direction::Out).unwrap(), b"a");
        assert_eq!(interface.get(Direction::Out).unwrap(), b"b");
        assert!(interface.get(Direction::Out).is_none());
        assert_eq!(interface.get(Direction::In).unwrap(), b"c");
    }

    #[test]
    fn test_non_blocking_put_on_full_queue_fails() {
        let interface = Interface::new(2);
        interface.try_put(b"1".to_vec(), Direction::Out).unwrap();
        interface.try_put(b"2".to_vec(), Direction::Out).unwrap();

        let err = interface.try_put(b"3".to_vec(), Direction::Out).unwrap_err();
        assert_eq!(err.capacity, 2);
        assert_eq!(err.packet, b"3");
        assert_eq!(interface.len(Direction::Out), 2);

        // The other direction still has room
        interface.try_put(b"4".to_vec(), Direction::In).unwrap();
    }

    #[test]
    fn test_unbounded_queue_never_fills_up() {
        let interface = Interface::new(0);
        assert_eq!(interface.capacity(), None);
        for i in 0..10_000u32 {
            interface
                .try_put(i.to_string().into_bytes(), Direction::In)
                .unwrap();
        }
        assert_eq!(interface.len(Direction::In), 10_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_without_blocking_reports_full_queue() {
        let interface = Interface::new(1);
        interface.put(b"1".to_vec(), Direction::In, false).await.unwrap();
        assert!(interface.put(b"2".to_vec(), Direction::In, false).await.is_err());
        assert_eq!(interface.len(Direction::In), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_put_waits_for_room() {
        let interface = Arc::new(Interface::new(1));
        interface.try_put(b"first".to_vec(), Direction::Out).unwrap();

        let interface_cp = interface.clone();
        let producer = tokio::spawn(async move {
            interface_cp
                .put(b"second".to_vec(), Direction::Out, true)
                .await
                .unwrap();
        });

        // The producer cannot make progress while the queue is full
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!producer.is_finished());
        assert_eq!(interface.len(Direction::Out), 1);

        // Making room lets it through
        assert_eq!(interface.get(Direction::Out).unwrap(), b"first");
        producer.await.unwrap();
        assert_eq!(interface.get(Direction::Out).unwrap(), b"second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_producer_does_not_stall_other_tasks() {
        let interface = Arc::new(Interface::new(1));
        interface.try_put(b"x".to_vec(), Direction::Out).unwrap();

        let interface_cp = interface.clone();
        let _blocked = tokio::spawn(async move {
            interface_cp.put_blocking(b"y".to_vec(), Direction::Out).await;
        });

        let other = Arc::new(Interface::new(1));
        let other_cp = other.clone();
        tokio::spawn(async move {
            other_cp.put_blocking(b"z".to_vec(), Direction::In).await;
        })
        .await
        .unwrap();

        assert_eq!(other.get(Direction::In).unwrap(), b"z");
    }
}
