use crate::network::interface::{Direction, Interface};
use crate::network::router::DEFAULT_POLL_INTERVAL;
use crate::trace::step::DropReason;
use crate::trace::tracer::NetworkTracer;
use fastrand::Rng;
use futures_util::{FutureExt, select_biased};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A point-to-point link between two interfaces
///
/// The link carries packets from each side's outbound queue to the other side's inbound queue.
/// Each direction holds at most as many packets in flight as the receiving queue can hold, so a
/// saturated link leaves packets in the sender's outbound queue and blocking puts there wait.
/// Delivery never waits: if the receiving queue is full, the packet is lost.
pub struct NetworkLink {
    pub id: Arc<str>,
    a_to_b: Mutex<Channel>,
    b_to_a: Mutex<Channel>,
    tracer: Arc<NetworkTracer>,
    poll_interval: Duration,
}

struct Channel {
    source: Arc<Interface>,
    target: Arc<Interface>,
    delay: Duration,
    packet_loss_ratio: f64,
    rng: Rng,
    in_transit: VecDeque<InTransit>,
}

impl Channel {
    fn is_saturated(&self) -> bool {
        self.target
            .capacity()
            .is_some_and(|capacity| self.in_transit.len() >= capacity)
    }
}

struct InTransit {
    arrival: Instant,
    packet: Vec<u8>,
}

impl NetworkLink {
    pub fn new(
        id: Arc<str>,
        a: Arc<Interface>,
        b: Arc<Interface>,
        delay: Duration,
        packet_loss_ratio: f64,
        mut rng: Rng,
        tracer: Arc<NetworkTracer>,
    ) -> Self {
        let channel = |source: &Arc<Interface>, target: &Arc<Interface>, rng: Rng| Channel {
            source: source.clone(),
            target: target.clone(),
            delay,
            packet_loss_ratio,
            rng,
            in_transit: VecDeque::new(),
        };

        let a_to_b = channel(&a, &b, rng.fork());
        let b_to_a = channel(&b, &a, rng.fork());
        Self {
            id,
            a_to_b: Mutex::new(a_to_b),
            b_to_a: Mutex::new(b_to_a),
            tracer,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Picks up at most one packet per direction, unless that direction is saturated, and delivers
    /// those whose delay has elapsed
    ///
    /// Returns the number of packets that were moved, dropped or delivered.
    pub fn transfer(&self, now: Instant) -> usize {
        [&self.a_to_b, &self.b_to_a]
            .into_iter()
            .map(|channel| self.transfer_channel(&mut channel.lock(), now))
            .sum()
    }

    fn transfer_channel(&self, channel: &mut Channel, now: Instant) -> usize {
        let mut activity = 0;

        if !channel.is_saturated() {
            if let Some(packet) = channel.source.get(Direction::Out) {
                activity += 1;
                if channel.rng.f64() < channel.packet_loss_ratio {
                    self.tracer.track_packet_lost(&self.id, DropReason::Injected);
                } else {
                    channel.in_transit.push_back(InTransit {
                        arrival: now + channel.delay,
                        packet,
                    });
                }
            }
        }

        // The delay is the same for every packet, so arrivals are in FIFO order
        while channel
            .in_transit
            .front()
            .is_some_and(|next| next.arrival <= now)
        {
            let Some(next) = channel.in_transit.pop_front() else {
                break;
            };

            activity += 1;
            if channel.target.try_put(next.packet, Direction::In).is_err() {
                self.tracer.track_packet_lost(&self.id, DropReason::QueueFull);
            }
        }

        activity
    }

    fn next_arrival(&self) -> Option<Instant> {
        [&self.a_to_b, &self.b_to_a]
            .into_iter()
            .filter_map(|channel| channel.lock().in_transit.front().map(|p| p.arrival))
            .min()
    }

    /// Runs the link until cancelled
    pub async fn run(&self, cancellation_token: CancellationToken) {
        while !cancellation_token.is_cancelled() {
            let activity = self.transfer(Instant::now());
            if activity > 0 {
                tokio::task::yield_now().await;
                continue;
            }

            let mut wake_up = Instant::now() + self.poll_interval;
            if let Some(arrival) = self.next_arrival() {
                wake_up = wake_up.min(arrival);
            }

            select_biased! {
                _ = cancellation_token.cancelled().fuse() => {}
                _ = tokio::time::sleep_until(wake_up).fuse() => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn link(delay: Duration, packet_loss_ratio: f64, queue_size: usize) -> NetworkLink {
        NetworkLink::new(
            "a-b".into(),
            Arc::new(Interface::new(queue_size)),
            Arc::new(Interface::new(queue_size)),
            delay,
            packet_loss_ratio,
            Rng::with_seed(42),
            Arc::new(NetworkTracer::new()),
        )
    }

    fn a(link: &NetworkLink) -> Arc<Interface> {
        link.a_to_b.lock().source.clone()
    }

    fn b(link: &NetworkLink) -> Arc<Interface> {
        link.b_to_a.lock().source.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_packets_cross_in_both_directions() {
        let link = link(Duration::ZERO, 0.0, 0);
        a(&link).try_put(b"ping".to_vec(), Direction::Out).unwrap();
        b(&link).try_put(b"pong".to_vec(), Direction::Out).unwrap();

        link.transfer(Instant::now());

        assert_eq!(b(&link).get(Direction::In).unwrap(), b"ping");
        assert_eq!(a(&link).get(Direction::In).unwrap(), b"pong");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_respected() {
        let link = link(Duration::from_millis(10), 0.0, 0);
        a(&link).try_put(b"ping".to_vec(), Direction::Out).unwrap();

        let start = Instant::now();
        link.transfer(start);
        assert!(b(&link).get(Direction::In).is_none());
        assert_eq!(link.next_arrival(), Some(start + Duration::from_millis(10)));

        link.transfer(start + Duration::from_millis(10));
        assert_eq!(b(&link).get(Direction::In).unwrap(), b"ping");
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_receiving_queue_loses_packets() {
        let link = link(Duration::ZERO, 0.0, 1);
        let now = Instant::now();
        a(&link).try_put(b"1".to_vec(), Direction::Out).unwrap();
        link.transfer(now);
        a(&link).try_put(b"2".to_vec(), Direction::Out).unwrap();
        link.transfer(now);

        assert_eq!(b(&link).len(Direction::In), 1);
        assert_eq!(b(&link).get(Direction::In).unwrap(), b"1");
        assert_eq!(link.tracer.stats().by_link["a-b"].lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lossy_link_drops_everything_at_full_loss() {
        let link = link(Duration::ZERO, 1.0, 0);
        for _ in 0..5 {
            a(&link).try_put(b"x".to_vec(), Direction::Out).unwrap();
            link.transfer(Instant::now());
        }

        assert!(b(&link).is_empty(Direction::In));
        assert_eq!(link.tracer.stats().by_link["a-b"].lost, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_link_holds_back_blocking_puts() {
        let link = Arc::new(link(Duration::from_secs(10), 0.0, 1));
        let token = CancellationToken::new();
        let link_cp = link.clone();
        let token_cp = token.clone();
        let link_task = tokio::spawn(async move { link_cp.run(token_cp).await });

        let sender = a(&link);
        let producer = tokio::spawn(async move {
            for i in 0..3 {
                sender.put_blocking(vec![b'0' + i], Direction::Out).await;
            }
        });

        // One packet in flight, one waiting in the outbound queue, and the third put is stuck
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!producer.is_finished());
        assert_eq!(link.a_to_b.lock().in_transit.len(), 1);
        assert_eq!(a(&link).len(Direction::Out), 1);

        // The first arrival frees the link, which lets the producer through
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(producer.is_finished());
        assert_eq!(b(&link).get(Direction::In).unwrap(), b"0");

        token.cancel();
        link_task.await.unwrap();
        producer.await.unwrap();
    }
}
