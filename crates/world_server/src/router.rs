//! Channel-based broadcast fan-out.
//!
//! The [`BroadcastRouter`] keeps, per named channel, the list of connections
//! currently subscribed to it. Publishing serializes the message once and
//! pushes the shared text frame into every subscriber's bounded outbound
//! queue without awaiting. A subscriber whose queue is full or closed is
//! dropped from the channel and told to disconnect through its eviction
//! signal; delivery to the others carries on.
//!
//! Ordering: callers publish while holding the lock of the store whose
//! mutation they announce, and each channel's subscriber list is mutated under
//! its own map shard lock, so every subscriber observes a channel's messages
//! in publish order.

use crate::connection::ConnectionId;
use blockworld_protocol::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Named broadcast groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Blocks,
    Players,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Blocks, Channel::Players];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Blocks => "blocks",
            Channel::Players => "players",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound side of one connection as seen by the router.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    outbound: mpsc::Sender<Arc<str>>,
    evicted: Arc<Notify>,
}

impl Subscriber {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Arc<str>>, evicted: Arc<Notify>) -> Self {
        Self { id, outbound, evicted }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a frame for this connection only.
    pub fn send(&self, payload: Arc<str>) -> Result<(), TrySendError<Arc<str>>> {
        self.outbound.try_send(payload)
    }

    /// Signals the owning connection handler to close.
    pub fn evict(&self) {
        self.evicted.notify_one();
    }
}

/// Fan-out of protocol messages to channel subscribers.
#[derive(Debug, Default)]
pub struct BroadcastRouter {
    channels: DashMap<Channel, Vec<Subscriber>>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` to `channel`. Subscribing twice is a no-op.
    ///
    /// The subscriber only receives messages published after this returns.
    pub fn subscribe(&self, channel: Channel, subscriber: Subscriber) {
        let mut subscribers = self.channels.entry(channel).or_default();
        if subscribers.iter().any(|s| s.id == subscriber.id) {
            return;
        }
        debug!("📡 Connection {} subscribed to '{}'", subscriber.id, channel);
        subscribers.push(subscriber);
    }

    /// Removes the connection from every channel.
    pub fn unsubscribe_all(&self, id: ConnectionId) {
        for mut entry in self.channels.iter_mut() {
            entry.value_mut().retain(|s| s.id != id);
        }
    }

    /// Delivers `message` to every subscriber of `channel`.
    ///
    /// Returns the number of subscribers the frame was queued for.
    pub fn publish(&self, channel: Channel, message: &Message) -> usize {
        self.fan_out(channel, message, None)
    }

    /// Delivers `message` to every subscriber of `channel` except `origin`.
    pub fn publish_except(&self, channel: Channel, message: &Message, origin: ConnectionId) -> usize {
        self.fan_out(channel, message, Some(origin))
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels.get(&channel).map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_subscribed(&self, channel: Channel, id: ConnectionId) -> bool {
        self.channels
            .get(&channel)
            .map(|s| s.iter().any(|sub| sub.id == id))
            .unwrap_or(false)
    }

    fn fan_out(&self, channel: Channel, message: &Message, skip: Option<ConnectionId>) -> usize {
        let payload: Arc<str> = match message.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                error!("Failed to encode {} for '{}': {}", message.kind(), channel, e);
                return 0;
            }
        };

        let Some(mut subscribers) = self.channels.get_mut(&channel) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|subscriber| {
            if Some(subscriber.id) == skip {
                return true;
            }
            match subscriber.send(payload.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "🐢 Connection {} stalled on '{}', evicting",
                        subscriber.id, channel
                    );
                    subscriber.evict();
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection {} already closed, dropping from '{}'", subscriber.id, channel);
                    subscriber.evict();
                    false
                }
            }
        });

        debug!("Published {} on '{}' to {} subscriber(s)", message.kind(), channel, delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockworld_protocol::PlayerId;

    fn subscriber(id: ConnectionId, capacity: usize) -> (Subscriber, mpsc::Receiver<Arc<str>>, Arc<Notify>) {
        let (tx, rx) = mpsc::channel(capacity);
        let evicted = Arc::new(Notify::new());
        (Subscriber::new(id, tx, evicted.clone()), rx, evicted)
    }

    fn leave(id: &str) -> Message {
        Message::PlayerLeave { player_id: PlayerId::from(id) }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_in_order() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a, _) = subscriber(1, 8);
        let (b, mut rx_b, _) = subscriber(2, 8);
        router.subscribe(Channel::Players, a);
        router.subscribe(Channel::Players, b);

        assert_eq!(router.publish(Channel::Players, &leave("x")), 2);
        assert_eq!(router.publish(Channel::Players, &leave("y")), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert!(rx.recv().await.unwrap().contains("\"x\""));
            assert!(rx.recv().await.unwrap().contains("\"y\""));
        }
    }

    #[tokio::test]
    async fn publish_except_skips_origin() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a, _) = subscriber(1, 8);
        let (b, mut rx_b, _) = subscriber(2, 8);
        router.subscribe(Channel::Players, a);
        router.subscribe(Channel::Players, b);

        assert_eq!(router.publish_except(Channel::Players, &leave("x"), 1), 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let router = BroadcastRouter::new();
        let (a, mut rx_a, _) = subscriber(1, 8);
        router.subscribe(Channel::Blocks, a);

        assert_eq!(router.publish(Channel::Players, &leave("x")), 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_replay() {
        let router = BroadcastRouter::new();
        let (early, _rx_early, _) = subscriber(1, 8);
        router.subscribe(Channel::Blocks, early);
        router.publish(Channel::Blocks, &leave("before"));

        let (late, mut rx_late, _) = subscriber(2, 8);
        router.subscribe(Channel::Blocks, late);
        assert!(rx_late.try_recv().is_err());

        router.publish(Channel::Blocks, &leave("after"));
        assert!(rx_late.recv().await.unwrap().contains("after"));
        assert!(rx_late.try_recv().is_err());
    }

    #[tokio::test]
    async fn stalled_subscriber_is_evicted_without_blocking_others() {
        let router = BroadcastRouter::new();
        let (slow, _rx_slow, slow_evicted) = subscriber(1, 1);
        let (fast, mut rx_fast, _) = subscriber(2, 8);
        router.subscribe(Channel::Players, slow);
        router.subscribe(Channel::Players, fast);

        router.publish(Channel::Players, &leave("1"));
        let delivered = router.publish(Channel::Players, &leave("2"));

        assert_eq!(delivered, 1);
        assert!(!router.is_subscribed(Channel::Players, 1));
        assert_eq!(router.subscriber_count(Channel::Players), 1);
        // the permit stored by notify_one completes immediately
        slow_evicted.notified().await;
        assert!(rx_fast.recv().await.is_some());
        assert!(rx_fast.recv().await.is_some());
    }

    #[tokio::test]
    async fn closed_subscriber_is_dropped() {
        let router = BroadcastRouter::new();
        let (gone, rx_gone, _) = subscriber(1, 8);
        router.subscribe(Channel::Blocks, gone);
        drop(rx_gone);

        assert_eq!(router.publish(Channel::Blocks, &leave("x")), 0);
        assert_eq!(router.subscriber_count(Channel::Blocks), 0);
    }

    #[test]
    fn unsubscribe_all_clears_every_channel() {
        let router = BroadcastRouter::new();
        let (a, _rx, _) = subscriber(7, 8);
        for channel in Channel::ALL {
            router.subscribe(channel, a.clone());
            router.subscribe(channel, a.clone());
        }
        assert_eq!(router.subscriber_count(Channel::Blocks), 1);

        router.unsubscribe_all(7);
        for channel in Channel::ALL {
            assert!(!router.is_subscribed(channel, 7));
        }
    }
}
