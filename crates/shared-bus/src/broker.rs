//! # Topic Broker
//!
//! Best-effort, at-most-once fan-out over per-channel broadcast queues.
//! No persistence: a message published with no live subscriber is gone,
//! and a lagged subscriber loses the overwritten tail. Both are
//! acceptable because the durable log is the system of record.

use crate::channel::Channel;
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use shared_types::Event;
use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Real-time fan-out over named channels.
///
/// Channels are created lazily on first publish or subscribe and share a
/// fixed buffer capacity.
pub struct TopicBroker {
    channels: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    capacity: usize,
}

impl TopicBroker {
    /// Create a broker with the default per-channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker with a specific per-channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    fn sender(&self, channel: &Channel) -> broadcast::Sender<Event> {
        let name = channel.name();
        if let Some(sender) = self.channels.read().get(&name) {
            return sender.clone();
        }
        let mut channels = self.channels.write();
        channels
            .entry(name)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish to one channel. Returns the number of live receivers;
    /// zero means the message was dropped (log-recoverable).
    pub fn publish(&self, channel: &Channel, event: Event) -> usize {
        let sender = self.sender(channel);
        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(channel = %channel, "Broker message dropped (no receivers)");
                0
            }
        }
    }

    /// Subscribe to one channel for the lifetime of the returned handle.
    #[must_use]
    pub fn subscribe(&self, channel: &Channel) -> BrokerSubscription {
        BrokerSubscription {
            receiver: self.sender(channel).subscribe(),
            channel: channel.clone(),
        }
    }

    /// Live receiver count on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.channels
            .read()
            .get(&channel.name())
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Per-channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TopicBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription to one broker channel.
pub struct BrokerSubscription {
    receiver: broadcast::Receiver<Event>,
    channel: Channel,
}

impl BrokerSubscription {
    /// Receive the next event.
    ///
    /// Returns `None` when the broker is dropped. Lag is absorbed here:
    /// overwritten messages are counted and skipped, because consumers
    /// recover them from the durable log, not from the broker.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(channel = %self.channel, lagged = count, "Subscriber lagged, messages dropped");
                }
            }
        }
    }

    /// The channel this subscription watches.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Adapt into a `Stream` for combinator-style consumers.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.receiver),
            channel: self.channel,
        }
    }
}

/// `Stream` adapter over a subscription; lag markers are skipped.
pub struct EventStream {
    inner: BroadcastStream<Event>,
    channel: Channel,
}

impl EventStream {
    /// The channel this stream watches.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(channel = %self.channel, lagged = count, "Stream lagged, messages dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
