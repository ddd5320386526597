//! Fan-out from mirror mutations to registered listeners.
//!
//! Per the design notes' recommendation, each listener gets its own serial
//! dispatcher task reading off a bounded internal queue: `dispatch()` on
//! the mutation path only ever does a non-blocking `try_send` into that
//! queue, so a slow or absent consumer can't stall the mutation path or
//! any other listener. The queue drains in order into the caller's own
//! channel, giving best-effort per-listener FIFO.

use std::collections::HashMap;
use std::sync::Arc;

use mirror_core::{EventType, MirrorError, MirrorEvent, Object, ResourceKey};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::metrics::MirrorMetrics;

/// A subscription request: which events to receive and where to send them.
///
/// `channel` is an `Option` -- rather than a type that can't express "no
/// channel" -- so construction-time misuse (forgetting to wire a sender)
/// surfaces as the documented [`MirrorError::NilChannel`] instead of a
/// type error callers work around with a dummy channel.
pub struct ListenerSpec<K: Object> {
    /// Only events of this type are delivered.
    pub event_type: EventType,
    /// Only events for this resource kind are delivered.
    pub version: ResourceKey,
    /// The outbound channel events are forwarded to.
    pub channel: Option<mpsc::Sender<MirrorEvent<K>>>,
}

impl<K: Object> ListenerSpec<K> {
    /// Start building a listener for `(event_type, version)`.
    #[must_use]
    pub fn new(event_type: EventType, version: ResourceKey) -> Self {
        Self {
            event_type,
            version,
            channel: None,
        }
    }

    /// Attach the outbound channel. Without this, [`SubscriberBus::register`]
    /// fails with [`MirrorError::NilChannel`].
    #[must_use]
    pub fn channel(mut self, channel: mpsc::Sender<MirrorEvent<K>>) -> Self {
        self.channel = Some(channel);
        self
    }
}

/// An opaque handle to a registered listener. Currently only used to prove
/// registration succeeded -- there is no `Unregister` in this version;
/// listeners live until process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

struct Entry<K: Object> {
    event_type: EventType,
    queue: mpsc::Sender<MirrorEvent<K>>,
}

/// The registry mapping `ResourceKey -> [Listener]`, fanning out mirror
/// mutations to every listener whose `(type, version)` matches.
pub struct SubscriberBus<K: Object> {
    listeners: RwLock<HashMap<ResourceKey, Vec<Entry<K>>>>,
    dispatch_queue_capacity: usize,
    next_id: std::sync::atomic::AtomicUsize,
    metrics: Arc<dyn MirrorMetrics>,
}

impl<K: Object> SubscriberBus<K> {
    /// Build an empty bus. `dispatch_queue_capacity` bounds each listener's
    /// internal serial-dispatch queue (see the module docs).
    #[must_use]
    pub fn new(dispatch_queue_capacity: usize, metrics: Arc<dyn MirrorMetrics>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            dispatch_queue_capacity,
            next_id: std::sync::atomic::AtomicUsize::new(0),
            metrics,
        }
    }

    /// Register a listener, spawning its serial dispatcher task.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::NilChannel`] if `spec.channel` was never set.
    pub fn register(&self, spec: ListenerSpec<K>) -> Result<ListenerId, MirrorError> {
        let outbound = spec.channel.ok_or(MirrorError::NilChannel)?;
        let (queue_tx, mut queue_rx) = mpsc::channel::<MirrorEvent<K>>(self.dispatch_queue_capacity);

        tokio::spawn(async move {
            while let Some(event) = queue_rx.recv().await {
                if outbound.send(event).await.is_err() {
                    break;
                }
            }
        });

        self.listeners
            .write()
            .entry(spec.version)
            .or_default()
            .push(Entry {
                event_type: spec.event_type,
                queue: queue_tx,
            });

        Ok(ListenerId(
            self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        ))
    }

    /// Fan `event` out to every listener whose `(type, version)` matches.
    ///
    /// Never blocks: delivery into each listener's internal queue is a
    /// non-blocking `try_send`; a full queue drops the event rather than
    /// stalling the mutation path. The caller sizes its own channel's
    /// backpressure; dropping on a full internal queue is this bus's chosen
    /// policy (see DESIGN.md).
    pub fn dispatch(&self, event: &MirrorEvent<K>) {
        let listeners = self.listeners.read();
        let Some(entries) = listeners.get(&event.kind) else {
            return;
        };
        for entry in entries.iter().filter(|entry| entry.event_type == event.event_type) {
            let delivered = entry.queue.try_send(event.clone()).is_ok();
            self.metrics.record(
                "bus.dispatch",
                event.kind.resource(),
                delivered,
                std::time::Duration::ZERO,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::testing::TestObject;

    fn key() -> ResourceKey {
        ResourceKey::new("", "v1", "namespaces")
    }

    #[tokio::test]
    async fn listener_receives_matching_events() {
        let bus = SubscriberBus::<TestObject>::new(8, Arc::new(crate::metrics::NoopMetrics));
        let (tx, mut rx) = mpsc::channel(8);
        bus.register(ListenerSpec::new(EventType::Added, key()).channel(tx))
            .unwrap();

        let obj = TestObject::new("default", None, "1");
        bus.dispatch(&MirrorEvent::added(key(), "1", obj.clone()));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::Added);
        assert_eq!(received.after, Some(obj));
    }

    #[tokio::test]
    async fn listener_does_not_receive_mismatched_event_types() {
        let bus = SubscriberBus::<TestObject>::new(8, Arc::new(crate::metrics::NoopMetrics));
        let (tx, mut rx) = mpsc::channel(8);
        bus.register(ListenerSpec::new(EventType::Deleted, key()).channel(tx))
            .unwrap();

        bus.dispatch(&MirrorEvent::added(key(), "1", TestObject::new("default", None, "1")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deleted_events_carry_the_object_in_after() {
        let bus = SubscriberBus::<TestObject>::new(8, Arc::new(crate::metrics::NoopMetrics));
        let (tx, mut rx) = mpsc::channel(8);
        bus.register(ListenerSpec::new(EventType::Deleted, key()).channel(tx))
            .unwrap();

        let obj = TestObject::new("test", None, "1");
        bus.dispatch(&MirrorEvent::deleted(key(), "2", obj.clone()));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, EventType::Deleted);
        assert_eq!(received.after, Some(obj));
        assert!(received.before.is_none());
    }

    #[test]
    fn register_without_a_channel_fails() {
        let bus = SubscriberBus::<TestObject>::new(8, Arc::new(crate::metrics::NoopMetrics));
        let spec = ListenerSpec::<TestObject>::new(EventType::Added, key());
        assert!(matches!(bus.register(spec), Err(MirrorError::NilChannel)));
    }
}
