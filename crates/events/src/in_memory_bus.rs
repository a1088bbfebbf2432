//! In-memory durable queue for tests/dev.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};

use async_trait::async_trait;

use crate::bus::{BusError, ConnectionState, EventBus, Subscription};

#[derive(Debug)]
struct Inner<M> {
    state: ConnectionState,
    reachable: bool,
    declare_calls: usize,
    declared: BTreeSet<String>,
    queues: HashMap<String, Vec<M>>,
    subscribers: Vec<(String, mpsc::Sender<M>)>,
}

/// In-memory broker handle bound to one named queue.
///
/// - No IO
/// - Every accepted message is retained (it plays the role of a durable queue)
/// - Handles made with [`InMemoryEventBus::sibling`] share the broker (one
///   connection, several queues)
/// - Can be driven into `Disconnected` or made unreachable to exercise failure paths
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    queue: String,
    inner: Arc<Mutex<Inner<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                reachable: true,
                declare_calls: 0,
                declared: BTreeSet::new(),
                queues: HashMap::new(),
                subscribers: Vec::new(),
            })),
        }
    }

    /// A bus whose broker refuses connections: `declare` fails and the bus
    /// stays `Disconnected`.
    pub fn unreachable(queue: impl Into<String>) -> Self {
        let bus = Self::new(queue);
        bus.lock().reachable = false;
        bus
    }

    /// Another handle on the same broker, bound to `queue`.
    pub fn sibling(&self, queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Simulate losing the connection. Already accepted messages are kept.
    pub fn disconnect(&self) {
        self.lock().state = ConnectionState::Disconnected;
    }

    /// Names of the distinct queues declared on this broker, sorted.
    pub fn declared_queues(&self) -> Vec<String> {
        self.lock().declared.iter().cloned().collect()
    }

    /// How many times `declare` reached the broker, across all handles.
    pub fn declare_count(&self) -> usize {
        self.lock().declare_calls
    }

    /// Number of messages held on this bus's queue.
    pub fn published_count(&self) -> usize {
        self.lock().queues.get(&self.queue).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<M>> {
        // A poisoned lock only means a test panicked mid-publish; the data is
        // still usable for inspection.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<M: Clone> InMemoryEventBus<M> {
    /// Snapshot of the messages held on this bus's queue, in publish order.
    pub fn messages(&self) -> Vec<M> {
        self.lock()
            .queues
            .get(&self.queue)
            .cloned()
            .unwrap_or_default()
    }

    /// Receive a copy of every message accepted on this queue from now on.
    pub fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push((self.queue.clone(), tx));
        Subscription::new(rx)
    }
}

#[async_trait]
impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn queue(&self) -> &str {
        &self.queue
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }

    async fn declare(&self) -> Result<(), BusError> {
        let mut inner = self.lock();
        inner.declare_calls += 1;
        inner.state = ConnectionState::Connecting;

        if !inner.reachable {
            inner.state = ConnectionState::Disconnected;
            return Err(BusError::Transport("connection refused".to_string()));
        }

        inner.declared.insert(self.queue.clone());
        inner.queues.entry(self.queue.clone()).or_default();
        inner.state = ConnectionState::Connected;
        Ok(())
    }

    async fn publish(&self, message: &M) -> Result<(), BusError> {
        let mut inner = self.lock();
        if !inner.state.is_connected() {
            return Err(BusError::NotConnected(inner.state));
        }
        if !inner.declared.contains(&self.queue) {
            return Err(BusError::Transport(format!("queue {} not declared", self.queue)));
        }

        inner
            .queues
            .entry(self.queue.clone())
            .or_default()
            .push(message.clone());

        // Drop any dead subscribers while publishing.
        let queue = &self.queue;
        inner
            .subscribers
            .retain(|(name, tx)| name != queue || tx.send(message.clone()).is_ok());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn declaring_twice_keeps_one_queue() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("product-events");
        let audit = bus.sibling("audit");
        audit.declare().await.unwrap();
        bus.declare().await.unwrap();
        bus.declare().await.unwrap();

        assert_eq!(bus.declare_count(), 3);
        assert_eq!(bus.declared_queues(), vec!["audit".to_string(), "product-events".to_string()]);
        assert_eq!(bus.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn sibling_queues_keep_their_own_messages() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("product-events");
        let audit = bus.sibling("audit");
        let sub = audit.subscribe();
        bus.declare().await.unwrap();
        audit.declare().await.unwrap();

        bus.publish(&"update".to_string()).await.unwrap();
        audit.publish(&"trail".to_string()).await.unwrap();

        assert_eq!(bus.messages(), vec!["update".to_string()]);
        assert_eq!(audit.messages(), vec!["trail".to_string()]);
        assert_eq!(sub.try_recv().unwrap(), "trail");
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_undeclared_sibling_is_rejected() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("product-events");
        let other = bus.sibling("other");
        bus.declare().await.unwrap();

        assert!(matches!(other.publish(&"m".to_string()).await, Err(BusError::Transport(_))));
        assert_eq!(other.published_count(), 0);
    }

    #[tokio::test]
    async fn publish_before_declare_is_rejected() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("q");
        let err = bus.publish(&"m".to_string()).await.unwrap_err();
        assert_eq!(err, BusError::NotConnected(ConnectionState::Disconnected));
        assert_eq!(bus.published_count(), 0);
    }

    #[tokio::test]
    async fn same_message_twice_is_two_messages() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("q");
        bus.declare().await.unwrap();
        bus.publish(&"m".to_string()).await.unwrap();
        bus.publish(&"m".to_string()).await.unwrap();

        assert_eq!(bus.messages(), vec!["m".to_string(), "m".to_string()]);
    }

    #[tokio::test]
    async fn disconnect_keeps_accepted_messages() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("q");
        bus.declare().await.unwrap();
        bus.publish(&"first".to_string()).await.unwrap();
        bus.disconnect();

        assert!(bus.publish(&"second".to_string()).await.is_err());
        assert_eq!(bus.messages(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_broker_fails_declare() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::unreachable("q");
        assert!(matches!(bus.declare().await, Err(BusError::Transport(_))));
        assert_eq!(bus.state(), ConnectionState::Disconnected);
        assert!(bus.declared_queues().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_accepted_messages() {
        let bus: InMemoryEventBus<String> = InMemoryEventBus::new("q");
        let sub = bus.subscribe();
        bus.declare().await.unwrap();
        bus.publish(&"m".to_string()).await.unwrap();

        assert_eq!(sub.try_recv().unwrap(), "m");
    }
}
