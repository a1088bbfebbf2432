//! Best-effort event publishing.
//!
//! `BrokerPublisher` is the only thing the update path talks to when it
//! announces a change. Its contract is deliberately narrow:
//!
//! - `publish` never returns an error and never panics. A failure (channel not
//!   connected, broker rejected the frame, timeout) is reported to a
//!   [`PublishFailureSink`] and the call returns normally.
//! - Nothing is retried or queued locally. A failed publish after a committed
//!   store write leaves the store updated and no event emitted; the failure
//!   report is what makes that divergence observable.
//! - Every call is bounded by a timeout so a stalled broker cannot hold up the
//!   caller's response.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use productsvc_events::{BusError, ConnectionState, Event, EventBus, IntegrationEvent};

/// Receives publish/connect failures.
///
/// The default sink logs through `tracing`; tests and deployments can inject
/// their own (counters, alerting, a reconciliation log).
pub trait PublishFailureSink: Send + Sync {
    fn publish_failed(&self, queue: &str, event: &IntegrationEvent, error: &BusError);

    fn connect_failed(&self, queue: &str, error: &BusError) {
        let _ = (queue, error);
    }
}

/// Logs failures as structured `error` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureSink;

impl PublishFailureSink for TracingFailureSink {
    fn publish_failed(&self, queue: &str, event: &IntegrationEvent, error: &BusError) {
        error!(
            queue = %queue,
            event_type = %event.event_type(),
            data = %event.data(),
            error = %error,
            "event not published; store and queue have diverged"
        );
    }

    fn connect_failed(&self, queue: &str, error: &BusError) {
        error!(queue = %queue, error = %error, "broker connection failed");
    }
}

/// Result of a publish attempt. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Failed(BusError),
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

pub struct BrokerPublisher<B> {
    bus: B,
    sink: Arc<dyn PublishFailureSink>,
    timeout: Duration,
}

impl<B> std::fmt::Debug for BrokerPublisher<B>
where
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerPublisher")
            .field("bus", &self.bus)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<B> BrokerPublisher<B>
where
    B: EventBus<IntegrationEvent>,
{
    pub fn new(bus: B, timeout: Duration) -> Self {
        Self {
            bus,
            sink: Arc::new(TracingFailureSink),
            timeout,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn PublishFailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn state(&self) -> ConnectionState {
        self.bus.state()
    }

    /// Open the channel and declare the durable queue.
    ///
    /// Safe to call more than once. A failure is reported and leaves the
    /// publisher `Disconnected`; later publishes are then reported as failures
    /// instead of blocking.
    #[instrument(skip(self), fields(queue = %self.bus.queue()))]
    pub async fn connect(&self) -> ConnectionState {
        let result = match tokio::time::timeout(self.timeout, self.bus.declare()).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => info!("queue declared"),
            Err(e) => {
                warn!(error = %e, "queue declaration failed");
                self.sink.connect_failed(self.bus.queue(), &e);
            }
        }

        self.bus.state()
    }

    /// Publish a typed domain event as a persistent message.
    pub async fn publish<E: Event>(&self, event: &E) -> PublishOutcome {
        match IntegrationEvent::from_typed(event) {
            Ok(envelope) => self.publish_envelope(&envelope).await,
            Err(e) => {
                let error = BusError::Serialize(e.to_string());
                let placeholder =
                    IntegrationEvent::new(event.event_type(), serde_json::Value::Null);
                self.sink.publish_failed(self.bus.queue(), &placeholder, &error);
                PublishOutcome::Failed(error)
            }
        }
    }

    /// Publish an already-built envelope as a persistent message.
    #[instrument(
        skip(self, envelope),
        fields(queue = %self.bus.queue(), event_type = %envelope.event_type())
    )]
    pub async fn publish_envelope(&self, envelope: &IntegrationEvent) -> PublishOutcome {
        let result = match tokio::time::timeout(self.timeout, self.bus.publish(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(self.timeout)),
        };

        match result {
            Ok(()) => {
                debug!("event published");
                PublishOutcome::Published
            }
            Err(e) => {
                self.sink.publish_failed(self.bus.queue(), envelope, &e);
                PublishOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use productsvc_events::InMemoryEventBus;
    use serde::Serialize;
    use serde_json::json;

    /// Records every failure it is told about.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) publish_failures: Mutex<Vec<(String, BusError)>>,
        pub(crate) connect_failures: Mutex<Vec<BusError>>,
    }

    impl PublishFailureSink for RecordingSink {
        fn publish_failed(&self, _queue: &str, event: &IntegrationEvent, error: &BusError) {
            self.publish_failures
                .lock()
                .unwrap()
                .push((event.event_type().to_string(), error.clone()));
        }

        fn connect_failed(&self, _queue: &str, error: &BusError) {
            self.connect_failures.lock().unwrap().push(error.clone());
        }
    }

    #[derive(Debug, Clone, Serialize)]
    struct Pinged {
        n: u32,
    }

    impl Event for Pinged {
        const EVENT_TYPE: &'static str = "Pinged";
    }

    /// A broker that never answers.
    struct Stalled;

    #[async_trait]
    impl EventBus<IntegrationEvent> for Stalled {
        fn queue(&self) -> &str {
            "stalled"
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }

        async fn declare(&self) -> Result<(), BusError> {
            std::future::pending().await
        }

        async fn publish(&self, _message: &IntegrationEvent) -> Result<(), BusError> {
            std::future::pending().await
        }
    }

    type Bus = Arc<InMemoryEventBus<IntegrationEvent>>;

    fn publisher(bus: Bus) -> (BrokerPublisher<Bus>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let publisher = BrokerPublisher::new(bus, Duration::from_secs(1)).with_sink(sink.clone());
        (publisher, sink)
    }

    #[tokio::test]
    async fn connect_twice_declares_one_queue() {
        let bus = Arc::new(InMemoryEventBus::new("product-events"));
        // Another queue on the same broker, so a duplicate would be visible.
        bus.sibling("audit").declare().await.unwrap();
        let (publisher, sink) = publisher(bus.clone());

        assert_eq!(publisher.connect().await, ConnectionState::Connected);
        assert_eq!(publisher.connect().await, ConnectionState::Connected);

        assert_eq!(bus.declare_count(), 3);
        assert_eq!(
            bus.declared_queues(),
            vec!["audit".to_string(), "product-events".to_string()]
        );
        assert!(sink.connect_failures.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_failure_is_reported_not_raised() {
        let bus = Arc::new(InMemoryEventBus::unreachable("product-events"));
        let (publisher, sink) = publisher(bus);

        assert_eq!(publisher.connect().await, ConnectionState::Disconnected);
        assert_eq!(sink.connect_failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_while_disconnected_reports_and_returns() {
        let bus = Arc::new(InMemoryEventBus::new("product-events"));
        let (publisher, sink) = publisher(bus.clone());

        let outcome = publisher.publish(&Pinged { n: 1 }).await;

        assert_eq!(
            outcome,
            PublishOutcome::Failed(BusError::NotConnected(ConnectionState::Disconnected))
        );
        assert_eq!(bus.published_count(), 0);
        assert_eq!(sink.publish_failures.lock().unwrap()[0].0, "Pinged");
    }

    #[tokio::test]
    async fn same_event_twice_yields_two_messages() {
        let bus = Arc::new(InMemoryEventBus::new("product-events"));
        let (publisher, _sink) = publisher(bus.clone());
        publisher.connect().await;

        assert!(publisher.publish(&Pinged { n: 7 }).await.is_published());
        assert!(publisher.publish(&Pinged { n: 7 }).await.is_published());

        let expected = IntegrationEvent::new("Pinged", json!({"n": 7}));
        assert_eq!(bus.messages(), vec![expected.clone(), expected]);
    }

    #[tokio::test]
    async fn stalled_broker_times_out() {
        let sink = Arc::new(RecordingSink::default());
        let limit = Duration::from_millis(20);
        let publisher = BrokerPublisher::new(Stalled, limit).with_sink(sink.clone());

        assert_eq!(
            publisher.publish(&Pinged { n: 1 }).await,
            PublishOutcome::Failed(BusError::Timeout(limit))
        );
        assert_eq!(sink.publish_failures.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_publishes_all_land() {
        let bus = Arc::new(InMemoryEventBus::new("product-events"));
        let (publisher, _sink) = publisher(bus.clone());
        publisher.connect().await;
        let publisher = Arc::new(publisher);

        let handles = (0..32)
            .map(|n| {
                let publisher = publisher.clone();
                tokio::spawn(async move { publisher.publish(&Pinged { n }).await })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert!(handle.await.unwrap().is_published());
        }

        assert_eq!(bus.published_count(), 32);
    }
}
