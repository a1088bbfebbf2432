//! AMQP 0-9-1 (RabbitMQ) event bus.
//!
//! One connection, one channel, one durable queue. Messages go through the
//! default exchange with the queue name as routing key and
//! `delivery_mode = 2` (persistent). Publisher confirms are not enabled, so
//! `publish` returns as soon as the frames are written.
//!
//! Concurrent publishes share the channel; lapin serializes frame writes per
//! channel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, instrument};

use productsvc_events::{BusError, ConnectionState, EventBus, IntegrationEvent};

use super::CONTENT_TYPE_JSON;

/// AMQP delivery mode for messages the broker must keep across restarts.
const PERSISTENT: u8 = 2;

struct Link {
    // Kept so the connection is not dropped while the channel is in use.
    _connection: Connection,
    channel: Channel,
}

pub struct AmqpEventBus {
    url: String,
    queue: String,
    state: Arc<Mutex<ConnectionState>>,
    link: AsyncMutex<Option<Link>>,
}

impl std::fmt::Debug for AmqpEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL may carry credentials; only the queue and state are shown.
        f.debug_struct("AmqpEventBus")
            .field("queue", &self.queue)
            .field("state", &self.state())
            .finish()
    }
}

impl AmqpEventBus {
    /// Create a bus for `queue` on the broker at `url` (no IO yet).
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            link: AsyncMutex::new(None),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    async fn declare_queue(&self, channel: &Channel) -> Result<(), BusError> {
        channel
            .queue_declare(
                &self.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map(|_| ())
            .map_err(|e| BusError::Transport(format!("queue_declare failed: {e}")))
    }

    async fn open(&self) -> Result<Link, BusError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Transport(format!("connect failed: {e}")))?;

        let state = Arc::clone(&self.state);
        let queue = self.queue.clone();
        connection.on_error(move |err| {
            error!(queue = %queue, error = %err, "AMQP connection lost");
            *state.lock().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Disconnected;
        });

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Transport(format!("create_channel failed: {e}")))?;

        Ok(Link {
            _connection: connection,
            channel,
        })
    }
}

#[async_trait]
impl EventBus<IntegrationEvent> for AmqpEventBus {
    fn queue(&self) -> &str {
        &self.queue
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[instrument(skip(self), fields(queue = %self.queue), err)]
    async fn declare(&self) -> Result<(), BusError> {
        let mut link = self.link.lock().await;

        // Reuse a live channel; re-declaring a durable queue is a no-op.
        if let Some(existing) = link.as_ref() {
            if existing.channel.status().connected() {
                self.declare_queue(&existing.channel).await?;
                self.set_state(ConnectionState::Connected);
                return Ok(());
            }
        }

        self.set_state(ConnectionState::Connecting);
        let result = match self.open().await {
            Ok(fresh) => self.declare_queue(&fresh.channel).await.map(|()| fresh),
            Err(e) => Err(e),
        };

        match result {
            Ok(fresh) => {
                *link = Some(fresh);
                self.set_state(ConnectionState::Connected);
                info!("connected to AMQP broker");
                Ok(())
            }
            Err(e) => {
                *link = None;
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    #[instrument(
        skip(self, message),
        fields(queue = %self.queue, event_type = %message.event_type())
    )]
    async fn publish(&self, message: &IntegrationEvent) -> Result<(), BusError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(BusError::NotConnected(state));
        }

        let channel = match self.link.lock().await.as_ref() {
            Some(link) => link.channel.clone(),
            None => return Err(BusError::NotConnected(ConnectionState::Disconnected)),
        };

        let payload = message.to_bytes().map_err(|e| BusError::Serialize(e.to_string()))?;
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type(CONTENT_TYPE_JSON.into());

        let published = channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await;

        match published {
            Ok(_confirm) => Ok(()),
            Err(e) => {
                if !channel.status().connected() {
                    self.set_state(ConnectionState::Disconnected);
                }
                Err(BusError::Transport(format!("basic_publish failed: {e}")))
            }
        }
    }
}
