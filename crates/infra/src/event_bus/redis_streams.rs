//! Redis Streams-backed event bus (durable queue semantics).
//!
//! The queue name is used as the stream key:
//! - **Declare**: `XGROUP CREATE <queue> <queue>:consumers 0 MKSTREAM` creates the
//!   stream and its default consumer group; an existing group (`BUSYGROUP`) is
//!   not an error, so declaring twice is a no-op
//! - **Publish**: `XADD <queue> * event_type <type> event <json>`
//! - **Durability**: entries live until trimmed; persistence across restarts
//!   follows the server's AOF/RDB settings
//!
//! All IO goes through one async multiplexed connection. The connection state
//! sits in its own lock that is never held across a network call, so a
//! stalled server can only stall the call in flight, which the caller's
//! timeout then abandons.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use productsvc_events::{BusError, ConnectionState, EventBus, IntegrationEvent};

pub struct RedisStreamsEventBus {
    client: redis::Client,
    stream_key: String,
    group: String,
    state: Arc<Mutex<ConnectionState>>,
    conn: AsyncMutex<Option<MultiplexedConnection>>,
}

impl std::fmt::Debug for RedisStreamsEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsEventBus")
            .field("stream_key", &self.stream_key)
            .field("group", &self.group)
            .field("state", &self.state())
            .finish()
    }
}

impl RedisStreamsEventBus {
    /// Create a bus for `queue` on the server at `redis_url` (no IO yet).
    pub fn new(redis_url: impl AsRef<str>, queue: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BusError::Transport(e.to_string()))?;
        let stream_key = queue.into();

        Ok(Self {
            client,
            group: format!("{stream_key}:consumers"),
            stream_key,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            conn: AsyncMutex::new(None),
        })
    }

    pub fn consumer_group(&self) -> &str {
        &self.group
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Forget the connection after an IO failure; the next declare reconnects.
    async fn drop_connection(&self, error: &redis::RedisError) {
        if error.is_io_error() || error.is_connection_dropped() {
            warn!(stream_key = %self.stream_key, error = %error, "redis connection lost");
            *self.conn.lock().await = None;
            self.set_state(ConnectionState::Disconnected);
        }
    }
}

#[async_trait]
impl EventBus<IntegrationEvent> for RedisStreamsEventBus {
    fn queue(&self) -> &str {
        &self.stream_key
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[instrument(skip(self), fields(stream_key = %self.stream_key), err)]
    async fn declare(&self) -> Result<(), BusError> {
        let mut conn = {
            let mut slot = self.conn.lock().await;
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    self.set_state(ConnectionState::Connecting);
                    match self.client.get_multiplexed_tokio_connection().await {
                        Ok(fresh) => {
                            *slot = Some(fresh.clone());
                            fresh
                        }
                        Err(e) => {
                            self.set_state(ConnectionState::Disconnected);
                            return Err(BusError::Transport(format!("connect failed: {e}")));
                        }
                    }
                }
            }
        };

        let created: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(_) => {}
            Err(e) if e.code() == Some("BUSYGROUP") => {
                debug!("stream already declared");
            }
            Err(e) => {
                self.drop_connection(&e).await;
                self.set_state(ConnectionState::Disconnected);
                return Err(BusError::Transport(format!("XGROUP CREATE failed: {e}")));
            }
        }

        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    #[instrument(
        skip(self, message),
        fields(stream_key = %self.stream_key, event_type = %message.event_type())
    )]
    async fn publish(&self, message: &IntegrationEvent) -> Result<(), BusError> {
        let state = self.state();
        if !state.is_connected() {
            return Err(BusError::NotConnected(state));
        }

        let Some(mut conn) = self.conn.lock().await.clone() else {
            return Err(BusError::NotConnected(ConnectionState::Disconnected));
        };

        let payload =
            serde_json::to_string(message).map_err(|e| BusError::Serialize(e.to_string()))?;

        let added: redis::RedisResult<String> = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*") // Auto-generate message ID
            .arg("event_type")
            .arg(message.event_type())
            .arg("event")
            .arg(payload)
            .query_async(&mut conn)
            .await;

        match added {
            Ok(id) => {
                debug!(message_id = %id, "event appended");
                Ok(())
            }
            Err(e) => {
                self.drop_connection(&e).await;
                Err(BusError::Transport(format!("XADD failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::publisher::{BrokerPublisher, PublishOutcome};

    /// Reads one RESP line starting at `pos`.
    fn read_line<'a>(buf: &'a [u8], pos: &mut usize) -> Option<&'a str> {
        let rest = &buf[*pos..];
        let end = rest.windows(2).position(|w| w == b"\r\n")?;
        let line = std::str::from_utf8(&rest[..end]).ok()?;
        *pos += end + 2;
        Some(line)
    }

    /// Parses one complete RESP command, returning its name and encoded length.
    fn parse_command(buf: &[u8]) -> Option<(String, usize)> {
        let mut pos = 0;
        let count: usize = read_line(buf, &mut pos)?.strip_prefix('*')?.parse().ok()?;
        let mut name = String::new();
        for i in 0..count {
            let len: usize = read_line(buf, &mut pos)?.strip_prefix('$')?.parse().ok()?;
            if buf.len() < pos + len + 2 {
                return None;
            }
            if i == 0 {
                name = String::from_utf8_lossy(&buf[pos..pos + len]).into_owned();
            }
            pos += len + 2;
        }
        Some((name, pos))
    }

    /// A server that answers `+OK` to everything and goes silent on `XADD`.
    async fn server_that_stalls_on_xadd() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}/", listener.local_addr().unwrap());

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    loop {
                        let n = match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                        while let Some((name, used)) = parse_command(&buf) {
                            buf.drain(..used);
                            if name.eq_ignore_ascii_case("XADD") {
                                std::future::pending::<()>().await;
                            }
                            if socket.write_all(b"+OK\r\n").await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        url
    }

    #[test]
    fn consumer_group_is_derived_from_queue() {
        let bus = RedisStreamsEventBus::new("redis://127.0.0.1/", "product-events").unwrap();
        assert_eq!(bus.queue(), "product-events");
        assert_eq!(bus.consumer_group(), "product-events:consumers");
        assert_eq!(bus.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            RedisStreamsEventBus::new("not a url", "q"),
            Err(BusError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn publish_without_declare_fails_fast() {
        let bus = RedisStreamsEventBus::new("redis://127.0.0.1/", "q").unwrap();
        let event = IntegrationEvent::new("ProductUpdated", json!({"productId": "P1"}));
        assert_eq!(
            bus.publish(&event).await,
            Err(BusError::NotConnected(ConnectionState::Disconnected))
        );
    }

    #[tokio::test]
    async fn stalled_server_only_costs_each_publish_its_timeout() {
        let url = server_that_stalls_on_xadd().await;
        let limit = Duration::from_millis(200);
        let bus = RedisStreamsEventBus::new(&url, "product-events").unwrap();
        let publisher = BrokerPublisher::new(bus, limit);

        assert_eq!(publisher.connect().await, ConnectionState::Connected);

        let event = IntegrationEvent::new("ProductUpdated", json!({"productId": "P1"}));
        for _ in 0..2 {
            let outcome =
                tokio::time::timeout(Duration::from_secs(2), publisher.publish_envelope(&event))
                    .await
                    .expect("publish must return once its timeout elapses");
            assert_eq!(outcome, PublishOutcome::Failed(BusError::Timeout(limit)));
        }

        // Neither state reads nor a reconnect attempt wait on the stalled call.
        assert_eq!(publisher.state(), ConnectionState::Connected);
        tokio::time::timeout(Duration::from_secs(2), publisher.connect())
            .await
            .expect("connect must return once its timeout elapses");
    }
}
