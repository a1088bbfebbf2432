//! Broker-backed event bus implementations.
//!
//! The bus abstraction lives in `productsvc-events` as pure mechanics. This
//! module provides the networked brokers; the in-memory bus from that crate is
//! used when no broker URL is configured.

#[cfg(feature = "amqp")]
pub mod amqp;
#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "amqp")]
pub use amqp::AmqpEventBus;
#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsEventBus;

/// `content_type` of every message put on a queue.
pub const CONTENT_TYPE_JSON: &str = "application/json";
