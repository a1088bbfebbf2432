//! Broker publishing abstraction (mechanics only).
//!
//! This module describes the **event bus pattern** as this service uses it: a
//! single durable queue that the service writes to and downstream consumers
//! read from.
//!
//! ## Design Philosophy
//!
//! The bus is intentionally **lightweight** and makes minimal assumptions:
//!
//! - **Transport-agnostic**: Works with in-memory queues, AMQP, Redis Streams, etc.
//! - **Durable**: Messages are marked persistent so the broker keeps them across restarts
//! - **Fire-and-forget**: `publish` returns once the broker has the message, never
//!   waiting for a consumer acknowledgement
//! - **No deduplication**: Publishing the same event twice produces two messages;
//!   consumers must be idempotent
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Disconnected ──declare()──▶ Connecting ──ok──▶ Connected
//!      ▲                          │                  │
//!      └──────────── error ───────┴── connection lost┘
//! ```
//!
//! There is no reconnect loop. A bus that is not `Connected` rejects `publish`
//! with [`BusError::NotConnected`]; it never blocks waiting for a connection.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Connection state of a broker channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker operation error.
///
/// These are **infrastructure errors**. Callers on the update path treat all of
/// them the same way: report and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The channel is not connected (never connected, or the connection was lost).
    #[error("broker channel is not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// The message could not be encoded for the wire.
    #[error("failed to serialize message: {0}")]
    Serialize(String),

    /// The broker or the network rejected the operation.
    #[error("broker transport error: {0}")]
    Transport(String),

    /// The operation did not complete within its time bound.
    #[error("broker operation timed out after {0:?}")]
    Timeout(Duration),
}

/// A subscription to the messages a bus accepted.
///
/// Only used by in-process buses (tests/dev); remote brokers are consumed by
/// separate services.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic durable queue publisher.
///
/// An `EventBus` owns one channel to a broker and one named durable queue on it.
///
/// ## Architecture Role
///
/// ```text
/// Store write (committed) → EventBus::publish → durable queue → consumers
/// ```
///
/// The store is the source of truth. The bus only announces changes that
/// already happened, so a bus error must never undo or fail the write.
///
/// ## Idempotent declaration
///
/// `declare()` opens the channel (if needed) and declares the queue as durable.
/// Calling it again with the same parameters is a no-op on the broker side:
/// no error and no second queue.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`. Implementations must allow concurrent
/// `publish` calls, either because the underlying channel serializes frame
/// writes or by serializing publishes internally.
#[async_trait]
pub trait EventBus<M>: Send + Sync
where
    M: Send + Sync + 'static,
{
    /// Name of the durable queue this bus writes to.
    fn queue(&self) -> &str;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Connect (if needed) and declare the durable queue. Idempotent.
    async fn declare(&self) -> Result<(), BusError>;

    /// Hand a message to the broker as a persistent message.
    async fn publish(&self, message: &M) -> Result<(), BusError>;
}

#[async_trait]
impl<M, B> EventBus<M> for Arc<B>
where
    M: Send + Sync + 'static,
    B: EventBus<M> + ?Sized,
{
    fn queue(&self) -> &str {
        (**self).queue()
    }

    fn state(&self) -> ConnectionState {
        (**self).state()
    }

    async fn declare(&self) -> Result<(), BusError> {
        (**self).declare().await
    }

    async fn publish(&self, message: &M) -> Result<(), BusError> {
        (**self).publish(message).await
    }
}
