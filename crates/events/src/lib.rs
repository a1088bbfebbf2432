//! Integration event mechanics: the wire envelope and the broker abstraction.
//!
//! Domain crates define their own typed events (implementing [`Event`]); this
//! crate turns them into the `{eventType, data}` documents consumers read and
//! defines how they are handed to a broker.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{BusError, ConnectionState, EventBus, Subscription};
pub use envelope::IntegrationEvent;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
