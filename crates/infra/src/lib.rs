//! Infrastructure layer: config, secrets, store and broker adapters, and the
//! update pipeline that composes them.

pub mod config;
pub mod event_bus;
pub mod publisher;
pub mod secrets;
pub mod store;
pub mod update_dispatcher;


pub use config::{BrokerKind, ConfigError, SecretsSource, ServiceConfig, StoreBackend};
pub use publisher::{BrokerPublisher, PublishFailureSink, PublishOutcome, TracingFailureSink};
pub use secrets::{BootstrapError, Credentials, SecretsBootstrap};
pub use store::{InMemoryProductStore, ProductStore, StoreError, UpdatedFields};
pub use update_dispatcher::{DispatchError, ProductUpdateDispatcher, UpdateOutcome};
