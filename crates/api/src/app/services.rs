//! Composition root: credentials, store, broker and the update pipeline.
//!
//! Startup order is fixed. Secrets resolve first and a failure aborts; the
//! store client and broker are built from them; the broker connection is
//! attempted once and a failure there is only logged (updates still succeed,
//! their events are reported as unpublished).

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use productsvc_events::{ConnectionState, EventBus, InMemoryEventBus, IntegrationEvent};
use productsvc_infra::secrets::{self, EnvSecretsBootstrap};
use productsvc_infra::{
    BootstrapError, BrokerKind, BrokerPublisher, Credentials, InMemoryProductStore, ProductStore,
    ProductUpdateDispatcher, SecretsSource, ServiceConfig, StoreBackend,
};

pub type DynStore = Arc<dyn ProductStore>;
pub type DynBus = Arc<dyn EventBus<IntegrationEvent>>;
pub type Dispatcher = ProductUpdateDispatcher<DynStore, DynBus>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// A backend that needs credentials was selected with `SECRETS_SOURCE=none`.
    #[error("{0} requires credentials but no secrets source is configured")]
    MissingCredentials(&'static str),

    /// The binary was built without the feature the configuration asks for.
    #[error("{backend} is not available in this build (enable the `{feature}` feature)")]
    Unsupported {
        backend: &'static str,
        feature: &'static str,
    },

    #[error("broker setup failed: {0}")]
    Broker(String),
}

/// Everything the HTTP handlers need.
pub struct AppServices {
    dispatcher: Dispatcher,
}

impl AppServices {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Wire a store and bus with the timeouts from `config`. No IO.
    pub fn from_parts(store: DynStore, bus: DynBus, config: &ServiceConfig) -> Self {
        let publisher = BrokerPublisher::new(bus, config.publish_timeout);
        Self::new(ProductUpdateDispatcher::new(store, publisher, config.store_timeout))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Open the broker channel and declare the queue.
    pub async fn connect(&self) -> ConnectionState {
        self.dispatcher.publisher().connect().await
    }
}

/// Build the production service graph from configuration.
pub async fn build_services(config: &ServiceConfig) -> Result<AppServices, StartupError> {
    let credentials = resolve_credentials(config).await?;

    let store = build_store(config, credentials.as_ref())?;
    let bus = build_bus(config)?;

    let services = AppServices::from_parts(store, bus, config);
    let state = services.connect().await;
    if state.is_connected() {
        info!(queue = %config.queue, "broker connected");
    } else {
        warn!(queue = %config.queue, state = %state, "starting without a broker connection");
    }

    Ok(services)
}

async fn resolve_credentials(config: &ServiceConfig) -> Result<Option<Credentials>, StartupError> {
    let limit = config.bootstrap_timeout;
    let credentials = match &config.secrets {
        SecretsSource::None => return Ok(None),
        SecretsSource::Env => secrets::resolve_with_timeout(&EnvSecretsBootstrap, limit).await?,
        #[cfg(feature = "aws")]
        SecretsSource::Lambda { function_name } => {
            let bootstrap =
                secrets::LambdaSecretsBootstrap::from_region(&config.region, function_name).await;
            secrets::resolve_with_timeout(&bootstrap, limit).await?
        }
        #[cfg(not(feature = "aws"))]
        SecretsSource::Lambda { .. } => {
            return Err(StartupError::Unsupported {
                backend: "lambda secrets",
                feature: "aws",
            });
        }
    };

    info!(source = ?config.secrets, "credentials resolved");
    Ok(Some(credentials))
}

fn build_store(
    config: &ServiceConfig,
    credentials: Option<&Credentials>,
) -> Result<DynStore, StartupError> {
    match config.store {
        StoreBackend::Memory => Ok(Arc::new(InMemoryProductStore::new())),
        #[cfg(feature = "aws")]
        StoreBackend::DynamoDb => {
            let credentials =
                credentials.ok_or(StartupError::MissingCredentials("dynamodb store"))?;
            Ok(Arc::new(productsvc_infra::store::DynamoDbProductStore::from_credentials(
                credentials,
                config.region.clone(),
                config.dynamodb_endpoint.as_deref(),
                config.table.clone(),
            )))
        }
        #[cfg(not(feature = "aws"))]
        StoreBackend::DynamoDb => {
            let _ = credentials;
            Err(StartupError::Unsupported {
                backend: "dynamodb store",
                feature: "aws",
            })
        }
    }
}

fn build_bus(config: &ServiceConfig) -> Result<DynBus, StartupError> {
    match &config.broker {
        BrokerKind::Memory => Ok(Arc::new(InMemoryEventBus::new(config.queue.clone()))),
        #[cfg(feature = "amqp")]
        BrokerKind::Amqp(url) => Ok(Arc::new(productsvc_infra::event_bus::AmqpEventBus::new(
            url.clone(),
            config.queue.clone(),
        ))),
        #[cfg(not(feature = "amqp"))]
        BrokerKind::Amqp(_) => Err(StartupError::Unsupported {
            backend: "amqp broker",
            feature: "amqp",
        }),
        #[cfg(feature = "redis")]
        BrokerKind::Redis(url) => {
            let bus =
                productsvc_infra::event_bus::RedisStreamsEventBus::new(url, config.queue.clone())
                    .map_err(|e| StartupError::Broker(e.to_string()))?;
            Ok(Arc::new(bus))
        }
        #[cfg(not(feature = "redis"))]
        BrokerKind::Redis(_) => Err(StartupError::Unsupported {
            backend: "redis broker",
            feature: "redis",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_builds_in_memory_graph() {
        let services = build_services(&ServiceConfig::default()).await.unwrap();
        assert_eq!(services.dispatcher().publisher().state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn dynamodb_without_secrets_source_is_refused() {
        let config = ServiceConfig {
            store: StoreBackend::DynamoDb,
            ..ServiceConfig::default()
        };
        let err = build_services(&config).await.err().unwrap();
        assert!(matches!(
            err,
            StartupError::MissingCredentials(_) | StartupError::Unsupported { .. }
        ));
    }
}
