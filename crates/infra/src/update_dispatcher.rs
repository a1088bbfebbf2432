//! Product update pipeline (application-level orchestration).
//!
//! This module implements the update path end to end: validate the request,
//! write it to the store, and announce it on the broker.
//!
//! ## Execution Flow
//!
//! ```text
//! UpdateProduct
//!   ↓
//! 1. Validate shape (productId, name, category, quantity present)
//!   ↓                                      ✗ → DispatchError::Validation, nothing touched
//! 2. Store conditional update (bounded by a timeout)
//!   ↓                                      ✗ → DispatchError::NotFound / Store, nothing published
//! 3. Publish ProductUpdated built from the request values
//!   ↓                                      ✗ → reported to the failure sink, swallowed
//! 4. Return success
//! ```
//!
//! ## Consistency Contract
//!
//! The store is the source of truth and the write is never undone. The event
//! is an **at-most-once, best-effort** notification: it is only emitted for a
//! write that committed, and if publishing fails the caller still gets a
//! success. The store and the queue can therefore diverge (record updated, no
//! event); that divergence is always reported through the publisher's failure
//! sink. Closing the gap for good needs a transactional outbox, which this
//! pipeline does not have.
//!
//! Concurrent updates to the same product are not coordinated here. The store's
//! per-key semantics apply (last writer wins per field; no version check).

use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use productsvc_core::DomainError;
use productsvc_events::{EventBus, IntegrationEvent};
use productsvc_products::{Product, UpdateProduct};

use crate::publisher::{BrokerPublisher, PublishOutcome};
use crate::store::{ProductStore, StoreError, UpdatedFields};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The request was malformed; neither store nor broker were contacted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// No product exists for the id; nothing was written or published.
    #[error("product not found")]
    NotFound,

    /// The store failed or timed out; nothing was published.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => DispatchError::NotFound,
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        DispatchError::Validation(value.to_string())
    }
}

/// A committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The record as the request left it.
    pub product: Product,
    /// What the store reported as written.
    pub updated: UpdatedFields,
    /// Whether the announcement made it to the broker. Never affects success.
    pub publish: PublishOutcome,
}

/// Drives a product update through store and broker.
///
/// Generic over the store and the bus so tests run against in-memory
/// implementations and production against DynamoDB + AMQP/Redis, with the same
/// failure policy.
#[derive(Debug)]
pub struct ProductUpdateDispatcher<S, B> {
    store: S,
    publisher: BrokerPublisher<B>,
    store_timeout: Duration,
}

impl<S, B> ProductUpdateDispatcher<S, B> {
    pub fn new(store: S, publisher: BrokerPublisher<B>, store_timeout: Duration) -> Self {
        Self {
            store,
            publisher,
            store_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &BrokerPublisher<B> {
        &self.publisher
    }
}

impl<S, B> ProductUpdateDispatcher<S, B>
where
    S: ProductStore,
    B: EventBus<IntegrationEvent>,
{
    /// Apply an update and announce it.
    ///
    /// Returns an error only for failures that happen before or during the
    /// store write. Anything after a committed write is reported and folded
    /// into [`UpdateOutcome::publish`].
    #[instrument(
        skip(self, request),
        fields(product_id = request.product_id.as_deref().unwrap_or(""))
    )]
    pub async fn dispatch(&self, request: UpdateProduct) -> Result<UpdateOutcome, DispatchError> {
        // 1) Validate shape (no IO)
        let update = request.validate().map_err(|e| {
            warn!(error = %e, "rejected update request");
            DispatchError::from(e)
        })?;

        // 2) Store write (bounded)
        let updated = match tokio::time::timeout(
            self.store_timeout,
            self.store.update(&update.product_id, &update.changes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
        .map_err(|e| {
            warn!(error = %e, "store update failed; nothing published");
            DispatchError::from(e)
        })?;

        // 3) Announce the committed change (best-effort)
        let publish = self.publisher.publish(&update.to_event()).await;

        info!(published = publish.is_published(), "product updated");

        // 4) Success depends on the store write alone
        Ok(UpdateOutcome {
            product: update.to_product(),
            updated,
            publish,
        })
    }
}
