//! Product store clients.
//!
//! The store is the source of truth for product records. The update path only
//! needs one operation: a conditional partial update by key.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use productsvc_core::ProductId;
use productsvc_products::ProductChanges;

pub mod in_memory;

#[cfg(feature = "aws")]
pub mod dynamodb;

pub use in_memory::InMemoryProductStore;

#[cfg(feature = "aws")]
pub use dynamodb::DynamoDbProductStore;

/// Store operation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record exists for the key; nothing was written.
    #[error("record not found")]
    NotFound,

    /// The backend rejected or failed the request.
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store call timed out")]
    Timeout,
}

/// The attribute values the store reports after an update (only the fields
/// the update touched, as written).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatedFields(Map<String, JsonValue>);

impl UpdatedFields {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self(fields)
    }

    /// The fields a change set writes, in store attribute naming.
    pub fn from_changes(changes: &ProductChanges) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), changes.name.clone());
        fields.insert("category".to_string(), changes.category.clone());
        fields.insert("quantity".to_string(), changes.quantity.clone());
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Conditional partial update of a product record.
///
/// Contract:
/// - Fails with [`StoreError::NotFound`] when no record exists for `key`
///   (nothing is created).
/// - Overwrites only the fields in `changes`; other attributes are kept.
/// - Re-applying the same `(key, changes)` yields the same record.
/// - Concurrent updates to one key are last-writer-wins per field; there is no
///   version check.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn update(
        &self,
        key: &ProductId,
        changes: &ProductChanges,
    ) -> Result<UpdatedFields, StoreError>;
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn update(
        &self,
        key: &ProductId,
        changes: &ProductChanges,
    ) -> Result<UpdatedFields, StoreError> {
        (**self).update(key, changes).await
    }
}
