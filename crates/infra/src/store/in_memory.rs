use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use productsvc_core::{Entity, ProductId};
use productsvc_products::{Product, ProductChanges};

use super::{ProductStore, StoreError, UpdatedFields};

/// In-memory product table.
///
/// Intended for tests/dev. Records must be seeded before they can be updated,
/// mirroring the conditional update of the real store.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    records: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn seed(&self, product: Product) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(product.id().clone(), product);
    }

    pub fn get(&self, key: &ProductId) -> Option<Product> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn update(
        &self,
        key: &ProductId,
        changes: &ProductChanges,
    ) -> Result<UpdatedFields, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let record = records.get_mut(key).ok_or(StoreError::NotFound)?;
        record.apply(changes);

        Ok(UpdatedFields::from_changes(changes))
    }
}
