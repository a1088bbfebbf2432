use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use productsvc_core::{DomainError, DomainResult, Entity, ProductId};
use productsvc_events::Event;

/// A product record as held by the store.
///
/// `name`, `category` and `quantity` are the attributes an update writes. Their
/// values are carried as given (`5` stays `5`, a string stays a string); only
/// their presence is ever checked. Any other attributes the record has are
/// kept in `attributes` and never touched by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    product_id: ProductId,
    name: JsonValue,
    category: JsonValue,
    quantity: JsonValue,
    #[serde(flatten)]
    attributes: Map<String, JsonValue>,
}

impl Product {
    pub fn new(
        product_id: ProductId,
        name: impl Into<JsonValue>,
        category: impl Into<JsonValue>,
        quantity: impl Into<JsonValue>,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            category: category.into(),
            quantity: quantity.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute outside the update's field set (e.g. `price`).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &JsonValue {
        &self.name
    }

    pub fn category(&self) -> &JsonValue {
        &self.category
    }

    pub fn quantity(&self) -> &JsonValue {
        &self.quantity
    }

    /// An attribute outside the update's field set.
    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    /// Merge a change set into this record.
    ///
    /// Only the fields named by `changes` are overwritten; the id and every
    /// other attribute are kept. Applying the same change set twice yields the
    /// same record.
    pub fn apply(&mut self, changes: &ProductChanges) {
        self.name.clone_from(&changes.name);
        self.category.clone_from(&changes.category);
        self.quantity.clone_from(&changes.quantity);
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

/// The set of attributes an update overwrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: JsonValue,
    pub category: JsonValue,
    pub quantity: JsonValue,
}

/// Command: UpdateProduct.
///
/// Built per request from untrusted input. `None` means the key was absent; an
/// explicit JSON `null` is a present value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateProduct {
    pub product_id: Option<String>,
    pub name: Option<JsonValue>,
    pub category: Option<JsonValue>,
    pub quantity: Option<JsonValue>,
}

/// An [`UpdateProduct`] whose fields are all present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpdate {
    pub product_id: ProductId,
    pub changes: ProductChanges,
}

impl UpdateProduct {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<JsonValue>,
        category: impl Into<JsonValue>,
        quantity: impl Into<JsonValue>,
    ) -> Self {
        Self {
            product_id: Some(product_id.into()),
            name: Some(name.into()),
            category: Some(category.into()),
            quantity: Some(quantity.into()),
        }
    }

    /// Check field presence. No type or range validation beyond that.
    ///
    /// The product id is checked first so a request without one is rejected
    /// before anything else is looked at.
    pub fn validate(self) -> DomainResult<ValidatedUpdate> {
        let product_id = self
            .product_id
            .ok_or(DomainError::missing("productId"))
            .and_then(ProductId::new)?;

        let changes = ProductChanges {
            name: self.name.ok_or(DomainError::missing("name"))?,
            category: self.category.ok_or(DomainError::missing("category"))?,
            quantity: self.quantity.ok_or(DomainError::missing("quantity"))?,
        };

        Ok(ValidatedUpdate {
            product_id,
            changes,
        })
    }
}

impl ValidatedUpdate {
    /// The updated fields as a record (attributes outside the change set are
    /// not known here).
    pub fn to_product(&self) -> Product {
        Product::new(
            self.product_id.clone(),
            self.changes.name.clone(),
            self.changes.category.clone(),
            self.changes.quantity.clone(),
        )
    }

    /// The event announcing this update, built from the request values.
    pub fn to_event(&self) -> ProductUpdated {
        ProductUpdated::from(self.to_product())
    }
}

/// Event: ProductUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: JsonValue,
    pub category: JsonValue,
    pub quantity: JsonValue,
}

impl Event for ProductUpdated {
    const EVENT_TYPE: &'static str = "ProductUpdated";
}

impl From<Product> for ProductUpdated {
    fn from(p: Product) -> Self {
        Self {
            product_id: p.product_id,
            name: p.name,
            category: p.category,
            quantity: p.quantity,
        }
    }
}
