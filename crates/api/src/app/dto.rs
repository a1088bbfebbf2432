use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use productsvc_infra::UpdatedFields;
use productsvc_products::UpdateProduct;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `PUT /products/{productId}`.
///
/// All three keys are required and an absent one is answered with `400`. The
/// values themselves are not type-checked: whatever JSON arrives (including
/// `null`) is written and announced as is. The schema shows the usual types.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Phone")]
    pub name: Option<JsonValue>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Electronics")]
    pub category: Option<JsonValue>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<f64>, example = 5)]
    pub quantity: Option<JsonValue>,
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl UpdateProductRequest {
    pub fn into_command(self, product_id: String) -> UpdateProduct {
        UpdateProduct {
            product_id: Some(product_id),
            name: self.name,
            category: self.category,
            quantity: self.quantity,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateProductResponse {
    #[schema(example = "Product updated")]
    pub message: String,
    pub result: UpdateResult,
}

/// The attributes the store reports as written.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateResult {
    #[serde(rename = "Attributes")]
    #[schema(value_type = Object)]
    pub attributes: UpdatedFields,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: JsonValue) -> UpdateProductRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn absent_keys_are_none_and_null_is_a_value() {
        let req = parse(json!({"name": null, "quantity": "5"}));
        assert_eq!(req.name, Some(JsonValue::Null));
        assert_eq!(req.category, None);
        assert_eq!(req.quantity, Some(json!("5")));
    }

    #[test]
    fn command_carries_the_path_id() {
        let cmd = parse(json!({"name": "Phone", "category": "Electronics", "quantity": 5}))
            .into_command("P1".to_string());
        assert_eq!(cmd, UpdateProduct::new("P1", "Phone", "Electronics", 5));
    }
}
