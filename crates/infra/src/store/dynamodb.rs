//! DynamoDB-backed product store.
//!
//! Updates are a single `UpdateItem` with `attribute_exists(productId)` as the
//! condition, so a missing record is reported instead of being created.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials as AwsCredentials, Region};
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use serde_json::{Map, Number, Value as JsonValue};
use tracing::{instrument, warn};

use productsvc_core::ProductId;
use productsvc_products::ProductChanges;

use super::{ProductStore, StoreError, UpdatedFields};
use crate::secrets::Credentials;

/// Partition key attribute of the products table.
const KEY_ATTRIBUTE: &str = "productId";

const UPDATE_EXPRESSION: &str = "SET #name = :name, #category = :category, #quantity = :quantity";

#[derive(Debug, Clone)]
pub struct DynamoDbProductStore {
    client: Client,
    table: String,
}

impl DynamoDbProductStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a client from bootstrap credentials.
    ///
    /// `endpoint` overrides the service URL (e.g. DynamoDB Local).
    pub fn from_credentials(
        credentials: &Credentials,
        region: impl Into<String>,
        endpoint: Option<&str>,
        table: impl Into<String>,
    ) -> Self {
        let provider = AwsCredentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
            None,
            "productsvc-bootstrap",
        );

        let mut builder = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .credentials_provider(provider);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(Client::from_conf(builder.build()), table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl ProductStore for DynamoDbProductStore {
    #[instrument(skip(self, changes), fields(table = %self.table, product_id = %key))]
    async fn update(
        &self,
        key: &ProductId,
        changes: &ProductChanges,
    ) -> Result<UpdatedFields, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(KEY_ATTRIBUTE, AttributeValue::S(key.to_string()))
            .update_expression(UPDATE_EXPRESSION)
            .condition_expression(format!("attribute_exists({KEY_ATTRIBUTE})"))
            .expression_attribute_names("#name", "name")
            .expression_attribute_names("#category", "category")
            .expression_attribute_names("#quantity", "quantity")
            .expression_attribute_values(":name", json_to_attribute(&changes.name))
            .expression_attribute_values(":category", json_to_attribute(&changes.category))
            .expression_attribute_values(":quantity", json_to_attribute(&changes.quantity))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await;

        match result {
            Ok(output) => Ok(fields_from_attributes(output.attributes())),
            Err(err) => {
                let rendered = DisplayErrorContext(&err).to_string();
                match err.into_service_error() {
                    UpdateItemError::ConditionalCheckFailedException(_) => {
                        Err(StoreError::NotFound)
                    }
                    _ => {
                        warn!(error = %rendered, "update_item failed");
                        Err(StoreError::Backend(rendered))
                    }
                }
            }
        }
    }
}

fn fields_from_attributes(attributes: Option<&HashMap<String, AttributeValue>>) -> UpdatedFields {
    let fields = attributes
        .into_iter()
        .flatten()
        .map(|(name, value)| (name.clone(), attribute_to_json(value)))
        .collect::<Map<_, _>>();
    UpdatedFields::new(fields)
}

/// Values are written with the type they arrived with; nothing is coerced.
fn json_to_attribute(value: &JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null(true),
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => AttributeValue::N(n.to_string()),
        JsonValue::String(s) => AttributeValue::S(s.clone()),
        JsonValue::Array(items) => AttributeValue::L(items.iter().map(json_to_attribute).collect()),
        JsonValue::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_attribute(v)))
                .collect(),
        ),
    }
}

fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::S(s) => JsonValue::String(s.clone()),
        AttributeValue::N(n) => serde_json::from_str::<Number>(n)
            .map(JsonValue::Number)
            .unwrap_or_else(|_| JsonValue::String(n.clone())),
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Null(_) => JsonValue::Null,
        AttributeValue::L(items) => JsonValue::Array(items.iter().map(attribute_to_json).collect()),
        AttributeValue::M(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect(),
        ),
        AttributeValue::Ss(items) => {
            JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
        }
        other => JsonValue::String(format!("{other:?}")),
    }
}
