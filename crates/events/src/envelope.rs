use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::event::Event;

/// Wire envelope for an event handed to the broker.
///
/// Serialized as `{"eventType": ..., "data": ...}`. This is the complete
/// document placed on the queue; nothing else is added so that consumers can
/// rely on the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationEvent<D = JsonValue> {
    event_type: String,
    data: D,
}

impl<D> IntegrationEvent<D> {
    pub fn new(event_type: impl Into<String>, data: D) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}

impl IntegrationEvent<JsonValue> {
    /// Wrap a typed domain event, serializing its payload to JSON.
    pub fn from_typed<E: Event>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event.event_type(), serde_json::to_value(event)?))
    }
}

impl<D: Serialize> IntegrationEvent<D> {
    /// Serialize the envelope into the bytes that go on the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
