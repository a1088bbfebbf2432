use serde::Serialize;

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **named** by a stable type string that downstream consumers switch on
/// - serialized as the `data` member of an [`IntegrationEvent`](crate::IntegrationEvent)
pub trait Event: Clone + core::fmt::Debug + Serialize + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "ProductUpdated").
    const EVENT_TYPE: &'static str;

    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}
