//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a product.
///
/// Product ids are supplied by callers and treated as opaque strings; the only
/// rule is that they are not blank. The id is immutable once a record exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Build a product id, rejecting blank input.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_id("ProductId: must not be blank"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProductId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductId> for String {
    fn from(value: ProductId) -> Self {
        value.0
    }
}

impl FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_ids_are_rejected() {
        assert!(ProductId::new("").is_err());
        assert!(ProductId::new("   ").is_err());
        assert!("\t".parse::<ProductId>().is_err());
    }

    #[test]
    fn id_is_kept_verbatim() {
        let id = ProductId::new(" P1 ").unwrap();
        assert_eq!(id.as_str(), " P1 ");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ProductId::new("P1").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("P1"));

        let back: ProductId = serde_json::from_value(serde_json::json!("P1")).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<ProductId>(serde_json::json!("")).is_err());
    }

    proptest! {
        #[test]
        fn any_non_blank_string_is_accepted(s in "[A-Za-z0-9_-]{1,40}") {
            let id = ProductId::new(s.clone()).unwrap();
            prop_assert_eq!(id.to_string(), s);
        }
    }
}
