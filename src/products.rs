//! Products
//!
//! Carts never own product records. They hold shared references to records resolved by a
//! [`ProductLookup`](crate::lookup::ProductLookup) and identify them by model and primary key.

use std::{
    any::type_name,
    convert::Infallible,
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
    sync::Arc,
};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Product primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductPk {
    /// Integer key
    Int(i64),

    /// String key (slugs, UUIDs, SKUs)
    Str(String),
}

impl Display for ProductPk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(pk) => write!(f, "{pk}"),
            Self::Str(pk) => f.write_str(pk),
        }
    }
}

impl From<i64> for ProductPk {
    fn from(pk: i64) -> Self {
        Self::Int(pk)
    }
}

impl From<&str> for ProductPk {
    fn from(pk: &str) -> Self {
        Self::Str(pk.to_string())
    }
}

impl From<String> for ProductPk {
    fn from(pk: String) -> Self {
        Self::Str(pk)
    }
}

impl ProductPk {
    /// Parse a stringified key, as stored in session maps and given on the command line.
    ///
    /// Integer-looking input becomes [`ProductPk::Int`], anything else a string key.
    pub fn from_key(key: &str) -> Self {
        key.parse::<i64>().map_or_else(|_| Self::from(key), Self::Int)
    }
}

impl FromStr for ProductPk {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_key(s))
    }
}

/// A purchasable record owned by the application's product tables.
pub trait Product: Debug + Send + Sync {
    /// The record's primary key.
    fn pk(&self) -> ProductPk;

    /// Identifier of the model this record belongs to.
    ///
    /// Defaults to the implementing type's path, so `shop::models::Ticket` records are kept
    /// apart from `shop::models::Product` records sharing the same primary key.
    fn model(&self) -> &str {
        type_name::<Self>()
    }

    /// Field access used when applying a [`ProductFilter`].
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Shared product reference held by carts
pub type ProductRef = Arc<dyn Product>;

/// Errors parsing a product filter.
#[derive(Debug, Error)]
pub enum ProductFilterError {
    /// The filter was not a JSON object of field/value pairs.
    #[error("invalid product lookup filter: {0}")]
    Json(#[from] serde_json::Error),
}

/// Field equality filter applied to product lookups.
///
/// A product matches when every field's attribute equals the expected value. An empty filter
/// matches every product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductFilter(FxHashMap<String, Value>);

impl ProductFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Check whether the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the `(field, expected value)` conditions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Check a product against every condition.
    pub fn matches(&self, product: &dyn Product) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| product.attribute(field).as_ref() == Some(expected))
    }
}

impl FromStr for ProductFilter {
    type Err = ProductFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(serde_json::from_str(s)?))
    }
}
