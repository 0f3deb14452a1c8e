//! Product Fixtures

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_json::Value;

use crate::products::{Product, ProductPk};

/// Wrapper for products in YAML, grouped by model identifier
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Map of model identifier -> product records
    pub models: BTreeMap<String, Vec<ProductFixture>>,
}

/// Product record from YAML. Every field other than `pk` is kept as an attribute.
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product primary key
    pub pk: ProductPk,

    /// Remaining fields (name, price, availability flags, ...)
    #[serde(flatten)]
    pub attributes: FxHashMap<String, Value>,
}

/// Product loaded from a catalog fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    model: String,
    pk: ProductPk,
    attributes: FxHashMap<String, Value>,
}

impl CatalogProduct {
    /// Create a product of `model` from its fixture record.
    pub fn new(model: impl Into<String>, fixture: ProductFixture) -> Self {
        Self {
            model: model.into(),
            pk: fixture.pk,
            attributes: fixture.attributes,
        }
    }

    /// The product's `name` attribute, if it is a string.
    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }
}

impl Product for CatalogProduct {
    fn pk(&self) -> ProductPk {
        self.pk.clone()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }
}
