//! Fixtures
//!
//! YAML product catalogs for tests, demos and the CLI:
//!
//! ```yaml
//! models:
//!   shop.Product:
//!     - pk: 1
//!       name: Shirt
//!       price: "9.99"
//!       available: true
//!   shop.Ticket:
//!     - pk: gala
//!       name: Gala Night
//!       price: "120.00"
//! ```

use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use thiserror::Error;

use crate::{
    lookup::{MemoryProducts, ProductRegistry},
    products::{Product, ProductPk, ProductRef},
};

pub mod products;

pub use products::CatalogProduct;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The same primary key appears twice within a model
    #[error("Duplicate product {pk} in model {model}")]
    DuplicateProduct {
        /// Model identifier
        model: String,
        /// Repeated primary key
        pk: ProductPk,
    },
}

/// Product tables loaded from a catalog fixture, one per model.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: BTreeMap<String, MemoryProducts>,
}

impl Catalog {
    /// Parse a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a model lists the same primary key twice.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let fixture: products::CatalogFixture = serde_norway::from_str(contents)?;

        let mut models = BTreeMap::new();

        for (model, records) in fixture.models {
            let table = MemoryProducts::new();

            for record in records {
                let product = CatalogProduct::new(model.clone(), record);
                let pk = product.pk();

                if table.insert(Arc::new(product)).is_some() {
                    return Err(FixtureError::DuplicateProduct { model, pk });
                }
            }

            models.insert(model, table);
        }

        Ok(Self { models })
    }

    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Returns the product table for `model`.
    pub fn products(&self, model: &str) -> Option<&MemoryProducts> {
        self.models.get(model)
    }

    /// Returns a single product.
    pub fn product(&self, model: &str, pk: &ProductPk) -> Option<ProductRef> {
        self.models.get(model)?.get(pk)
    }

    /// Iterate over the model identifiers in the catalog.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// A registry resolving every catalog model from its in-memory table.
    ///
    /// The registry shares the catalog's tables, so later deletes are visible to it.
    pub fn registry(&self) -> ProductRegistry {
        let mut registry = ProductRegistry::new();

        for (model, table) in &self.models {
            registry.register(model.clone(), table.clone());
        }

        registry
    }
}
