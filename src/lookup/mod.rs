//! Product Lookups
//!
//! Carts re-resolve their products on every load. Each model identifier stored in a session
//! maps to a [`ProductLookup`] through the [`ProductRegistry`].

use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::products::{Product, ProductFilter, ProductPk, ProductRef};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryProducts;
#[cfg(feature = "postgres")]
pub use postgres::{PgProduct, PgProductLookup};

/// Errors raised while fetching products.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Storage error
    #[cfg(feature = "postgres")]
    #[error("storage error")]
    Sql(#[from] sqlx::Error),

    /// A table, column or field name that cannot be used as an SQL identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A fetched record lacks its primary key column.
    #[error("record has no {0} column")]
    MissingColumn(String),

    /// A fetched record could not be turned into a product.
    #[error("invalid product record: {0}")]
    InvalidRecord(#[source] serde_json::Error),

    /// Any other backend failure.
    #[error("product lookup failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Source of live product records for one model.
#[automock]
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Fetch the products among `pks` that still exist and satisfy `filter`.
    ///
    /// Missing keys are skipped, never reported as errors.
    async fn fetch(
        &self,
        pks: &[ProductPk],
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRef>, LookupError>;
}

/// Maps model identifiers to the lookup that resolves their records.
#[derive(Clone, Default)]
pub struct ProductRegistry {
    lookups: FxHashMap<String, Arc<dyn ProductLookup>>,
}

impl ProductRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `lookup` for the given model identifier, replacing any previous one.
    pub fn register(
        &mut self,
        model: impl Into<String>,
        lookup: impl ProductLookup + 'static,
    ) -> &mut Self {
        self.lookups.insert(model.into(), Arc::new(lookup));
        self
    }

    /// Register `lookup` under the default model identifier of `P`.
    pub fn register_type<P: Product>(
        &mut self,
        lookup: impl ProductLookup + 'static,
    ) -> &mut Self {
        self.register(std::any::type_name::<P>(), lookup)
    }

    /// Builder form of [`ProductRegistry::register`].
    #[must_use]
    pub fn with(mut self, model: impl Into<String>, lookup: impl ProductLookup + 'static) -> Self {
        self.register(model, lookup);
        self
    }

    /// Returns the lookup registered for `model`.
    pub fn get(&self, model: &str) -> Option<&Arc<dyn ProductLookup>> {
        self.lookups.get(model)
    }

    /// Iterate over the registered model identifiers.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.lookups.keys().map(String::as_str)
    }
}

impl Debug for ProductRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut models: Vec<&str> = self.models().collect();
        models.sort_unstable();

        f.debug_struct("ProductRegistry")
            .field("models", &models)
            .finish()
    }
}
