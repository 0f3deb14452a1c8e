//! In-memory product table

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::{
    lookup::{LookupError, ProductLookup},
    products::{ProductFilter, ProductPk, ProductRef},
};

/// In-memory product table for a single model.
///
/// Clones share the same table, so a registry entry observes later inserts and deletes.
#[derive(Debug, Clone, Default)]
pub struct MemoryProducts {
    products: Arc<RwLock<FxHashMap<ProductPk, ProductRef>>>,
}

impl MemoryProducts {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the given products.
    pub fn with_products(products: impl IntoIterator<Item = ProductRef>) -> Self {
        let table = Self::new();

        for product in products {
            table.insert(product);
        }

        table
    }

    /// Insert or replace a product, keyed by its primary key.
    pub fn insert(&self, product: ProductRef) -> Option<ProductRef> {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product.pk(), product)
    }

    /// Delete a product.
    pub fn remove(&self, pk: &ProductPk) -> Option<ProductRef> {
        self.products
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(pk)
    }

    /// Returns the product stored under `pk`.
    pub fn get(&self, pk: &ProductPk) -> Option<ProductRef> {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pk)
            .cloned()
    }

    /// Number of stored products.
    pub fn len(&self) -> usize {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProductLookup for MemoryProducts {
    async fn fetch(
        &self,
        pks: &[ProductPk],
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRef>, LookupError> {
        let products = self.products.read().unwrap_or_else(PoisonError::into_inner);

        Ok(pks
            .iter()
            .filter_map(|pk| products.get(pk))
            .filter(|product| filter.matches(product.as_ref()))
            .cloned()
            .collect())
    }
}
