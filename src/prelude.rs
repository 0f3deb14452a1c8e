//! Carton prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartRepresentation},
    config::{CartConfig, DEFAULT_SESSION_KEY},
    fixtures::{Catalog, CatalogProduct, FixtureError},
    items::{CartItem, CartItemRecord},
    lookup::{LookupError, MemoryProducts, ProductLookup, ProductRegistry},
    products::{Product, ProductFilter, ProductFilterError, ProductPk, ProductRef},
    session::{MemorySession, Session},
    summary::{SummaryError, write_cart},
};

#[cfg(feature = "postgres")]
pub use crate::lookup::{PgProduct, PgProductLookup};
