//! Cart configuration

use clap::Args;

use crate::products::ProductFilter;

/// Session key carts are stored under when none is configured.
pub const DEFAULT_SESSION_KEY: &str = "CART";

/// Cart settings.
#[derive(Debug, Clone, Args)]
pub struct CartConfig {
    /// Session key the cart is stored under
    #[arg(long, env = "CART_SESSION_KEY", default_value = DEFAULT_SESSION_KEY)]
    pub session_key: String,

    /// Product lookup filter applied when rehydrating carts, as a JSON object of field/value pairs
    #[arg(long, env = "CART_PRODUCT_LOOKUP", default_value = "{}")]
    pub product_lookup: ProductFilter,
}

impl CartConfig {
    /// Store the cart under a different session key.
    #[must_use]
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self
    }

    /// Only rehydrate products matching `filter`.
    #[must_use]
    pub fn with_product_lookup(mut self, filter: ProductFilter) -> Self {
        self.product_lookup = filter;
        self
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.to_string(),
            product_lookup: ProductFilter::new(),
        }
    }
}
