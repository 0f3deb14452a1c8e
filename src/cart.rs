//! Cart
//!
//! A cart lives in the session as a nested map keyed by model identifier, then by stringified
//! primary key:
//!
//! ```json
//! {
//!     "shop.Ticket": {
//!         "1": {"product_pk": 1, "quantity": 2, "price": "9.99"},
//!         "2": {"product_pk": 2, "quantity": 3, "price": "29.99"}
//!     },
//!     "shop.Product": {
//!         "28": {"product_pk": 28, "quantity": 1, "price": "10.00"}
//!     }
//! }
//! ```
//!
//! Loading re-fetches every referenced product, so products deleted (or filtered out) since the
//! cart was stored silently drop out of it.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::CartConfig,
    items::{CartItem, CartItemRecord},
    lookup::{LookupError, ProductRegistry},
    products::{Product, ProductPk, ProductRef},
    session::Session,
};

/// Serialized cart: model identifier -> primary key -> item record.
pub type CartRepresentation = BTreeMap<String, BTreeMap<String, CartItemRecord>>;

/// Errors related to cart mutation and loading.
#[derive(Debug, Error)]
pub enum CartError {
    /// Products must be added at least once.
    #[error("quantity must be at least 1 when adding to cart, got {0}")]
    InvalidAddQuantity(i64),

    /// A product not yet in the cart was added without a price.
    #[error("missing price when adding to cart")]
    MissingPrice,

    /// Quantities cannot be set below zero.
    #[error("quantity must be positive when updating cart, got {0}")]
    NegativeQuantity(i64),

    /// An item quantity or the cart's item count does not fit in an `i64`.
    #[error("cart quantity overflow")]
    QuantityOverflow,

    /// A subtotal or the cart total does not fit in a `Decimal`.
    #[error("cart total overflow")]
    TotalOverflow,

    /// The session references a model with no registered lookup.
    #[error("no product lookup registered for model {0}")]
    UnknownModel(String),

    /// The stored cart could not be decoded.
    #[error("invalid cart session data: {0}")]
    Decode(#[source] serde_json::Error),

    /// The cart could not be encoded for the session.
    #[error("failed to serialize cart: {0}")]
    Encode(#[source] serde_json::Error),

    /// Wrapped product lookup error.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

fn product_key(product: &dyn Product) -> (String, String) {
    (product.model().to_string(), product.pk().to_string())
}

/// A shopping cart bound to one request's session.
#[derive(Debug)]
pub struct Cart<'s, S: Session + ?Sized> {
    session: &'s mut S,
    session_key: String,
    items: BTreeMap<String, BTreeMap<String, CartItem>>,
}

impl<'s, S: Session + ?Sized> Cart<'s, S> {
    /// Load the cart stored in `session`, or start an empty one.
    ///
    /// Stored items are rebuilt only for products the registered lookups still return under
    /// the configured filter, keeping their stored quantity and price.
    ///
    /// # Errors
    ///
    /// - [`CartError::Decode`]: the session value is not a cart.
    /// - [`CartError::UnknownModel`]: a stored model has no registered lookup.
    /// - [`CartError::Lookup`]: a lookup failed.
    #[tracing::instrument(
        name = "cart.load",
        skip(session, config, registry),
        fields(session_key = %config.session_key)
    )]
    pub async fn load(
        session: &'s mut S,
        config: &CartConfig,
        registry: &ProductRegistry,
    ) -> Result<Self, CartError> {
        let representation = match session.get(&config.session_key) {
            Some(stored) => CartRepresentation::deserialize(stored).map_err(CartError::Decode)?,
            None => CartRepresentation::new(),
        };

        let mut items: BTreeMap<String, BTreeMap<String, CartItem>> = BTreeMap::new();

        for (model, records) in representation {
            let lookup = registry
                .get(&model)
                .ok_or_else(|| CartError::UnknownModel(model.clone()))?;

            let pks: Vec<ProductPk> = records
                .keys()
                .map(|key| ProductPk::from_key(key))
                .collect();

            let products = lookup.fetch(&pks, &config.product_lookup).await?;

            let mut rebuilt = BTreeMap::new();

            for product in products {
                let pk = product.pk().to_string();

                if let Some(record) = records.get(&pk) {
                    rebuilt.insert(pk, CartItem::new(product, record.quantity, record.price));
                }
            }

            let dropped = records.len().saturating_sub(rebuilt.len());

            if dropped > 0 {
                warn!(%model, dropped, "dropped cart items for unavailable products");
            }

            if !rebuilt.is_empty() {
                items.insert(model, rebuilt);
            }
        }

        debug!(unique_count = items.values().map(BTreeMap::len).sum::<usize>(), "loaded cart");

        Ok(Self {
            session,
            session_key: config.session_key.clone(),
            items,
        })
    }

    /// Session key the cart is stored under.
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Add `quantity` of a product.
    ///
    /// A product already in the cart has its quantity increased and `price` is ignored; a new
    /// product requires a price.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidAddQuantity`]: `quantity` is below 1.
    /// - [`CartError::MissingPrice`]: the product is new and no price was given.
    /// - [`CartError::QuantityOverflow`]: the summed item quantity does not fit.
    /// - [`CartError::Encode`]: the cart could not be written to the session.
    pub fn add(
        &mut self,
        product: ProductRef,
        price: Option<Decimal>,
        quantity: i64,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidAddQuantity(quantity));
        }

        let (model, pk) = product_key(product.as_ref());

        if let Some(item) = self.item_mut(&model, &pk) {
            let quantity = item
                .quantity()
                .checked_add(quantity)
                .ok_or(CartError::QuantityOverflow)?;

            item.set_quantity(quantity);

            debug!(%model, %pk, quantity, "increased cart item quantity");
        } else {
            let price = price.ok_or(CartError::MissingPrice)?;

            debug!(%model, %pk, quantity, %price, "added cart item");

            self.items
                .entry(model)
                .or_default()
                .insert(pk, CartItem::new(product, quantity, price));
        }

        self.update_session()
    }

    /// Remove a product entirely. Does nothing if it is not in the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Encode`] if the cart could not be written to the session.
    pub fn remove(&mut self, product: &dyn Product) -> Result<(), CartError> {
        let (model, pk) = product_key(product);

        if self.take(&model, &pk).is_none() {
            return Ok(());
        }

        debug!(%model, %pk, "removed cart item");

        self.update_session()
    }

    /// Decrease a product's quantity by one, removing it instead of reaching zero.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Encode`] if the cart could not be written to the session.
    pub fn remove_single(&mut self, product: &dyn Product) -> Result<(), CartError> {
        let (model, pk) = product_key(product);

        let Some(item) = self.item_mut(&model, &pk) else {
            return Ok(());
        };

        if item.quantity() <= 1 {
            self.take(&model, &pk);

            debug!(%model, %pk, "removed last unit of cart item");
        } else {
            let quantity = item.quantity() - 1;

            item.set_quantity(quantity);

            debug!(%model, %pk, quantity, "decreased cart item quantity");
        }

        self.update_session()
    }

    /// Set a product's quantity; zero removes it. Does nothing if it is not in the cart.
    ///
    /// # Errors
    ///
    /// - [`CartError::NegativeQuantity`]: `quantity` is below zero.
    /// - [`CartError::Encode`]: the cart could not be written to the session.
    pub fn set_quantity(&mut self, product: &dyn Product, quantity: i64) -> Result<(), CartError> {
        if quantity < 0 {
            return Err(CartError::NegativeQuantity(quantity));
        }

        let (model, pk) = product_key(product);

        let Some(item) = self.item_mut(&model, &pk) else {
            return Ok(());
        };

        if quantity < 1 {
            self.take(&model, &pk);

            debug!(%model, %pk, "removed cart item by zero quantity");
        } else {
            item.set_quantity(quantity);

            debug!(%model, %pk, quantity, "set cart item quantity");
        }

        self.update_session()
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Encode`] if the cart could not be written to the session.
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();

        debug!("cleared cart");

        self.update_session()
    }

    /// Check whether a product is in the cart.
    pub fn contains(&self, product: &dyn Product) -> bool {
        let (model, pk) = product_key(product);

        self.items
            .get(&model)
            .is_some_and(|items| items.contains_key(&pk))
    }

    /// Iterate over every cart item.
    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.values().flat_map(BTreeMap::values)
    }

    /// Iterate over the products in the cart.
    pub fn products(&self) -> impl Iterator<Item = &ProductRef> {
        self.items().map(CartItem::product)
    }

    /// Sum of all item quantities.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::QuantityOverflow`] if the sum does not fit in an `i64`.
    pub fn count(&self) -> Result<i64, CartError> {
        self.items()
            .try_fold(0_i64, |count, item| count.checked_add(item.quantity()))
            .ok_or(CartError::QuantityOverflow)
    }

    /// Number of distinct products, regardless of quantity.
    pub fn unique_count(&self) -> usize {
        self.items.values().map(BTreeMap::len).sum()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.unique_count() == 0
    }

    /// Sum of all item subtotals, zero for an empty cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::TotalOverflow`] if a subtotal or the sum does not fit in a `Decimal`.
    pub fn total(&self) -> Result<Decimal, CartError> {
        self.items()
            .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal()?))
            .ok_or(CartError::TotalOverflow)
    }

    /// The cart in its session form.
    pub fn cart_serializable(&self) -> CartRepresentation {
        self.items
            .iter()
            .map(|(model, items)| {
                let records = items
                    .iter()
                    .map(|(pk, item)| (pk.clone(), item.to_record()))
                    .collect();

                (model.clone(), records)
            })
            .collect()
    }

    /// The `(model, items)` pairs of [`Cart::cart_serializable`].
    pub fn items_serializable(&self) -> Vec<(String, BTreeMap<String, CartItemRecord>)> {
        self.cart_serializable().into_iter().collect()
    }

    fn item_mut(&mut self, model: &str, pk: &str) -> Option<&mut CartItem> {
        self.items.get_mut(model)?.get_mut(pk)
    }

    fn take(&mut self, model: &str, pk: &str) -> Option<CartItem> {
        let items = self.items.get_mut(model)?;
        let item = items.remove(pk);

        if items.is_empty() {
            self.items.remove(model);
        }

        item
    }

    fn update_session(&mut self) -> Result<(), CartError> {
        let value = serde_json::to_value(self.cart_serializable()).map_err(CartError::Encode)?;

        self.session.insert(&self.session_key, value);
        self.session.mark_modified();

        debug!(
            session_key = %self.session_key,
            unique_count = self.unique_count(),
            "stored cart in session"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use testresult::TestResult;

    use crate::{
        lookup::{MemoryProducts, MockProductLookup},
        products::{
            ProductFilter,
            tests::{Shirt, Ticket},
        },
        session::MemorySession,
    };

    use super::*;

    const TICKETS: &str = "shop.Ticket";

    fn shirt(id: i64) -> ProductRef {
        Arc::new(Shirt {
            id,
            available: true,
        })
    }

    fn ticket(code: &'static str) -> ProductRef {
        Arc::new(Ticket { code })
    }

    fn price(value: &str) -> Result<Decimal, rust_decimal::Error> {
        value.parse()
    }

    fn shirts_model() -> &'static str {
        std::any::type_name::<Shirt>()
    }

    fn catalog() -> (MemoryProducts, MemoryProducts, ProductRegistry) {
        let shirts = MemoryProducts::with_products([shirt(1), shirt(2), shirt(3)]);
        let tickets = MemoryProducts::with_products([ticket("gala"), ticket("matinee")]);

        let registry = ProductRegistry::new()
            .with(shirts_model(), shirts.clone())
            .with(TICKETS, tickets.clone());

        (shirts, tickets, registry)
    }

    async fn empty_cart<'s>(
        session: &'s mut MemorySession,
        registry: &ProductRegistry,
    ) -> Result<Cart<'s, MemorySession>, CartError> {
        Cart::load(session, &CartConfig::default(), registry).await
    }

    #[tokio::test]
    async fn load_without_stored_cart_is_empty() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        let cart = empty_cart(&mut session, &registry).await?;

        assert!(cart.is_empty(), "new cart should be empty");
        assert_eq!(cart.count()?, 0, "empty cart count should be zero");
        assert_eq!(cart.total()?, Decimal::ZERO, "empty cart total should be zero");
        assert_eq!(cart.session_key(), "CART", "default session key should be used");
        assert!(!session.is_modified(), "loading should not modify the session");

        Ok(())
    }

    #[tokio::test]
    async fn adding_same_product_aggregates_quantity() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("9.99")?), 2)?;
        cart.add(shirt(1), Some(price("1.00")?), 3)?;

        let items: Vec<&CartItem> = cart.items().collect();

        let [item] = items.as_slice() else {
            panic!("expected a single item, got {}", items.len());
        };

        assert_eq!(item.quantity(), 5, "quantities should be summed");
        assert_eq!(item.price(), price("9.99")?, "first price should be kept");

        Ok(())
    }

    #[tokio::test]
    async fn adding_existing_product_does_not_need_price() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("9.99")?), 1)?;
        cart.add(shirt(1), None, 1)?;

        assert_eq!(cart.count()?, 2, "quantity should increase without a price");

        Ok(())
    }

    #[tokio::test]
    async fn adding_new_product_without_price_fails() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        let result = cart.add(shirt(1), None, 1);

        assert!(
            matches!(result, Err(CartError::MissingPrice)),
            "expected MissingPrice, got {result:?}"
        );
        assert!(cart.is_empty(), "failed add should leave the cart empty");
        assert!(cart.cart_serializable().is_empty(), "failed add should not serialize anything");

        Ok(())
    }

    #[tokio::test]
    async fn adding_less_than_one_fails() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        for quantity in [0, -1] {
            let result = cart.add(shirt(1), Some(price("9.99")?), quantity);

            assert!(
                matches!(result, Err(CartError::InvalidAddQuantity(q)) if q == quantity),
                "expected InvalidAddQuantity, got {result:?}"
            );
        }

        assert!(cart.is_empty(), "invalid quantities should add nothing");

        Ok(())
    }

    #[tokio::test]
    async fn adding_past_max_quantity_overflows() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("1")?), i64::MAX)?;

        let result = cart.add(shirt(1), None, 1);

        assert!(
            matches!(result, Err(CartError::QuantityOverflow)),
            "expected QuantityOverflow, got {result:?}"
        );
        assert_eq!(cart.count()?, i64::MAX, "failed add should keep the quantity");

        Ok(())
    }

    #[tokio::test]
    async fn count_overflow_across_items_is_an_error() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("1")?), i64::MAX)?;
        cart.add(shirt(2), Some(price("1")?), i64::MAX)?;

        let result = cart.count();

        assert!(
            matches!(result, Err(CartError::QuantityOverflow)),
            "expected QuantityOverflow, got {result:?}"
        );
        assert_eq!(cart.unique_count(), 2, "both items should stay in the cart");

        Ok(())
    }

    #[tokio::test]
    async fn total_overflow_is_an_error() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("100000000000")?), i64::MAX)?;

        let result = cart.total();

        assert!(
            matches!(result, Err(CartError::TotalOverflow)),
            "expected TotalOverflow, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn overflowing_session_loads_without_panicking() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        session.insert(
            "CART",
            json!({
                shirts_model(): {
                    "1": {"product_pk": 1, "quantity": i64::MAX, "price": "1"},
                    "2": {"product_pk": 2, "quantity": i64::MAX, "price": "1"},
                },
            }),
        );

        let cart = empty_cart(&mut session, &registry).await?;

        assert_eq!(cart.unique_count(), 2, "both items should be restored");
        assert!(
            matches!(cart.count(), Err(CartError::QuantityOverflow)),
            "count of reloaded cart should overflow"
        );

        Ok(())
    }

    #[tokio::test]
    async fn same_pk_in_different_models_are_distinct() -> TestResult {
        #[derive(Debug)]
        struct NumberedTicket;

        impl Product for NumberedTicket {
            fn pk(&self) -> ProductPk {
                ProductPk::Int(1)
            }

            fn model(&self) -> &str {
                TICKETS
            }
        }

        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("10")?), 1)?;
        cart.add(Arc::new(NumberedTicket), Some(price("20")?), 1)?;

        assert_eq!(cart.unique_count(), 2, "models should be keyed separately");
        assert!(cart.contains(&NumberedTicket), "ticket with the same pk should be present");

        Ok(())
    }

    #[tokio::test]
    async fn remove_deletes_the_item() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("9.99")?), 4)?;
        cart.add(shirt(2), Some(price("5.00")?), 1)?;

        cart.remove(shirt(1).as_ref())?;

        assert!(!cart.contains(shirt(1).as_ref()), "removed product should be gone");
        assert!(cart.contains(shirt(2).as_ref()), "other product should remain");
        assert_eq!(cart.unique_count(), 1, "one item should remain");

        Ok(())
    }

    #[tokio::test]
    async fn remove_missing_product_does_not_touch_session() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.remove(shirt(1).as_ref())?;
            cart.remove_single(shirt(1).as_ref())?;
            cart.set_quantity(shirt(1).as_ref(), 3)?;
        }

        assert!(!session.is_modified(), "no-op mutations should not modify the session");
        assert!(!session.contains_key("CART"), "no-op mutations should not write the cart");

        Ok(())
    }

    #[tokio::test]
    async fn remove_single_decrements_then_removes() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("9.99")?), 2)?;

        cart.remove_single(shirt(1).as_ref())?;

        assert_eq!(cart.count()?, 1, "one unit should remain");
        assert!(cart.contains(shirt(1).as_ref()), "product should still be in the cart");

        cart.remove_single(shirt(1).as_ref())?;

        assert!(!cart.contains(shirt(1).as_ref()), "last unit should remove the product");
        assert!(cart.is_empty(), "cart should be empty");

        Ok(())
    }

    #[tokio::test]
    async fn set_quantity_replaces_quantity() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("2.50")?), 1)?;
        cart.set_quantity(shirt(1).as_ref(), 4)?;

        assert_eq!(cart.count()?, 4, "quantity should be replaced");
        assert_eq!(cart.total()?, price("10.00")?, "total should follow the new quantity");

        Ok(())
    }

    #[tokio::test]
    async fn set_quantity_zero_removes_item() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("2.50")?), 3)?;
        cart.set_quantity(shirt(1).as_ref(), 0)?;

        assert!(cart.is_empty(), "zero quantity should remove the item");

        Ok(())
    }

    #[tokio::test]
    async fn set_quantity_negative_fails() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("2.50")?), 3)?;

        let result = cart.set_quantity(shirt(1).as_ref(), -1);

        assert!(
            matches!(result, Err(CartError::NegativeQuantity(-1))),
            "expected NegativeQuantity, got {result:?}"
        );
        assert_eq!(cart.count()?, 3, "failed update should keep the quantity");

        Ok(())
    }

    #[tokio::test]
    async fn totals_and_counts() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(shirt(1), Some(price("9.99")?), 2)?;
        cart.add(shirt(2), Some(price("29.99")?), 3)?;
        cart.add(ticket("gala"), Some(price("10.00")?), 1)?;

        assert_eq!(cart.count()?, 6, "count should sum quantities");
        assert_eq!(cart.unique_count(), 3, "unique count should count products");
        assert_eq!(cart.total()?, price("119.95")?, "total should sum subtotals");
        assert_eq!(cart.products().count(), 3, "every product should be listed");
        assert!(!cart.is_empty(), "cart should not be empty");

        Ok(())
    }

    #[tokio::test]
    async fn clear_empties_cart_and_session() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.add(shirt(1), Some(price("9.99")?), 2)?;
            cart.clear()?;

            assert!(cart.is_empty(), "clear should empty the cart");
        }

        assert_eq!(
            session.get("CART"),
            Some(&json!({})),
            "cleared cart should be stored as an empty map"
        );

        Ok(())
    }

    #[tokio::test]
    async fn mutations_write_nested_session_map() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.add(ticket("gala"), Some(price("9.99")?), 2)?;
            cart.add(shirt(28), Some(price("10.00")?), 1)?;
        }

        assert!(session.is_modified(), "mutations should mark the session modified");
        assert_eq!(
            session.get("CART"),
            Some(&json!({
                "shop.Ticket": {
                    "gala": {"product_pk": "gala", "quantity": 2, "price": "9.99"},
                },
                shirts_model(): {
                    "28": {"product_pk": 28, "quantity": 1, "price": "10.00"},
                },
            })),
            "session should hold the nested cart map"
        );

        Ok(())
    }

    #[tokio::test]
    async fn items_serializable_pairs_models_with_records() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let mut cart = empty_cart(&mut session, &registry).await?;

        cart.add(ticket("gala"), Some(price("9.99")?), 2)?;

        let pairs = cart.items_serializable();

        let [(model, records)] = pairs.as_slice() else {
            panic!("expected a single model, got {}", pairs.len());
        };

        assert_eq!(model, TICKETS, "pair should name the model");
        assert_eq!(
            records.get("gala").map(|record| record.quantity),
            Some(2),
            "pair should hold the item record"
        );

        Ok(())
    }

    #[tokio::test]
    async fn round_trip_restores_items() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.add(shirt(1), Some(price("9.99")?), 2)?;
            cart.add(ticket("matinee"), Some(price("29.99")?), 3)?;
        }

        let stored = session.get("CART").cloned();
        let cart = empty_cart(&mut session, &registry).await?;

        assert_eq!(cart.count()?, 5, "quantities should be restored");
        assert_eq!(cart.unique_count(), 2, "products should be restored");
        assert_eq!(cart.total()?, price("109.95")?, "prices should be restored");
        assert!(cart.contains(shirt(1).as_ref()), "shirt should be restored");
        assert!(cart.contains(ticket("matinee").as_ref()), "ticket should be restored");
        assert_eq!(
            Some(serde_json::to_value(cart.cart_serializable())?),
            stored,
            "reloaded cart should serialize identically"
        );

        Ok(())
    }

    #[tokio::test]
    async fn deleted_products_drop_out_on_reload() -> TestResult {
        let (shirts, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.add(shirt(1), Some(price("9.99")?), 2)?;
            cart.add(shirt(2), Some(price("5.00")?), 1)?;
        }

        shirts.remove(&ProductPk::Int(1));

        let cart = empty_cart(&mut session, &registry).await?;

        assert_eq!(cart.unique_count(), 1, "deleted product should be dropped");
        assert!(!cart.contains(shirt(1).as_ref()), "deleted product should be gone");
        assert!(cart.contains(shirt(2).as_ref()), "remaining product should be restored");

        Ok(())
    }

    #[tokio::test]
    async fn lookup_filter_excludes_products_on_reload() -> TestResult {
        let (shirts, _, registry) = catalog();
        let mut session = MemorySession::new();

        {
            let mut cart = empty_cart(&mut session, &registry).await?;

            cart.add(shirt(1), Some(price("9.99")?), 1)?;
            cart.add(shirt(2), Some(price("9.99")?), 1)?;
        }

        shirts.insert(Arc::new(Shirt {
            id: 2,
            available: false,
        }));

        let config =
            CartConfig::default().with_product_lookup(ProductFilter::new().with("available", true));
        let cart = Cart::load(&mut session, &config, &registry).await?;

        assert_eq!(cart.unique_count(), 1, "filtered product should be dropped");
        assert!(cart.contains(shirt(1).as_ref()), "matching product should be restored");

        Ok(())
    }

    #[tokio::test]
    async fn custom_session_key_is_used() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();
        let config = CartConfig::default().with_session_key("basket");

        {
            let mut cart = Cart::load(&mut session, &config, &registry).await?;

            cart.add(shirt(1), Some(price("1")?), 1)?;
        }

        assert!(session.contains_key("basket"), "cart should be stored under the custom key");
        assert!(!session.contains_key("CART"), "default key should be untouched");

        let cart = Cart::load(&mut session, &config, &registry).await?;

        assert_eq!(cart.count()?, 1, "cart should reload from the custom key");

        Ok(())
    }

    #[tokio::test]
    async fn load_resolves_products_by_session_key() -> TestResult {
        let (_, _, registry) = catalog();
        let mut session = MemorySession::new();

        session.insert(
            "CART",
            json!({shirts_model(): {"1": {"product_pk": "1", "quantity": 2, "price": "3.00"}}}),
        );

        let cart = empty_cart(&mut session, &registry).await?;

        assert!(
            cart.contains(shirt(1).as_ref()),
            "product should resolve from its session key"
        );
        assert_eq!(cart.total()?, price("6.00")?, "stored quantity and price should be used");

        Ok(())
    }

    #[tokio::test]
    async fn unknown_model_fails_to_load() -> TestResult {
        let registry = ProductRegistry::new();
        let mut session = MemorySession::new();

        session.insert(
            "CART",
            json!({"shop.Gone": {"1": {"product_pk": 1, "quantity": 1, "price": "1.00"}}}),
        );

        let result = empty_cart(&mut session, &registry).await;

        assert!(
            matches!(&result, Err(CartError::UnknownModel(model)) if model == "shop.Gone"),
            "expected UnknownModel, got {:?}",
            result.err()
        );

        Ok(())
    }

    #[tokio::test]
    async fn malformed_session_fails_to_load() {
        let registry = ProductRegistry::new();
        let mut session = MemorySession::new();

        session.insert("CART", json!(["not", "a", "cart"]));

        let result = empty_cart(&mut session, &registry).await;

        assert!(
            matches!(result, Err(CartError::Decode(_))),
            "expected Decode, got {:?}",
            result.err()
        );
    }

    #[tokio::test]
    async fn load_fetches_stored_pks_with_configured_filter() -> TestResult {
        let mut lookup = MockProductLookup::new();

        lookup
            .expect_fetch()
            .withf(|pks, filter| {
                pks.iter().eq([ProductPk::Int(1), ProductPk::Int(2)].iter())
                    && ProductFilter::clone(filter) == ProductFilter::new().with("available", true)
            })
            .times(1)
            .returning(|_, _| Ok(vec![shirt(2)]));

        let registry = ProductRegistry::new().with(shirts_model(), lookup);
        let mut session = MemorySession::new();

        session.insert(
            "CART",
            json!({
                shirts_model(): {
                    "1": {"product_pk": 1, "quantity": 1, "price": "1.00"},
                    "2": {"product_pk": 2, "quantity": 4, "price": "2.50"},
                },
            }),
        );

        let config =
            CartConfig::default().with_product_lookup(ProductFilter::new().with("available", true));
        let cart = Cart::load(&mut session, &config, &registry).await?;

        assert_eq!(cart.count()?, 4, "only the returned product should be restored");
        assert_eq!(cart.total()?, price("10.00")?, "stored price should be used");
        assert!(!session.is_modified(), "loading should not modify the session");

        Ok(())
    }

    #[tokio::test]
    async fn lookup_errors_propagate() {
        let mut lookup = MockProductLookup::new();

        lookup
            .expect_fetch()
            .returning(|_, _| Err(LookupError::Backend("database unavailable".into())));

        let registry = ProductRegistry::new().with(shirts_model(), lookup);
        let mut session = MemorySession::new();

        session.insert(
            "CART",
            json!({shirts_model(): {"1": {"product_pk": 1, "quantity": 1, "price": "1.00"}}}),
        );

        let result = empty_cart(&mut session, &registry).await;

        assert!(
            matches!(result, Err(CartError::Lookup(LookupError::Backend(_)))),
            "expected Lookup error, got {:?}",
            result.err()
        );
    }
}
