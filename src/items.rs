//! Cart Items

use std::fmt::{self, Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::products::{ProductPk, ProductRef};

/// A cart line: a product, its quantity and the unit price it was added at.
#[derive(Debug, Clone)]
pub struct CartItem {
    product: ProductRef,
    quantity: i64,
    price: Decimal,
}

impl CartItem {
    /// Creates a new cart item.
    ///
    /// Quantities are not validated here; [`Cart`](crate::cart::Cart) enforces them.
    pub fn new(product: ProductRef, quantity: i64, price: Decimal) -> Self {
        Self {
            product,
            quantity,
            price,
        }
    }

    /// Returns the referenced product
    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    /// Returns the quantity
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Returns the unit price
    pub fn price(&self) -> Decimal {
        self.price
    }

    pub(crate) fn set_quantity(&mut self, quantity: i64) {
        self.quantity = quantity;
    }

    /// Unit price multiplied by quantity, or `None` if the product overflows a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// The record stored in the session for this item.
    pub fn to_record(&self) -> CartItemRecord {
        CartItemRecord {
            product_pk: self.product.pk(),
            quantity: self.quantity,
            price: self.price,
        }
    }
}

impl Display for CartItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CartItem Object ({} #{})",
            self.product.model(),
            self.product.pk()
        )
    }
}

/// Serialized form of a [`CartItem`], e.g. `{"product_pk": 1, "quantity": 2, "price": "9.99"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    /// Primary key of the referenced product
    pub product_pk: ProductPk,

    /// Quantity in the cart
    pub quantity: i64,

    /// Unit price, stored as a decimal string
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
}
