//! Cart summary rendering

use std::io;

use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use thiserror::Error;

use crate::{
    cart::{Cart, CartError},
    items::CartItem,
    session::Session,
};

/// Errors that can occur when writing a cart summary.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Failed to write to the output.
    #[error("failed to write cart summary: {0}")]
    Io(#[from] io::Error),

    /// The cart's count or total overflowed.
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Writes the cart as a table of lines followed by its count and total.
///
/// # Errors
///
/// Returns an error if the cart count or total overflows, or the output cannot be written.
pub fn write_cart<S: Session + ?Sized>(
    mut out: impl io::Write,
    cart: &Cart<'_, S>,
) -> Result<(), SummaryError> {
    if cart.is_empty() {
        writeln!(out, "Cart is empty")?;

        return Ok(());
    }

    let count = cart.count()?;
    let total = cart.total()?;

    let mut builder = Builder::default();

    builder.push_record(["Model", "Product", "Quantity", "Price", "Subtotal"]);

    for item in cart.items() {
        builder.push_record(item_row(item));
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(2..5), Alignment::right());

    writeln!(out, "{table}")?;
    writeln!(out, "Items: {count} ({} unique)", cart.unique_count())?;
    writeln!(out, "Total: {total}")?;

    Ok(())
}

fn item_row(item: &CartItem) -> [String; 5] {
    let product = item.product();

    let label = product
        .attribute("name")
        .and_then(|name| name.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("#{}", product.pk()));

    [
        product.model().to_string(),
        label,
        item.quantity().to_string(),
        item.price().to_string(),
        item.subtotal().map_or_else(String::new, |s| s.to_string()),
    ]
}
