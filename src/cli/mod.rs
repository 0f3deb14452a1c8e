use std::{io, path::PathBuf};

use carton::{
    cart::{Cart, CartError},
    config::CartConfig,
    fixtures::{Catalog, FixtureError},
    products::{Product, ProductPk, ProductRef},
    session::Session,
    summary::{SummaryError, write_cart},
};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::util::TryInitError;

use crate::cli::logging::LoggingConfig;

mod logging;
mod session_file;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error("failed to access session file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid session file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("product {pk} not found in model {model}")]
    UnknownProduct { model: String, pk: ProductPk },

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] TryInitError),
}

#[derive(Debug, Parser)]
#[command(name = "carton", about = "Carton session cart CLI", long_about = None)]
pub(crate) struct Cli {
    /// JSON session file holding the cart; created when missing
    #[arg(long, env = "CARTON_SESSION_FILE")]
    session: PathBuf,

    /// YAML product catalog the cart is resolved against
    #[arg(long, env = "CARTON_CATALOG")]
    catalog: PathBuf,

    /// Cart settings.
    #[command(flatten)]
    cart: CartConfig,

    /// Logging output settings.
    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the cart
    Show,

    /// Add a product, increasing its quantity if already present
    Add(AddArgs),

    /// Remove a product entirely
    Remove(ProductArgs),

    /// Remove a single unit of a product
    RemoveSingle(ProductArgs),

    /// Set a product's quantity; 0 removes it
    SetQuantity(SetQuantityArgs),

    /// Remove every product
    Clear,
}

#[derive(Debug, Args)]
struct ProductArgs {
    /// Model identifier, as listed in the catalog
    #[arg(long)]
    model: String,

    /// Product primary key
    #[arg(long)]
    pk: ProductPk,
}

impl ProductArgs {
    fn resolve(&self, catalog: &Catalog) -> Result<ProductRef, CliError> {
        catalog
            .product(&self.model, &self.pk)
            .ok_or_else(|| CliError::UnknownProduct {
                model: self.model.clone(),
                pk: self.pk.clone(),
            })
    }
}

#[derive(Debug, Args)]
struct AddArgs {
    #[command(flatten)]
    product: ProductArgs,

    /// Unit price; defaults to the catalog's `price` field
    #[arg(long)]
    price: Option<Decimal>,

    /// Quantity to add
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    quantity: i64,
}

#[derive(Debug, Args)]
struct SetQuantityArgs {
    #[command(flatten)]
    product: ProductArgs,

    /// New quantity
    #[arg(long, allow_negative_numbers = true)]
    quantity: i64,
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), CliError> {
        logging::init_subscriber(&self.logging)?;

        let catalog = Catalog::load(&self.catalog)?;
        let registry = catalog.registry();
        let mut session = session_file::read(&self.session)?;

        let mut cart = Cart::load(&mut session, &self.cart, &registry).await?;

        apply(&mut cart, &catalog, self.command)?;

        write_cart(io::stdout().lock(), &cart)?;

        if session.is_modified() {
            session_file::write(&self.session, &session)?;

            info!(path = %self.session.display(), "saved session");
        }

        Ok(())
    }
}

fn apply<S: Session + ?Sized>(
    cart: &mut Cart<'_, S>,
    catalog: &Catalog,
    command: Commands,
) -> Result<(), CliError> {
    match command {
        Commands::Show => {}
        Commands::Add(args) => {
            let product = args.product.resolve(catalog)?;
            let price = args.price.or_else(|| catalog_price(product.as_ref()));

            cart.add(product, price, args.quantity)?;
        }
        Commands::Remove(args) => cart.remove(args.resolve(catalog)?.as_ref())?,
        Commands::RemoveSingle(args) => cart.remove_single(args.resolve(catalog)?.as_ref())?,
        Commands::SetQuantity(args) => {
            let product = args.product.resolve(catalog)?;

            cart.set_quantity(product.as_ref(), args.quantity)?;
        }
        Commands::Clear => cart.clear()?,
    }

    Ok(())
}

fn catalog_price(product: &dyn Product) -> Option<Decimal> {
    match product.attribute("price")? {
        Value::String(price) => price.parse().ok(),
        Value::Number(price) => price.to_string().parse().ok(),
        _ => None,
    }
}
