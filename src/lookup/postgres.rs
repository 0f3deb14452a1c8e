//! `PostgreSQL` product lookup

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgPool, Postgres, query_scalar, types::Json};
use tracing::debug;

use crate::{
    lookup::{LookupError, ProductLookup},
    products::{Product, ProductFilter, ProductPk, ProductRef},
};

/// Default primary key column.
pub const DEFAULT_PK_COLUMN: &str = "id";

/// Validates an SQL identifier before it is quoted into a query.
///
/// Identifiers must be 1-63 characters, start with a letter or underscore and contain only
/// letters, digits and underscores.
fn validate_identifier(name: &str) -> Result<(), LookupError> {
    let mut chars = name.chars();

    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if name.len() > 63 || !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(LookupError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}

/// A product row, kept as its JSON record.
#[derive(Debug, Clone)]
pub struct PgProduct {
    model: String,
    pk: ProductPk,
    record: Value,
}

impl PgProduct {
    /// The full row as returned by `to_jsonb`.
    pub fn record(&self) -> &Value {
        &self.record
    }
}

impl Product for PgProduct {
    fn pk(&self) -> ProductPk {
        self.pk.clone()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.record.get(name).cloned()
    }
}

/// Resolves products of one model from a `PostgreSQL` table.
#[derive(Debug, Clone)]
pub struct PgProductLookup {
    pool: PgPool,
    model: String,
    table: String,
    pk_column: String,
}

impl PgProductLookup {
    /// Create a lookup reading `table` for products of `model`, keyed by the `id` column.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidIdentifier`] if `table` is not a plain identifier.
    pub fn new(
        pool: PgPool,
        model: impl Into<String>,
        table: impl Into<String>,
    ) -> Result<Self, LookupError> {
        let table = table.into();

        validate_identifier(&table)?;

        Ok(Self {
            pool,
            model: model.into(),
            table,
            pk_column: DEFAULT_PK_COLUMN.to_string(),
        })
    }

    /// Use a different primary key column.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidIdentifier`] if `column` is not a plain identifier.
    pub fn with_pk_column(mut self, column: impl Into<String>) -> Result<Self, LookupError> {
        let column = column.into();

        validate_identifier(&column)?;

        self.pk_column = column;

        Ok(self)
    }

    fn to_product(&self, record: Value) -> Result<ProductRef, LookupError> {
        let pk = record
            .get(&self.pk_column)
            .map(ProductPk::deserialize)
            .transpose()
            .map_err(LookupError::InvalidRecord)?
            .ok_or_else(|| LookupError::MissingColumn(self.pk_column.clone()))?;

        Ok(Arc::new(PgProduct {
            model: self.model.clone(),
            pk,
            record,
        }))
    }
}

#[async_trait]
impl ProductLookup for PgProductLookup {
    #[tracing::instrument(
        name = "products.lookup.postgres",
        skip(self, pks, filter),
        fields(table = %self.table, pk_count = pks.len())
    )]
    async fn fetch(
        &self,
        pks: &[ProductPk],
        filter: &ProductFilter,
    ) -> Result<Vec<ProductRef>, LookupError> {
        if pks.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = pks.iter().map(ToString::to_string).collect();

        let mut sql = format!(
            "SELECT to_jsonb(t) AS record FROM \"{}\" AS t WHERE t.\"{}\"::text = ANY($1)",
            self.table, self.pk_column
        );

        for placeholder in (2..).step_by(2).take(filter.iter().count()) {
            sql.push_str(&format!(
                " AND to_jsonb(t) -> ${placeholder} = ${}",
                placeholder + 1
            ));
        }

        let query = filter.iter().fold(
            query_scalar::<Postgres, Json<Value>>(&sql).bind(keys),
            |query, (field, expected)| query.bind(field.to_string()).bind(Json(expected.clone())),
        );

        let records = query.fetch_all(&self.pool).await?;

        debug!(fetched = records.len(), "fetched products");

        records
            .into_iter()
            .map(|Json(record)| self.to_product(record))
            .collect()
    }
}
