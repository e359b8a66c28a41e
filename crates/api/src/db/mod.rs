//! Database operations for the EasyCart `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `shops` - One shop per owning user, globally unique slug
//! - `categories` - Shop-scoped categories (slug unique per shop)
//! - `products` - Shop-scoped products (slug and SKU unique per shop, `stock >= 0`)
//! - `media` - Uploaded media metadata, optionally attached to a product
//! - `orders` - Order headers (globally unique order number)
//! - `order_items` - Immutable line-item snapshots
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p easycart-cli -- migrate
//! ```

pub mod catalog;
pub mod orders;
pub mod shops;

use std::time::Duration;

use easycart_core::{Candidates, IdentifierError, ShopId};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

pub use catalog::{CategoryRepository, MediaRepository, ProductRepository};
pub use orders::{OrderRepository, PgOrderStore};
pub use shops::ShopRepository;

/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Input references a row that does not exist in the caller's shop.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl RepositoryError {
    /// Whether retrying the whole operation may succeed.
    ///
    /// Covers pool exhaustion, dropped connections, deadlocks and
    /// serialization failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let Self::Database(err) = self else {
            return false;
        };
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db_err) => matches!(
                db_err.code().as_deref(),
                Some(DEADLOCK_DETECTED | SERIALIZATION_FAILURE)
            ),
            _ => false,
        }
    }
}

/// Whether `err` is a unique violation, optionally of one named constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: Option<&str>) -> bool {
    if let sqlx::Error::Database(db_err) = err
        && db_err.is_unique_violation()
    {
        return constraint.is_none_or(|name| db_err.constraint() == Some(name));
    }
    false
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in `term` escaped.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Take a transaction-scoped advisory lock named by `key`.
///
/// Blocks until no other transaction holds the same key; released at commit
/// or rollback.
pub(crate) async fn advisory_xact_lock(
    conn: &mut PgConnection,
    key: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(conn)
        .await?;
    Ok(())
}

/// A column whose values are allocated from [`Candidates`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct UniqueColumn {
    pub table: &'static str,
    pub column: &'static str,
    /// Uniqueness is per shop rather than global.
    pub shop_scoped: bool,
}

impl UniqueColumn {
    fn exists_sql(self) -> String {
        let Self {
            table,
            column,
            shop_scoped,
        } = self;
        let scope = if shop_scoped { " AND shop_id = $2" } else { "" };
        format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = $1{scope})")
    }

    fn lock_key(self, shop_id: Option<ShopId>, candidate: &str) -> String {
        let shop = shop_id.map(|id| id.to_string()).unwrap_or_default();
        format!("{}.{}:{shop}:{candidate}", self.table, self.column)
    }
}

/// Find the first free candidate derived from `base`.
///
/// Runs on the caller's connection so the existence check and the insert
/// share one transaction. Each candidate is advisory-locked before it is
/// checked, so a concurrent allocation of the same value waits for this
/// transaction and then sees its row; the lock is held until the caller
/// commits.
pub(crate) async fn allocate_unique(
    conn: &mut PgConnection,
    target: UniqueColumn,
    shop_id: Option<ShopId>,
    base: String,
) -> Result<String, RepositoryError> {
    let exists_sql = target.exists_sql();
    for candidate in Candidates::new(base.as_str()) {
        advisory_xact_lock(&mut *conn, &target.lock_key(shop_id, &candidate)).await?;

        let mut query = sqlx::query_scalar::<_, bool>(&exists_sql).bind(candidate.as_str());
        if let Some(shop_id) = shop_id {
            query = query.bind(shop_id);
        }
        if !query.fetch_one(&mut *conn).await? {
            return Ok(candidate);
        }
    }
    tracing::warn!(column = target.column, base = %base, "identifier candidates exhausted");
    Err(RepositoryError::Conflict(
        IdentifierError::exhausted(target.column, base).to_string(),
    ))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RepositoryError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!RepositoryError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!RepositoryError::NotFound.is_transient());
        assert!(!RepositoryError::Conflict("slug".to_owned()).is_transient());
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ORD-2026"), "%ORD-2026%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_unique_column_sql_and_lock_key() {
        let scoped = UniqueColumn {
            table: "categories",
            column: "slug",
            shop_scoped: true,
        };
        assert_eq!(
            scoped.exists_sql(),
            "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = $1 AND shop_id = $2)"
        );
        let shop = ShopId::new_v4();
        assert_eq!(
            scoped.lock_key(Some(shop), "home-garden"),
            format!("categories.slug:{shop}:home-garden")
        );

        let global = UniqueColumn {
            table: "shops",
            column: "slug",
            shop_scoped: false,
        };
        assert_eq!(
            global.exists_sql(),
            "SELECT EXISTS(SELECT 1 FROM shops WHERE slug = $1)"
        );
        assert_eq!(global.lock_key(None, "corner-store"), "shops.slug::corner-store");
    }

    #[test]
    fn test_unique_violation_ignores_other_errors() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, None));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut, Some("orders_order_number_key")));
    }
}
