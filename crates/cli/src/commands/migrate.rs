//! Database migration command.
//!
//! Applies the migrations in `crates/api/migrations/`, which are embedded at
//! compile time.

use easycart_api::db;

use super::{CommandError, database_url};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
