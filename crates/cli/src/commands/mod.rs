//! CLI subcommands.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

use easycart_api::db::RepositoryError;

/// Errors a subcommand can fail with.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: EASYCART_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid input: {0}")]
    Invalid(String),
}

/// Database URL from the environment, `.env` included.
pub(crate) fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();
    std::env::var("EASYCART_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingDatabaseUrl)
}
