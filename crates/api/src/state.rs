//! Application state shared across handlers.

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::PgOrderStore;
use crate::orders::OrderCoordinator;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    coordinator: OrderCoordinator<PgOrderStore>,
    jwt_key: DecodingKey,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let coordinator = OrderCoordinator::new(PgOrderStore::new(pool.clone()));
        let jwt_key = DecodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                coordinator,
                jwt_key,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The order coordinator backed by `PostgreSQL`.
    #[must_use]
    pub fn coordinator(&self) -> &OrderCoordinator<PgOrderStore> {
        &self.inner.coordinator
    }

    /// Key used to verify bearer tokens.
    #[must_use]
    pub fn jwt_key(&self) -> &DecodingKey {
        &self.inner.jwt_key
    }
}
