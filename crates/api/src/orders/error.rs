//! Order engine error taxonomy.

use easycart_core::{OrderId, ProductId};
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors from placing, listing or updating orders.
///
/// Every error raised inside a placement aborts its transaction; nothing is
/// persisted when one of these is returned.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed or missing input, rejected before any transaction opens.
    #[error("{0}")]
    Validation(String),

    /// Product absent, inactive or owned by another shop.
    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Order absent or owned by another shop.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Not enough stock for one line item.
    #[error(
        "insufficient stock for {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: i32,
        available: i32,
    },

    /// Identifier space exhausted or another uniqueness conflict.
    #[error("{0}")]
    Conflict(String),

    /// Retrying the same request may succeed.
    #[error("{0}")]
    Transient(String),

    /// Anything else. Details are logged, never returned to clients.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OrderError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        if err.is_transient() {
            return Self::Transient(err.to_string());
        }
        match err {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            RepositoryError::InvalidReference(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}
