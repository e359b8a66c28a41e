//! Storage seam for order placement.
//!
//! The coordinator drives one [`OrderTransaction`] per placement. Dropping a
//! transaction without calling [`OrderTransaction::commit`] must discard
//! every change made through it.

use async_trait::async_trait;

use easycart_core::{ProductId, ShopId};

use crate::db::RepositoryError;
use crate::models::{Order, Product};

/// Opens placement transactions.
#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    type Tx: OrderTransaction;

    /// Start a transaction.
    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;
}

/// One atomic unit of work.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Hold the shop's idempotency key until the transaction ends.
    ///
    /// A second transaction locking the same key waits, then sees the first
    /// one's committed order.
    async fn lock_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<(), RepositoryError>;

    /// An order of the shop previously placed with this idempotency key.
    async fn find_by_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Lock an active product of the shop until the transaction ends.
    ///
    /// The returned stock reflects decrements already made in this
    /// transaction.
    async fn lock_active_product(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError>;

    /// URL of the product's primary image.
    async fn primary_image(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<String>, RepositoryError>;

    /// Decrement stock by `quantity` if enough remains; `false` otherwise.
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError>;

    /// Whether any order already uses `order_number`.
    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, RepositoryError>;

    /// Insert the order header and all of its items.
    ///
    /// A uniqueness violation on the order number or idempotency key is
    /// reported as `RepositoryError::Conflict`.
    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError>;

    /// Make every change visible atomically.
    async fn commit(self) -> Result<(), RepositoryError>;
}
