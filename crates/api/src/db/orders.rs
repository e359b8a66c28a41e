//! Order persistence: the query repository and the placement store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use easycart_core::{Email, Money, OrderId, OrderStatus, PaymentStatus, ProductId, ShopId};

use super::{RepositoryError, advisory_xact_lock, catalog, contains_pattern, is_unique_violation};
use crate::models::{Order, OrderItem, Page, Product};
use crate::orders::{OrderStore, OrderTransaction};

const ORDER_COLUMNS: &str = "id, order_number, shop_id, idempotency_key, customer_email, \
     customer_name, customer_phone, shipping_address, shipping_city, shipping_state, \
     shipping_zip, shipping_country, notes, subtotal, tax_amount, shipping_cost, total, \
     status, payment_status, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, position, product_name, product_sku, \
     product_image, unit_price, quantity, total, created_at";

/// Database row for `orders`. Statuses are stored as text.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    shop_id: ShopId,
    idempotency_key: Option<String>,
    customer_email: String,
    customer_name: String,
    customer_phone: String,
    shipping_address: String,
    shipping_city: String,
    shipping_state: String,
    shipping_zip: String,
    shipping_country: String,
    notes: String,
    subtotal: Money,
    tax_amount: Money,
    shipping_cost: Money,
    total: Money,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let customer_email = Email::parse(&self.customer_email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let payment_status = self
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            shop_id: self.shop_id,
            idempotency_key: self.idempotency_key,
            customer_email,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            shipping_city: self.shipping_city,
            shipping_state: self.shipping_state,
            shipping_zip: self.shipping_zip,
            shipping_country: self.shipping_country,
            notes: self.notes,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            total: self.total,
            status,
            payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

/// Load items for many orders at once, grouped by order in cart order.
async fn load_items<'e>(
    executor: impl PgExecutor<'e>,
    order_ids: &[Uuid],
) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items \
         WHERE order_id = ANY($1) ORDER BY order_id, position"
    ))
    .bind(order_ids)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}

fn assemble(
    rows: Vec<OrderRow>,
    mut items: HashMap<OrderId, Vec<OrderItem>>,
) -> Result<Vec<Order>, RepositoryError> {
    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            if order_items.is_empty() {
                return Err(RepositoryError::DataCorruption(format!(
                    "order {} has no items",
                    row.order_number
                )));
            }
            row.into_order(order_items)
        })
        .collect()
}

/// Filters for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Case-insensitive match on order number, customer name or email.
    pub search: Option<String>,
}

// =============================================================================
// Query repository
// =============================================================================

/// Repository for reading and updating persisted orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List orders newest first. Returns the page and the total match count.
    ///
    /// Ties on `created_at` are broken by `id`, so repeated calls with the
    /// same filter return the same rows in the same order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list(
        &self,
        shop_id: ShopId,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        const WHERE: &str = "WHERE shop_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR order_number ILIKE $3 \
                    OR customer_name ILIKE $3 OR customer_email ILIKE $3)";

        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {WHERE}"))
            .bind(shop_id)
            .bind(status)
            .bind(search.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(shop_id)
        .bind(status)
        .bind(search.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id.as_uuid()).collect();
        let items = load_items(self.pool, &ids).await?;
        Ok((assemble(rows, items)?, total))
    }

    /// Get one order of the shop with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn find(
        &self,
        shop_id: ShopId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND shop_id = $2"
        ))
        .bind(order_id)
        .bind(shop_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = load_items(self.pool, &[row.id.as_uuid()]).await?;
        Ok(assemble(vec![row], items)?.pop())
    }

    /// Replace status fields, returning the previous order status and the
    /// updated order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is not in the shop.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn update_status(
        &self,
        shop_id: ShopId,
        order_id: OrderId,
        status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<(OrderStatus, Order), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT status FROM orders WHERE id = $1 AND shop_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(shop_id)
        .fetch_optional(&mut *tx)
        .await?;
        let previous = previous
            .ok_or(RepositoryError::NotFound)?
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET \
                 status = COALESCE($3, status), \
                 payment_status = COALESCE($4, payment_status), \
                 updated_at = NOW() \
             WHERE id = $1 AND shop_id = $2 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(shop_id)
        .bind(status.map(|s| s.as_str()))
        .bind(payment_status.map(|s| s.as_str()))
        .fetch_one(&mut *tx)
        .await?;

        let items = load_items(&mut *tx, &[row.id.as_uuid()]).await?;
        tx.commit().await?;

        let order = assemble(vec![row], items)?
            .pop()
            .ok_or(RepositoryError::NotFound)?;
        Ok((previous, order))
    }
}

// =============================================================================
// Placement store
// =============================================================================

/// [`OrderStore`] backed by `PostgreSQL` transactions (read committed).
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// One placement transaction. Dropping it uncommitted rolls it back.
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderStore for PgOrderStore {
    type Tx = PgOrderTransaction;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        Ok(PgOrderTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn lock_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<(), RepositoryError> {
        let lock_key = format!("orders.idempotency_key:{shop_id}:{key}");
        advisory_xact_lock(&mut *self.tx, &lock_key).await
    }

    async fn find_by_idempotency_key(
        &mut self,
        shop_id: ShopId,
        key: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE shop_id = $1 AND idempotency_key = $2"
        ))
        .bind(shop_id)
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = load_items(&mut *self.tx, &[row.id.as_uuid()]).await?;
        Ok(assemble(vec![row], items)?.pop())
    }

    async fn lock_active_product(
        &mut self,
        shop_id: ShopId,
        product_id: ProductId,
    ) -> Result<Option<Product>, RepositoryError> {
        catalog::find_active_for_update(&mut *self.tx, shop_id, product_id).await
    }

    async fn primary_image(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<String>, RepositoryError> {
        catalog::find_primary_image(&mut *self.tx, product_id).await
    }

    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        catalog::decrement_stock(&mut *self.tx, product_id, quantity).await
    }

    async fn order_number_exists(&mut self, order_number: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(order_number)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO orders (id, order_number, shop_id, idempotency_key, customer_email, \
                 customer_name, customer_phone, shipping_address, shipping_city, shipping_state, \
                 shipping_zip, shipping_country, notes, subtotal, tax_amount, shipping_cost, \
                 total, status, payment_status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19, $20, $21)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.shop_id)
        .bind(order.idempotency_key.as_deref())
        .bind(order.customer_email.as_str())
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_state)
        .bind(&order.shipping_zip)
        .bind(&order.shipping_country)
        .bind(&order.notes)
        .bind(order.subtotal)
        .bind(order.tax_amount)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some("orders_order_number_key")) {
                return RepositoryError::Conflict("order number".to_owned());
            }
            if is_unique_violation(&e, Some("orders_shop_idempotency_key")) {
                return RepositoryError::Conflict("idempotency key".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, position, product_name, \
                     product_sku, product_image, unit_price, quantity, total, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.position)
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(item.product_image.as_deref())
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.total)
            .bind(item.created_at)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
