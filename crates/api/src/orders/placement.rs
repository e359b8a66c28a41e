//! Order placement: input validation and the transaction coordinator.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use serde::Deserialize;
use tracing::instrument;

use easycart_core::identifiers::order_number_candidates;
use easycart_core::{
    Email, IdentifierError, Money, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId,
    ShopId,
};

use super::error::OrderError;
use super::store::{OrderStore, OrderTransaction};
use crate::db::RepositoryError;
use crate::models::{Order, OrderItem};

/// Upper bound on line items in one order.
pub const MAX_LINE_ITEMS: usize = 100;

/// Upper bound on an idempotency key's length.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Checkout payload as submitted by a storefront or the owner dashboard.
///
/// Every field defaults so that missing values are reported by
/// [`PlaceOrderRequest::validate`] rather than by the JSON decoder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaceOrderRequest {
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip: String,
    pub shipping_country: String,
    pub items: Vec<LineItemRequest>,
    pub notes: String,
}

/// One requested cart line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LineItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A placement request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub customer_email: Email,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip: String,
    pub shipping_country: String,
    pub notes: String,
    pub items: Vec<ValidatedLine>,
    pub idempotency_key: Option<String>,
}

/// A cart line with a positive, storable quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl PlaceOrderRequest {
    /// Check the request and normalize its fields.
    ///
    /// Blank optional fields become empty strings; a blank country becomes
    /// `default_country`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` naming the first invalid field.
    pub fn validate(
        self,
        default_country: &str,
        idempotency_key: Option<&str>,
    ) -> Result<ValidatedOrder, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::validation("order must contain at least one item"));
        }
        if self.items.len() > MAX_LINE_ITEMS {
            return Err(OrderError::validation(format!(
                "order may contain at most {MAX_LINE_ITEMS} items"
            )));
        }

        let items = self
            .items
            .iter()
            .map(|line| {
                if line.quantity < 1 {
                    return Err(OrderError::validation(format!(
                        "quantity for product {} must be positive",
                        line.product_id
                    )));
                }
                let quantity = i32::try_from(line.quantity).map_err(|_| {
                    OrderError::validation(format!(
                        "quantity for product {} is too large",
                        line.product_id
                    ))
                })?;
                Ok(ValidatedLine {
                    product_id: line.product_id,
                    quantity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let customer_email = Email::parse(&self.customer_email)
            .map_err(|e| OrderError::validation(format!("customer_email: {e}")))?;
        let customer_name = required("customer_name", &self.customer_name)?;
        let shipping_address = required("shipping_address", &self.shipping_address)?;
        let shipping_city = required("shipping_city", &self.shipping_city)?;
        let shipping_zip = required("shipping_zip", &self.shipping_zip)?;

        let shipping_country = match self.shipping_country.trim() {
            "" => default_country.to_owned(),
            country => country.to_owned(),
        };

        let idempotency_key = idempotency_key.map(validate_idempotency_key).transpose()?;

        Ok(ValidatedOrder {
            customer_email,
            customer_name,
            customer_phone: self.customer_phone.trim().to_owned(),
            shipping_address,
            shipping_city,
            shipping_state: self.shipping_state.trim().to_owned(),
            shipping_zip,
            shipping_country,
            notes: self.notes.trim().to_owned(),
            items,
            idempotency_key,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, OrderError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OrderError::validation(format!("{field} is required")));
    }
    Ok(value.to_owned())
}

fn validate_idempotency_key(key: &str) -> Result<String, OrderError> {
    let key = key.trim();
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(OrderError::validation(format!(
            "idempotency key must be 1 to {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    if !key.chars().all(|c| c.is_ascii_graphic()) {
        return Err(OrderError::validation(
            "idempotency key must be printable ASCII",
        ));
    }
    Ok(key.to_owned())
}

/// Runs order placement as one atomic unit of work.
///
/// Per line item, in submission order: lock the product, check stock,
/// snapshot it, decrement stock. Then allocate an order number, insert the
/// order with its items and commit. Any error drops the transaction, which
/// rolls everything back.
#[derive(Debug)]
pub struct OrderCoordinator<S> {
    store: Arc<S>,
}

impl<S> Clone for OrderCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderStore> OrderCoordinator<S> {
    /// Create a coordinator over a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Place an order.
    ///
    /// With an idempotency key that already names an order of the shop, that
    /// order is returned unchanged and no stock moves.
    ///
    /// # Errors
    ///
    /// - `ProductNotFound` if a product is absent, inactive or in another shop
    /// - `InsufficientStock` if a line asks for more than remains
    /// - `Conflict` if no order number could be allocated
    /// - `Transient` on deadlocks, pool exhaustion or a lost uniqueness race
    /// - `Internal` for anything else
    #[instrument(
        skip(self, order),
        fields(shop_id = %shop_id, items = order.items.len(), order_number = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        shop_id: ShopId,
        order: ValidatedOrder,
    ) -> Result<Order, OrderError> {
        let mut tx = self.store.begin().await?;

        if let Some(key) = order.idempotency_key.as_deref() {
            // Held until commit; a duplicate waits here, then replays.
            tx.lock_idempotency_key(shop_id, key).await?;
            if let Some(existing) = tx.find_by_idempotency_key(shop_id, key).await? {
                tracing::info!(order_number = %existing.order_number, "idempotent replay");
                return Ok(existing);
            }
        }

        let order_id = OrderId::new_v4();
        // Timestamps are stored with microsecond precision.
        let now = Utc::now().trunc_subsecs(6);
        let mut items = Vec::with_capacity(order.items.len());
        let mut subtotal = Money::ZERO;

        for (position, line) in (0_i32..).zip(&order.items) {
            let product = tx
                .lock_active_product(shop_id, line.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound {
                    product_id: line.product_id,
                })?;

            if product.stock < line.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name,
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            let product_image = tx.primary_image(product.id).await?;
            let line_total = product
                .price
                .checked_mul(i64::from(line.quantity))
                .ok_or_else(|| OrderError::validation("order total is out of range"))?;

            if !tx.decrement_stock(product.id, line.quantity).await? {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name,
                    requested: line.quantity,
                    available: product.stock,
                });
            }

            subtotal = subtotal
                .checked_add(line_total)
                .ok_or_else(|| OrderError::validation("order total is out of range"))?;

            items.push(OrderItem {
                id: OrderItemId::new_v4(),
                order_id,
                product_id: product.id,
                position,
                product_name: product.name,
                product_sku: product.sku,
                product_image,
                unit_price: product.price,
                quantity: line.quantity,
                total: line_total,
                created_at: now,
            });
        }

        let order_number = allocate_order_number(&mut tx).await?;
        tracing::Span::current().record("order_number", order_number.as_str());

        let tax_amount = Money::ZERO;
        let shipping_cost = Money::ZERO;
        let placed = Order {
            id: order_id,
            order_number,
            shop_id,
            idempotency_key: order.idempotency_key,
            customer_email: order.customer_email,
            customer_name: order.customer_name,
            customer_phone: order.customer_phone,
            shipping_address: order.shipping_address,
            shipping_city: order.shipping_city,
            shipping_state: order.shipping_state,
            shipping_zip: order.shipping_zip,
            shipping_country: order.shipping_country,
            notes: order.notes,
            subtotal,
            tax_amount,
            shipping_cost,
            total: subtotal,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            items,
        };

        tx.insert_order(&placed).await.map_err(|e| match e {
            RepositoryError::Conflict(what) => {
                OrderError::Transient(format!("concurrent order with the same {what}"))
            }
            other => other.into(),
        })?;
        tx.commit().await?;

        tracing::info!(
            order_number = %placed.order_number,
            total = %placed.total.display(),
            "order placed"
        );
        Ok(placed)
    }

    /// [`Self::place_order`] on its own task, bounded by `timeout`.
    ///
    /// A caller that stops waiting does not interrupt the placement. When the
    /// timeout fires the placement future is dropped, which rolls its
    /// transaction back.
    ///
    /// # Errors
    ///
    /// Everything [`Self::place_order`] returns, plus `Transient` on timeout.
    pub async fn place_order_detached(
        &self,
        shop_id: ShopId,
        order: ValidatedOrder,
        timeout: Duration,
    ) -> Result<Order, OrderError> {
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::timeout(timeout, coordinator.place_order(shop_id, order)).await
        });

        match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => {
                tracing::warn!(shop_id = %shop_id, ?timeout, "order placement timed out");
                Err(OrderError::Transient(
                    "order placement timed out".to_owned(),
                ))
            }
            Err(join_err) => Err(OrderError::Internal(format!(
                "order placement task failed: {join_err}"
            ))),
        }
    }
}

async fn allocate_order_number<T: OrderTransaction>(tx: &mut T) -> Result<String, OrderError> {
    for candidate in order_number_candidates() {
        if !tx.order_number_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(OrderError::Conflict(
        IdentifierError::exhausted("order number", "ORD").to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::orders::memory::MemoryStore;

    const COUNTRY: &str = "US";

    fn request(items: &[(ProductId, i64)]) -> PlaceOrderRequest {
        PlaceOrderRequest {
            customer_email: "buyer@shop.test".to_owned(),
            customer_name: "Pat Buyer".to_owned(),
            shipping_address: "1 Main St".to_owned(),
            shipping_city: "Springfield".to_owned(),
            shipping_zip: "12345".to_owned(),
            items: items
                .iter()
                .map(|&(product_id, quantity)| LineItemRequest {
                    product_id,
                    quantity,
                })
                .collect(),
            ..PlaceOrderRequest::default()
        }
    }

    fn validated(items: &[(ProductId, i64)]) -> ValidatedOrder {
        request(items).validate(COUNTRY, None).unwrap()
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_defaults_country_and_trims() {
        let mut req = request(&[(ProductId::new_v4(), 1)]);
        req.customer_name = "  Pat Buyer ".to_owned();
        req.shipping_country = "   ".to_owned();

        let order = req.validate("US", None).unwrap();
        assert_eq!(order.customer_name, "Pat Buyer");
        assert_eq!(order.shipping_country, "US");
        assert!(order.idempotency_key.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_cart() {
        let err = request(&[]).validate(COUNTRY, None).unwrap_err();
        assert!(matches!(err, OrderError::Validation(msg) if msg.contains("at least one item")));
    }

    #[test]
    fn test_validate_rejects_bad_quantities() {
        let id = ProductId::new_v4();
        assert!(request(&[(id, 0)]).validate(COUNTRY, None).is_err());
        assert!(request(&[(id, -2)]).validate(COUNTRY, None).is_err());
        assert!(
            request(&[(id, i64::from(i32::MAX) + 1)])
                .validate(COUNTRY, None)
                .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_too_many_lines() {
        let lines: Vec<_> = (0..=MAX_LINE_ITEMS)
            .map(|_| (ProductId::new_v4(), 1))
            .collect();
        assert!(request(&lines).validate(COUNTRY, None).is_err());
    }

    #[test]
    fn test_validate_requires_customer_and_shipping_fields() {
        let id = ProductId::new_v4();

        let mut req = request(&[(id, 1)]);
        req.customer_email = "not-an-email".to_owned();
        let err = req.validate(COUNTRY, None).unwrap_err();
        assert!(err.to_string().starts_with("customer_email"));

        let mut req = request(&[(id, 1)]);
        req.shipping_city = " ".to_owned();
        let err = req.validate(COUNTRY, None).unwrap_err();
        assert_eq!(err.to_string(), "shipping_city is required");
    }

    #[test]
    fn test_validate_idempotency_key() {
        let id = ProductId::new_v4();
        let order = request(&[(id, 1)])
            .validate(COUNTRY, Some(" checkout-42 "))
            .unwrap();
        assert_eq!(order.idempotency_key.as_deref(), Some("checkout-42"));

        assert!(request(&[(id, 1)]).validate(COUNTRY, Some("")).is_err());
        assert!(request(&[(id, 1)]).validate(COUNTRY, Some("has space")).is_err());
        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        assert!(request(&[(id, 1)]).validate(COUNTRY, Some(&long)).is_err());
    }

    // -------------------------------------------------------------------------
    // Placement
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_place_order_decrements_stock_and_totals() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget A", 2500, 10).await;
        store.add_image(widget, "https://cdn.test/a-2.jpg", 2).await;
        store.add_image(widget, "https://cdn.test/a-1.jpg", 1).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let order = coordinator
            .place_order(shop, validated(&[(widget, 2)]))
            .await
            .unwrap();

        assert_eq!(order.total, Money::from_minor(5000));
        assert_eq!(order.subtotal, order.total);
        assert_eq!(order.tax_amount, Money::ZERO);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.order_number.starts_with("ORD-"));
        assert!(order.totals_reconcile());

        let item = &order.items[0];
        assert_eq!(item.product_name, "Widget A");
        assert_eq!(item.unit_price, Money::from_minor(2500));
        assert_eq!(item.product_image.as_deref(), Some("https://cdn.test/a-1.jpg"));

        assert_eq!(store.stock(widget).await, 8);
        assert_eq!(store.orders().await, vec![order]);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_product_and_changes_nothing() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget A", 2500, 10).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let err = coordinator
            .place_order(shop, validated(&[(widget, 15)]))
            .await
            .unwrap_err();

        match err {
            OrderError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            } => {
                assert_eq!(product_id, widget);
                assert_eq!(product_name, "Widget A");
                assert_eq!(requested, 15);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(store.stock(widget).await, 10);
        assert!(store.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_middle_item_rolls_back_everything() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let a = store.add_product(shop, "A", 100, 5).await;
        let b = store.add_product(shop, "B", 200, 1).await;
        let c = store.add_product(shop, "C", 300, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let err = coordinator
            .place_order(shop, validated(&[(a, 2), (b, 3), (c, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::InsufficientStock { product_id, .. } if product_id == b));
        assert_eq!(store.stock(a).await, 5);
        assert_eq!(store.stock(b).await, 1);
        assert_eq!(store.stock(c).await, 5);
        assert!(store.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_product_lines_are_checked_cumulatively() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let err = coordinator
            .place_order(shop, validated(&[(widget, 3), (widget, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InsufficientStock { available: 2, requested: 3, .. }
        ));
        assert_eq!(store.stock(widget).await, 5);

        let order = coordinator
            .place_order(shop, validated(&[(widget, 3), (widget, 2)]))
            .await
            .unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].position, 1);
        assert_eq!(store.stock(widget).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_inactive_and_foreign_products_are_not_found() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let other_shop = ShopId::new_v4();
        let foreign = store.add_product(other_shop, "Foreign", 100, 5).await;
        let inactive = store.add_product(shop, "Retired", 100, 5).await;
        store.deactivate(inactive).await;
        let coordinator = OrderCoordinator::new(store.clone());

        for product_id in [ProductId::new_v4(), foreign, inactive] {
            let err = coordinator
                .place_order(shop, validated(&[(product_id, 1)]))
                .await
                .unwrap_err();
            assert!(
                matches!(err, OrderError::ProductNotFound { product_id: id } if id == product_id)
            );
        }
        assert_eq!(store.stock(foreign).await, 5);
    }

    /// The second placement blocks on the product lock held by the first and
    /// then sees the committed stock.
    #[tokio::test]
    async fn test_concurrent_orders_never_oversell() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            let order = validated(&[(widget, 4)]);
            async move { coordinator.place_order(shop, order).await }
        });
        let second = tokio::spawn({
            let coordinator = coordinator.clone();
            let order = validated(&[(widget, 4)]);
            async move { coordinator.place_order(shop, order).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let shortages = results
            .iter()
            .filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(shortages, 1);
        assert_eq!(store.stock(widget).await, 1);
    }

    #[tokio::test]
    async fn test_stock_after_many_orders() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 20).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let mut handles = Vec::new();
        for quantity in [3, 4, 5, 6, 7] {
            let coordinator = coordinator.clone();
            let order = validated(&[(widget, quantity)]);
            handles.push(tokio::spawn(async move {
                coordinator.place_order(shop, order).await
            }));
        }

        let mut sold = 0;
        for handle in handles {
            if let Ok(order) = handle.await.unwrap() {
                assert!(order.totals_reconcile());
                sold += order.items[0].quantity;
            }
        }
        let stock = store.stock(widget).await;
        assert!(stock >= 0);
        assert_eq!(stock, 20 - sold);
    }

    #[tokio::test]
    async fn test_idempotency_key_returns_stored_order() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 10).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let with_key = || request(&[(widget, 2)]).validate(COUNTRY, Some("cart-7")).unwrap();
        let first = coordinator.place_order(shop, with_key()).await.unwrap();
        let second = coordinator.place_order(shop, with_key()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.stock(widget).await, 8);
        assert_eq!(store.orders().await.len(), 1);

        // Keys are scoped to the shop.
        let other_shop = ShopId::new_v4();
        let gadget = store.add_product(other_shop, "Gadget", 100, 10).await;
        let other = coordinator
            .place_order(
                other_shop,
                request(&[(gadget, 1)]).validate(COUNTRY, Some("cart-7")).unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_key_replays_instead_of_failing() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let spawn_checkout = || {
            let coordinator = coordinator.clone();
            let order = request(&[(widget, 4)])
                .validate(COUNTRY, Some("cart-9"))
                .unwrap();
            tokio::spawn(async move { coordinator.place_order(shop, order).await })
        };
        let first = spawn_checkout();
        let second = spawn_checkout();

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.stock(widget).await, 1);
        assert_eq!(store.orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_order_numbers_are_unique() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 1, 50).await;
        let coordinator = OrderCoordinator::new(store.clone());

        for _ in 0..20 {
            coordinator
                .place_order(shop, validated(&[(widget, 1)]))
                .await
                .unwrap();
        }
        let orders = store.orders().await;
        let mut numbers: Vec<_> = orders.iter().map(|o| o.order_number.clone()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 20);
    }

    #[tokio::test]
    async fn test_detached_placement_times_out_and_rolls_back() {
        let store = MemoryStore::new().with_lock_delay(Duration::from_millis(500));
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let err = coordinator
            .place_order_detached(shop, validated(&[(widget, 1)]), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, OrderError::Transient(msg) if msg.contains("timed out")));
        assert_eq!(store.stock(widget).await, 5);
        assert!(store.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_detached_placement_succeeds_within_timeout() {
        let store = MemoryStore::new();
        let shop = ShopId::new_v4();
        let widget = store.add_product(shop, "Widget", 100, 5).await;
        let coordinator = OrderCoordinator::new(store.clone());

        let order = coordinator
            .place_order_detached(shop, validated(&[(widget, 1)]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(order.total, Money::from_minor(100));
        assert_eq!(store.stock(widget).await, 4);
    }
}
