//! Order aggregate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use easycart_core::{
    Email, Money, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, ShopId,
};

/// A placed order with its line items.
///
/// `total == subtotal + tax_amount + shipping_cost` and
/// `subtotal == Σ items[i].total` hold for every persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Globally unique, human-facing number.
    pub order_number: String,
    pub shop_id: ShopId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub customer_email: Email,
    pub customer_name: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_zip: String,
    pub shipping_country: String,
    pub notes: String,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Whether the stored amounts reconcile with each other and the items.
    #[must_use]
    pub fn totals_reconcile(&self) -> bool {
        let items: Option<Money> = self
            .items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.total));
        let total = self
            .subtotal
            .checked_add(self.tax_amount)
            .and_then(|m| m.checked_add(self.shipping_cost));
        items == Some(self.subtotal) && total == Some(self.total)
    }
}

/// Snapshot of a product at the moment it was ordered.
///
/// `product_id` is a weak reference; the product may since have been edited
/// or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    /// Zero-based position in the submitted cart.
    pub position: i32,
    pub product_name: String,
    pub product_sku: String,
    pub product_image: Option<String>,
    pub unit_price: Money,
    pub quantity: i32,
    /// `unit_price * quantity`.
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order_with(items: &[(i64, i32)], subtotal: i64, total: i64) -> Order {
        let id = OrderId::new_v4();
        let now = Utc::now();
        Order {
            id,
            order_number: "ORD-20261019000000000-0001".to_owned(),
            shop_id: ShopId::new_v4(),
            idempotency_key: None,
            customer_email: Email::parse("buyer@shop.test").unwrap(),
            customer_name: "Buyer".to_owned(),
            customer_phone: String::new(),
            shipping_address: "1 Main St".to_owned(),
            shipping_city: "Springfield".to_owned(),
            shipping_state: String::new(),
            shipping_zip: "12345".to_owned(),
            shipping_country: "US".to_owned(),
            notes: String::new(),
            subtotal: Money::from_minor(subtotal),
            tax_amount: Money::ZERO,
            shipping_cost: Money::ZERO,
            total: Money::from_minor(total),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            items: items
                .iter()
                .zip(0..)
                .map(|(&(price, qty), position)| OrderItem {
                    id: OrderItemId::new_v4(),
                    order_id: id,
                    product_id: ProductId::new_v4(),
                    position,
                    product_name: "Thing".to_owned(),
                    product_sku: "TAG-THING".to_owned(),
                    product_image: None,
                    unit_price: Money::from_minor(price),
                    quantity: qty,
                    total: Money::from_minor(price * i64::from(qty)),
                    created_at: now,
                })
                .collect(),
        }
    }

    #[test]
    fn test_totals_reconcile() {
        assert!(order_with(&[(2500, 2), (100, 1)], 5100, 5100).totals_reconcile());
        assert!(!order_with(&[(2500, 2)], 5100, 5100).totals_reconcile());
        assert!(!order_with(&[(2500, 2)], 5000, 5001).totals_reconcile());
    }

    #[test]
    fn test_order_serializes_money_as_minor_units() {
        let json = serde_json::to_value(order_with(&[(2500, 2)], 5000, 5000)).unwrap();
        assert_eq!(json["total"], 5000);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["customer_email"], "buyer@shop.test");
        assert_eq!(json["items"][0]["quantity"], 2);
        assert!(json.get("idempotency_key").is_none());
    }
}
