//! Order queries and status updates.

use serde::Deserialize;
use sqlx::PgPool;

use easycart_core::{OrderId, OrderStatus, PaymentStatus, ShopId};

use super::error::OrderError;
use crate::db::orders::OrderFilter;
use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, Page, PageInfo};

/// Default page size for order listings.
pub const DEFAULT_LIMIT: i64 = 20;
/// Largest accepted page size for order listings.
pub const MAX_LIMIT: i64 = 100;

/// Raw query parameters of an order listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListOrdersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub search: Option<String>,
}

impl ListOrdersQuery {
    /// Clamp pagination and parse the status filter.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an unknown status.
    pub fn into_parts(self) -> Result<(OrderFilter, Page), OrderError> {
        let page = Page::new(self.page, self.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        let search = self
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        Ok((OrderFilter { status, search }, page))
    }
}

/// A page of orders.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub pagination: PageInfo,
}

/// Body of a status update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

/// A parsed status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdateRequest {
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for unknown values or an empty update.
    pub fn parse(&self) -> Result<StatusChange, OrderError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        let payment_status = self
            .payment_status
            .as_deref()
            .map(str::parse::<PaymentStatus>)
            .transpose()
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        if status.is_none() && payment_status.is_none() {
            return Err(OrderError::validation(
                "status or payment_status is required",
            ));
        }
        Ok(StatusChange {
            status,
            payment_status,
        })
    }
}

/// Read and update access to a shop's orders.
pub struct OrderQueryService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderQueryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// Newest orders first, with items and pagination.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an unknown status filter, or a
    /// storage error.
    pub async fn list_orders(
        &self,
        shop_id: ShopId,
        query: ListOrdersQuery,
    ) -> Result<OrderList, OrderError> {
        let (filter, page) = query.into_parts()?;
        let (orders, total) = self.orders.list(shop_id, &filter, page).await?;
        Ok(OrderList {
            orders,
            pagination: page.info(total),
        })
    }

    /// One order of the shop, with items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if the order is not in the shop.
    pub async fn get_order(&self, shop_id: ShopId, order_id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .find(shop_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Replace status and/or payment status.
    ///
    /// Any transition is accepted; ones outside the forward-only lifecycle are
    /// logged as warnings.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::OrderNotFound` if the order is not in the shop.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        shop_id: ShopId,
        order_id: OrderId,
        change: StatusChange,
    ) -> Result<Order, OrderError> {
        let (previous, order) = self
            .orders
            .update_status(shop_id, order_id, change.status, change.payment_status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::OrderNotFound(order_id),
                other => other.into(),
            })?;

        if !previous.is_forward_transition(order.status) {
            tracing::warn!(
                order_number = %order.order_number,
                from = %previous,
                to = %order.status,
                "order status moved outside the forward lifecycle"
            );
        } else if previous != order.status {
            tracing::info!(
                order_number = %order.order_number,
                from = %previous,
                to = %order.status,
                "order status updated"
            );
        }
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_defaults() {
        let (filter, page) = ListOrdersQuery::default().into_parts().unwrap();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), DEFAULT_LIMIT);
        assert!(filter.status.is_none());
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_list_query_clamps_and_parses() {
        let query = ListOrdersQuery {
            page: Some(0),
            limit: Some(500),
            status: Some("shipped".to_owned()),
            search: Some("  ORD-2026 ".to_owned()),
        };
        let (filter, page) = query.into_parts().unwrap();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), DEFAULT_LIMIT);
        assert_eq!(filter.status, Some(OrderStatus::Shipped));
        assert_eq!(filter.search.as_deref(), Some("ORD-2026"));
    }

    #[test]
    fn test_list_query_blank_filters_are_ignored() {
        let query = ListOrdersQuery {
            status: Some(String::new()),
            search: Some("   ".to_owned()),
            ..ListOrdersQuery::default()
        };
        let (filter, _) = query.into_parts().unwrap();
        assert!(filter.status.is_none());
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_list_query_rejects_unknown_status() {
        let query = ListOrdersQuery {
            status: Some("lost".to_owned()),
            ..ListOrdersQuery::default()
        };
        assert!(matches!(query.into_parts(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_status_update_parsing() {
        let change = StatusUpdateRequest {
            status: Some("shipped".to_owned()),
            payment_status: None,
        }
        .parse()
        .unwrap();
        assert_eq!(change.status, Some(OrderStatus::Shipped));
        assert_eq!(change.payment_status, None);

        let err = StatusUpdateRequest {
            status: None,
            payment_status: Some("maybe".to_owned()),
        }
        .parse()
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid payment status: maybe");

        assert!(StatusUpdateRequest::default().parse().is_err());
    }
}
