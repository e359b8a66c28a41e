//! Shop-owner order handlers.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use easycart_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireShopOwner;
use crate::models::Order;
use crate::orders::{
    ListOrdersQuery, OrderList, OrderQueryService, PlaceOrderRequest, StatusUpdateRequest,
};
use crate::routes::{JsonBody, PathParam, QueryParams, idempotency_key};
use crate::state::AppState;

/// Orders of the owner's shop, newest first.
pub async fn index(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    QueryParams(query): QueryParams<ListOrdersQuery>,
) -> Result<Json<OrderList>> {
    let list = OrderQueryService::new(state.pool())
        .list_orders(owner.shop.id, query)
        .await?;
    Ok(Json(list))
}

/// Place an order on the owner's shop.
pub async fn create(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    headers: HeaderMap,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let settings = &state.config().orders;
    let order = request.validate(
        &settings.default_shipping_country,
        idempotency_key(&headers)?,
    )?;

    let order = state
        .coordinator()
        .place_order_detached(owner.shop.id, order, settings.timeout)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// One order with its items.
pub async fn show(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<Order>> {
    let order = OrderQueryService::new(state.pool())
        .get_order(owner.shop.id, id)
        .await?;
    Ok(Json(order))
}

/// Replace the status and/or payment status of an order.
pub async fn update_status(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    PathParam(id): PathParam<OrderId>,
    JsonBody(request): JsonBody<StatusUpdateRequest>,
) -> Result<Json<Order>> {
    let change = request.parse()?;
    let order = OrderQueryService::new(state.pool())
        .update_order_status(owner.shop.id, id, change)
        .await?;
    Ok(Json(order))
}
