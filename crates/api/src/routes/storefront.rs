//! Public storefront handlers. The shop is selected by its slug.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use crate::db::{CategoryRepository, ProductRepository, ShopRepository};
use crate::error::{AppError, Result};
use crate::models::{Category, Order, PageInfo, ProductDetail, Shop};
use crate::orders::PlaceOrderRequest;
use crate::routes::{JsonBody, PathParam, ProductListQuery, QueryParams, idempotency_key};
use crate::state::AppState;

/// Default page size for storefront product listings.
pub const DEFAULT_PRODUCT_LIMIT: i64 = 12;
/// Largest accepted page size for storefront product listings.
pub const MAX_PRODUCT_LIMIT: i64 = 50;

/// A page of storefront products.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductDetail>,
    pub pagination: PageInfo,
}

async fn shop_by_slug(state: &AppState, slug: &str) -> Result<Shop> {
    ShopRepository::new(state.pool())
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("shop {slug}")))
}

/// Shop profile.
pub async fn shop(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
) -> Result<Json<Shop>> {
    Ok(Json(shop_by_slug(&state, &slug).await?))
}

/// Active products of a shop, newest first.
pub async fn products(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    QueryParams(query): QueryParams<ProductListQuery>,
) -> Result<Json<ProductPage>> {
    let shop = shop_by_slug(&state, &slug).await?;
    let (filter, page) = query.into_parts(true, DEFAULT_PRODUCT_LIMIT, MAX_PRODUCT_LIMIT);
    let (products, total) = ProductRepository::new(state.pool())
        .list(shop.id, &filter, page)
        .await?;

    Ok(Json(ProductPage {
        products,
        pagination: page.info(total),
    }))
}

/// Categories of a shop.
pub async fn categories(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
) -> Result<Json<Vec<Category>>> {
    let shop = shop_by_slug(&state, &slug).await?;
    let categories = CategoryRepository::new(state.pool()).list(shop.id).await?;
    Ok(Json(categories.into_iter().filter(|c| c.is_active).collect()))
}

/// Place an order on the shop.
#[tracing::instrument(skip_all, fields(slug = %slug))]
pub async fn place_order(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let shop = shop_by_slug(&state, &slug).await?;
    let settings = &state.config().orders;
    let order = request.validate(
        &settings.default_shipping_country,
        idempotency_key(&headers)?,
    )?;

    let order = state
        .coordinator()
        .place_order_detached(shop.id, order, settings.timeout)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
