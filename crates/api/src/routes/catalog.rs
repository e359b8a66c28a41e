//! Shop-owner catalog handlers: categories, products and media.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use easycart_core::{CategoryId, ProductId};

use crate::db::{CategoryRepository, MediaRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireShopOwner;
use crate::models::{
    Category, Media, NewCategory, NewMedia, NewProduct, PageInfo, ProductDetail,
};
use crate::routes::{JsonBody, PathParam, ProductListQuery, QueryParams};
use crate::state::AppState;

/// Default page size for owner product listings.
pub const DEFAULT_PRODUCT_LIMIT: i64 = 20;
/// Largest accepted page size for owner product listings.
pub const MAX_PRODUCT_LIMIT: i64 = 100;

/// A page of products, inactive ones included.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductDetail>,
    pub pagination: PageInfo,
}

/// Categories of the owner's shop.
pub async fn categories(
    State(state): State<AppState>,
    owner: RequireShopOwner,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool())
        .list(owner.shop.id)
        .await?;
    Ok(Json(categories))
}

/// Create a category; the slug is derived from the name.
pub async fn create_category(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    JsonBody(input): JsonBody<NewCategory>,
) -> Result<(StatusCode, Json<Category>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .create(owner.shop.id, &input)
        .await?;
    tracing::info!(category_id = %category.id, slug = %category.slug, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Delete a category that no product references.
pub async fn delete_category(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    PathParam(id): PathParam<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool())
        .delete(owner.shop.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Products of the owner's shop, newest first.
pub async fn products(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    QueryParams(query): QueryParams<ProductListQuery>,
) -> Result<Json<ProductPage>> {
    let (filter, page) = query.into_parts(false, DEFAULT_PRODUCT_LIMIT, MAX_PRODUCT_LIMIT);
    let (products, total) = ProductRepository::new(state.pool())
        .list(owner.shop.id, &filter, page)
        .await?;
    Ok(Json(ProductPage {
        products,
        pagination: page.info(total),
    }))
}

/// Create a product; slug and SKU are derived from the name.
pub async fn create_product(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    JsonBody(input): JsonBody<NewProduct>,
) -> Result<(StatusCode, Json<ProductDetail>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .create(owner.shop.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// One product with its images.
pub async fn product(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    PathParam(id): PathParam<ProductId>,
) -> Result<Json<ProductDetail>> {
    ProductRepository::new(state.pool())
        .find_detail(owner.shop.id, id, false)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Register metadata for a file already uploaded to storage.
pub async fn create_media(
    State(state): State<AppState>,
    owner: RequireShopOwner,
    JsonBody(input): JsonBody<NewMedia>,
) -> Result<(StatusCode, Json<Media>)> {
    input.validate().map_err(AppError::BadRequest)?;
    let media = MediaRepository::new(state.pool())
        .create(owner.shop.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(media)))
}
