//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (database reachable)
//!
//! # Storefront (public, shop selected by slug)
//! GET  /store/{slug}                   - Shop profile
//! GET  /store/{slug}/products          - Active products
//! GET  /store/{slug}/categories        - Categories
//! POST /store/{slug}/orders            - Place order (optional Idempotency-Key)
//!
//! # Shop owner (bearer token, shop of the token's user)
//! GET  /api/orders                     - Order listing
//! POST /api/orders                     - Place order
//! GET  /api/orders/{id}                - Order detail
//! PUT  /api/orders/{id}/status         - Update status / payment status
//! GET  /api/categories                 - Category listing
//! POST /api/categories                 - Create category
//! DELETE /api/categories/{id}          - Delete category
//! GET  /api/products                   - Product listing
//! POST /api/products                   - Create product
//! GET  /api/products/{id}              - Product detail
//! POST /api/media                      - Register uploaded media
//! ```

pub mod catalog;
pub mod orders;
pub mod storefront;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
};
use serde::Deserialize;

use easycart_core::CategoryId;

use crate::db::catalog::ProductFilter;
use crate::error::AppError;
use crate::models::Page;
use crate::state::AppState;

/// Header carrying a client-chosen key that makes order placement idempotent.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// JSON body extractor whose rejections render as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query string extractor whose rejections render as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Path extractor whose rejections render as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

/// Query parameters of a product listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl ProductListQuery {
    /// Split into a filter and clamped pagination.
    #[must_use]
    pub fn into_parts(
        self,
        active_only: bool,
        default_limit: i64,
        max_limit: i64,
    ) -> (ProductFilter, Page) {
        let page = Page::new(self.page, self.limit, default_limit, max_limit);
        let filter = ProductFilter {
            active_only,
            search: self
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            category_id: self.category_id,
        };
        (filter, page)
    }
}

/// The `Idempotency-Key` header, if present and readable.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the header is not visible ASCII.
pub fn idempotency_key(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::BadRequest("invalid Idempotency-Key header".to_owned()))
        })
        .transpose()
}

/// Create the public storefront router.
pub fn storefront_routes() -> Router<AppState> {
    Router::new()
        .route("/{slug}", get(storefront::shop))
        .route("/{slug}/products", get(storefront::products))
        .route("/{slug}/categories", get(storefront::categories))
        .route("/{slug}/orders", post(storefront::place_order))
}

/// Create the shop-owner API router.
pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::index).post(orders::create))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route(
            "/categories",
            get(catalog::categories).post(catalog::create_category),
        )
        .route("/categories/{id}", delete(catalog::delete_category))
        .route(
            "/products",
            get(catalog::products).post(catalog::create_product),
        )
        .route("/products/{id}", get(catalog::product))
        .route("/media", post(catalog::create_media))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/store", storefront_routes())
        .nest("/api", owner_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_product_query_blank_search_is_ignored() {
        let query = ProductListQuery {
            search: Some("   ".to_owned()),
            ..ProductListQuery::default()
        };
        let (filter, page) = query.into_parts(true, 12, 50);
        assert!(filter.active_only);
        assert!(filter.search.is_none());
        assert_eq!(page.limit(), 12);
    }

    #[test]
    fn test_product_query_limit_is_clamped() {
        let query = ProductListQuery {
            page: Some(3),
            limit: Some(500),
            search: Some(" mug ".to_owned()),
            category_id: None,
        };
        let (filter, page) = query.into_parts(false, 20, 100);
        assert_eq!(filter.search.as_deref(), Some("mug"));
        assert_eq!(page.page(), 3);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn test_idempotency_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("checkout-7f3a"));
        assert_eq!(idempotency_key(&headers).unwrap(), Some("checkout-7f3a"));

        headers.insert(
            IDEMPOTENCY_KEY_HEADER,
            HeaderValue::from_bytes(b"caf\xe9").unwrap(),
        );
        assert!(idempotency_key(&headers).is_err());
    }
}
