//! Catalog repositories: categories, products and media.
//!
//! Every query is scoped to a shop. Slugs and SKUs are allocated inside the
//! transaction that inserts the row; see [`super::allocate_unique`].

use std::collections::HashMap;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use easycart_core::identifiers::{sku_base, slug_base};
use easycart_core::{CategoryId, MediaId, ProductId, ShopId};

use super::{RepositoryError, UniqueColumn, allocate_unique, contains_pattern};
use crate::models::{
    Category, Media, NewCategory, NewMedia, NewProduct, Page, Product, ProductDetail,
};

const CATEGORY_COLUMNS: &str =
    "id, shop_id, name, slug, description, image_url, is_active, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, shop_id, category_id, name, slug, description, sku, \
     price, compare_price, stock, min_stock, is_active, is_featured, created_at, updated_at";

const MEDIA_COLUMNS: &str = "id, shop_id, product_id, filename, url, mime_type, size_bytes, \
     width, height, alt, sort_order, created_at, updated_at";

/// Primary image first: lowest `sort_order`, then oldest.
const MEDIA_ORDER: &str = "sort_order ASC, created_at ASC, id ASC";

const CATEGORY_SLUG: UniqueColumn = UniqueColumn {
    table: "categories",
    column: "slug",
    shop_scoped: true,
};

const PRODUCT_SLUG: UniqueColumn = UniqueColumn {
    table: "products",
    column: "slug",
    shop_scoped: true,
};

const PRODUCT_SKU: UniqueColumn = UniqueColumn {
    table: "products",
    column: "sku",
    shop_scoped: true,
};

// =============================================================================
// Categories
// =============================================================================

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a category with a slug unique within the shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no slug candidate is free.
    /// Returns `RepositoryError::Database` for other database errors.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &NewCategory,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let slug = allocate_unique(
            &mut *tx,
            CATEGORY_SLUG,
            Some(shop_id),
            slug_base(&input.name, "category"),
        )
        .await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (id, shop_id, name, slug, description, image_url, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(CategoryId::new_v4())
        .bind(shop_id)
        .bind(input.name.trim())
        .bind(&slug)
        .bind(input.description.trim())
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    /// Get a category by ID within a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(
        &self,
        shop_id: ShopId,
        id: CategoryId,
    ) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 AND shop_id = $2"
        ))
        .bind(id)
        .bind(shop_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// List a shop's categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop_id: ShopId) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE shop_id = $1 ORDER BY name ASC, id ASC"
        ))
        .bind(shop_id)
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Delete a category that no product references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is not in the shop.
    /// Returns `RepositoryError::Conflict` if any product still references it.
    /// Returns `RepositoryError::Database` for other database errors.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, shop_id: ShopId, id: CategoryId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM categories WHERE id = $1 AND shop_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(shop_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE category_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if in_use {
            return Err(RepositoryError::Conflict(
                "cannot delete category with products".to_owned(),
            ));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A product inserted after the check still trips the foreign key.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return RepositoryError::Conflict(
                        "cannot delete category with products".to_owned(),
                    );
                }
                RepositoryError::Database(e)
            })?;

        tx.commit().await?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }
}

// =============================================================================
// Products
// =============================================================================

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Only products with `is_active = true`.
    pub active_only: bool,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a product with a generated slug and SKU, attaching the given
    /// media in order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if the category or a media
    /// item does not belong to the shop, or a media item is already attached
    /// to another product.
    /// Returns `RepositoryError::Conflict` if no slug or SKU candidate is free.
    /// Returns `RepositoryError::Database` for other database errors.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        shop_id: ShopId,
        input: &NewProduct,
    ) -> Result<ProductDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(category_id) = input.category_id {
            let found: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM categories WHERE id = $1 AND shop_id = $2 FOR SHARE",
            )
            .bind(category_id)
            .bind(shop_id)
            .fetch_optional(&mut *tx)
            .await?;
            if found.is_none() {
                return Err(RepositoryError::InvalidReference(format!(
                    "category {category_id} not found"
                )));
            }
        }

        // Slug before SKU, so concurrent creates take candidate locks in the
        // same order.
        let slug = allocate_unique(
            &mut *tx,
            PRODUCT_SLUG,
            Some(shop_id),
            slug_base(&input.name, "product"),
        )
        .await?;
        let sku = allocate_unique(
            &mut *tx,
            PRODUCT_SKU,
            Some(shop_id),
            sku_base(shop_id, &input.name),
        )
        .await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (id, shop_id, category_id, name, slug, description, sku, \
                                   price, compare_price, stock, min_stock, is_active, is_featured) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(ProductId::new_v4())
        .bind(shop_id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&slug)
        .bind(input.description.trim())
        .bind(&sku)
        .bind(input.price)
        .bind(input.compare_price)
        .bind(input.stock)
        .bind(input.min_stock)
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_one(&mut *tx)
        .await?;

        let mut images = Vec::with_capacity(input.image_ids.len());
        for (sort_order, media_id) in (0_i32..).zip(&input.image_ids) {
            let media = sqlx::query_as::<_, Media>(&format!(
                "UPDATE media SET product_id = $1, sort_order = $2, updated_at = NOW() \
                 WHERE id = $3 AND shop_id = $4 \
                   AND (product_id IS NULL OR product_id = $1) \
                 RETURNING {MEDIA_COLUMNS}"
            ))
            .bind(product.id)
            .bind(sort_order)
            .bind(*media_id)
            .bind(shop_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                RepositoryError::InvalidReference(format!(
                    "media {media_id} not found or attached to another product"
                ))
            })?;
            images.push(media);
        }

        tx.commit().await?;
        tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
        Ok(ProductDetail::new(product, images))
    }

    /// Get a product with its images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn find_detail(
        &self,
        shop_id: ShopId,
        id: ProductId,
        active_only: bool,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE id = $1 AND shop_id = $2 AND (is_active OR NOT $3)"
        ))
        .bind(id)
        .bind(shop_id)
        .bind(active_only)
        .fetch_optional(self.pool)
        .await?;

        let Some(product) = product else {
            return Ok(None);
        };
        let images = MediaRepository::new(self.pool)
            .list_for_product(product.id)
            .await?;
        Ok(Some(ProductDetail::new(product, images)))
    }

    /// List products newest first, with their images.
    ///
    /// Returns the page of products and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        shop_id: ShopId,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<(Vec<ProductDetail>, i64), RepositoryError> {
        const WHERE: &str = "WHERE shop_id = $1 \
               AND (is_active OR NOT $2) \
               AND ($3::uuid IS NULL OR category_id = $3) \
               AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4)";

        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(shop_id)
            .bind(filter.active_only)
            .bind(filter.category_id)
            .bind(search.as_deref())
            .fetch_one(self.pool)
            .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(shop_id)
        .bind(filter.active_only)
        .bind(filter.category_id)
        .bind(search.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id.as_uuid()).collect();
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE product_id = ANY($1) ORDER BY {MEDIA_ORDER}"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_product: HashMap<ProductId, Vec<Media>> = HashMap::new();
        for m in media {
            if let Some(product_id) = m.product_id {
                by_product.entry(product_id).or_default().push(m);
            }
        }
        let details = products
            .into_iter()
            .map(|product| {
                let images = by_product.remove(&product.id).unwrap_or_default();
                ProductDetail::new(product, images)
            })
            .collect();

        Ok((details, total))
    }
}

/// Lock an active product of the shop for the rest of the transaction.
///
/// Returns `None` if the product does not exist, belongs to another shop or
/// is inactive.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_active_for_update(
    conn: &mut PgConnection,
    shop_id: ShopId,
    product_id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE id = $1 AND shop_id = $2 AND is_active \
         FOR UPDATE"
    ))
    .bind(product_id)
    .bind(shop_id)
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

/// URL of the product's primary image, if it has any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_primary_image(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<Option<String>, RepositoryError> {
    let url = sqlx::query_scalar::<_, String>(&format!(
        "SELECT url FROM media WHERE product_id = $1 ORDER BY {MEDIA_ORDER} LIMIT 1"
    ))
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(url)
}

/// Decrement stock if at least `quantity` units remain.
///
/// Returns `false`, leaving stock untouched, when fewer units remain.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $1, updated_at = NOW() \
         WHERE id = $2 AND stock >= $1",
    )
    .bind(quantity)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

// =============================================================================
// Media
// =============================================================================

/// Repository for media metadata.
pub struct MediaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> MediaRepository<'a> {
    /// Create a new media repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record metadata for an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidReference` if `product_id` is not a
    /// product of the shop.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, shop_id: ShopId, input: &NewMedia) -> Result<Media, RepositoryError> {
        let media = sqlx::query_as::<_, Media>(&format!(
            "INSERT INTO media (id, shop_id, product_id, filename, url, mime_type, size_bytes, \
                                width, height, alt, sort_order) \
             SELECT $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11 \
             WHERE $3::uuid IS NULL \
                OR EXISTS (SELECT 1 FROM products WHERE id = $3 AND shop_id = $2) \
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(MediaId::new_v4())
        .bind(shop_id)
        .bind(input.product_id)
        .bind(input.filename.trim())
        .bind(input.url.trim())
        .bind(input.mime_type.trim())
        .bind(input.size_bytes)
        .bind(input.width)
        .bind(input.height)
        .bind(input.alt.trim())
        .bind(input.sort_order)
        .fetch_optional(self.pool)
        .await?;

        media.ok_or_else(|| RepositoryError::InvalidReference("product not found".to_owned()))
    }

    /// A product's images, primary image first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Media>, RepositoryError> {
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE product_id = $1 ORDER BY {MEDIA_ORDER}"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(media)
    }
}
