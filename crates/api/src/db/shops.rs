//! Shop repository.

use sqlx::PgPool;

use easycart_core::identifiers::slug_base;
use easycart_core::{ShopId, UserId};

use super::{RepositoryError, UniqueColumn, allocate_unique, is_unique_violation};
use crate::models::{NewShop, Shop};

const SHOP_SLUG: UniqueColumn = UniqueColumn {
    table: "shops",
    column: "slug",
    shop_scoped: false,
};

const SHOP_COLUMNS: &str = "id, user_id, name, slug, description, logo_url, \
     primary_color, secondary_color, created_at, updated_at";

/// Repository for shop database operations.
pub struct ShopRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create the owner's shop with a globally unique slug derived from its name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the owner already has a shop or
    /// no slug candidate is free.
    /// Returns `RepositoryError::Database` for other database errors.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, owner: UserId, input: &NewShop) -> Result<Shop, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let slug = allocate_unique(
            &mut *tx,
            SHOP_SLUG,
            None,
            slug_base(&input.name, "shop"),
        )
        .await?;

        let shop = sqlx::query_as::<_, Shop>(&format!(
            "INSERT INTO shops (id, user_id, name, slug, description, logo_url, \
                                primary_color, secondary_color) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {SHOP_COLUMNS}"
        ))
        .bind(ShopId::new_v4())
        .bind(owner)
        .bind(input.name.trim())
        .bind(&slug)
        .bind(input.description.trim())
        .bind(input.logo_url.as_deref())
        .bind(input.primary_color())
        .bind(input.secondary_color())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some("shops_user_id_key")) {
                return RepositoryError::Conflict("user already owns a shop".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        tx.commit().await?;
        tracing::info!(shop_id = %shop.id, slug = %shop.slug, "shop created");
        Ok(shop)
    }

    /// Get a shop by its public slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Shop>, RepositoryError> {
        let shop = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM shops WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(shop)
    }

    /// Get the shop owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_owner(&self, owner: UserId) -> Result<Option<Shop>, RepositoryError> {
        let shop = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM shops WHERE user_id = $1"
        ))
        .bind(owner)
        .fetch_optional(self.pool)
        .await?;
        Ok(shop)
    }
}
