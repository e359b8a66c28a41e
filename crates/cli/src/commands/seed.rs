//! Seed a demo shop.
//!
//! Creates (or reuses) the owner's shop, then adds two categories and a few
//! products with stock. Running it twice adds a second set whose slugs and
//! SKUs get numeric suffixes.

use easycart_api::db::{self, CategoryRepository, ProductRepository, RepositoryError, ShopRepository};
use easycart_api::models::{NewCategory, NewProduct, NewShop, Shop};
use easycart_core::{CategoryId, Money, UserId};
use sqlx::PgPool;

use super::{CommandError, database_url};

/// `(name, price in minor units, stock, category index)`.
const DEMO_PRODUCTS: &[(&str, i64, i32, usize)] = &[
    ("Terracotta Planter", 2500, 10, 0),
    ("Garden Hose 15m", 3999, 4, 0),
    ("Cast Iron Skillet", 4500, 12, 1),
    ("Olive Wood Spoon", 899, 30, 1),
];

const DEMO_CATEGORIES: &[&str] = &["Home & Garden", "Kitchen"];

/// Create the demo data for `owner`.
///
/// # Errors
///
/// Returns an error if the database is unreachable or an insert fails.
pub async fn run(owner: UserId, name: &str) -> Result<(), CommandError> {
    let pool = db::create_pool(&database_url()?).await?;

    let shop = shop_for(&pool, owner, name).await?;
    tracing::info!(shop_id = %shop.id, slug = %shop.slug, "using shop");

    let categories = CategoryRepository::new(&pool);
    let mut category_ids: Vec<CategoryId> = Vec::with_capacity(DEMO_CATEGORIES.len());
    for category_name in DEMO_CATEGORIES {
        let category = categories
            .create(
                shop.id,
                &NewCategory {
                    name: (*category_name).to_owned(),
                    description: String::new(),
                    image_url: None,
                    is_active: true,
                },
            )
            .await?;
        tracing::info!(slug = %category.slug, "category created");
        category_ids.push(category.id);
    }

    let products = ProductRepository::new(&pool);
    for &(product_name, price, stock, category) in DEMO_PRODUCTS {
        let input = NewProduct {
            name: product_name.to_owned(),
            description: String::new(),
            category_id: category_ids.get(category).copied(),
            price: Money::from_minor(price),
            compare_price: None,
            stock,
            min_stock: 5,
            is_active: true,
            is_featured: false,
            image_ids: Vec::new(),
        };
        input.validate().map_err(CommandError::Invalid)?;
        let detail = products.create(shop.id, &input).await?;
        tracing::info!(
            slug = %detail.product.slug,
            sku = %detail.product.sku,
            stock = detail.product.stock,
            "product created"
        );
    }

    tracing::info!(storefront = %format!("/store/{}", shop.slug), "Seeding complete");
    Ok(())
}

async fn shop_for(pool: &PgPool, owner: UserId, name: &str) -> Result<Shop, CommandError> {
    let shops = ShopRepository::new(pool);
    if let Some(shop) = shops.find_by_owner(owner).await? {
        return Ok(shop);
    }

    let input = NewShop {
        name: name.to_owned(),
        description: format!("{name} demo storefront"),
        logo_url: None,
        primary_color: None,
        secondary_color: None,
    };
    input.validate().map_err(CommandError::Invalid)?;

    match shops.create(owner, &input).await {
        Ok(shop) => Ok(shop),
        // Lost a race with another seed for the same owner.
        Err(RepositoryError::Conflict(_)) => shops
            .find_by_owner(owner)
            .await?
            .ok_or(CommandError::Repository(RepositoryError::NotFound)),
        Err(e) => Err(e.into()),
    }
}
