//! Catalog domain types: categories, products and media.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easycart_core::{CategoryId, MediaId, Money, ProductId, ShopId};

/// A shop-scoped product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub shop_id: ShopId,
    pub name: String,
    /// Unique within the shop.
    pub slug: String,
    pub description: String,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable product. `stock` is never negative.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    /// Unique within the shop.
    pub slug: String,
    pub description: String,
    /// Unique within the shop.
    pub sku: String,
    pub price: Money,
    pub compare_price: Option<Money>,
    pub stock: i32,
    /// Threshold at or below which the product counts as low on stock.
    pub min_stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

/// Uploaded media metadata. The file itself lives in external storage.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Media {
    pub id: MediaId,
    pub shop_id: ShopId,
    pub product_id: Option<ProductId>,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt: String,
    /// Lower sorts first; the first image is the product's primary image.
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product together with its images, primary image first.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub low_stock: bool,
    pub images: Vec<Media>,
}

impl ProductDetail {
    #[must_use]
    pub const fn new(product: Product, images: Vec<Media>) -> Self {
        let low_stock = product.is_low_stock();
        Self {
            product,
            low_stock,
            images,
        }
    }
}

/// Input for creating a category. The slug is generated from the name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NewCategory {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        Ok(())
    }
}

/// Input for creating a product. Slug and SKU are generated from the name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub price: Money,
    #[serde(default)]
    pub compare_price: Option<Money>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub min_stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    /// Media to attach, in display order.
    #[serde(default)]
    pub image_ids: Vec<MediaId>,
}

impl NewProduct {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        if self.price.is_negative() {
            return Err("price cannot be negative".to_owned());
        }
        if self.compare_price.is_some_and(|p| p.is_negative()) {
            return Err("compare_price cannot be negative".to_owned());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_owned());
        }
        if self.min_stock < 0 {
            return Err("min_stock cannot be negative".to_owned());
        }
        Ok(())
    }
}

/// Metadata for a file already placed in storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMedia {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl NewMedia {
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.filename.trim().is_empty() {
            return Err("filename is required".to_owned());
        }
        if self.url.trim().is_empty() {
            return Err("url is required".to_owned());
        }
        if !self.mime_type.contains('/') {
            return Err(format!("invalid mime_type: {}", self.mime_type));
        }
        if self.size_bytes < 0 {
            return Err("size_bytes cannot be negative".to_owned());
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}
