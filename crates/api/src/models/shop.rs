//! Shop domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use easycart_core::{ShopId, UserId};

/// Default primary theme color for new shops.
pub const DEFAULT_PRIMARY_COLOR: &str = "#3B82F6";
/// Default secondary theme color for new shops.
pub const DEFAULT_SECONDARY_COLOR: &str = "#64748B";

/// A tenant storefront. Each owning user has exactly one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Shop {
    pub id: ShopId,
    /// Owning user.
    pub user_id: UserId,
    pub name: String,
    /// Globally unique URL slug.
    pub slug: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a shop. The slug is generated from the name.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShop {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub secondary_color: Option<String>,
}

impl NewShop {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_owned());
        }
        for color in [&self.primary_color, &self.secondary_color].into_iter().flatten() {
            if !is_hex_color(color) {
                return Err(format!("invalid color: {color}"));
            }
        }
        Ok(())
    }

    /// Primary color, falling back to the default theme.
    #[must_use]
    pub fn primary_color(&self) -> &str {
        self.primary_color.as_deref().unwrap_or(DEFAULT_PRIMARY_COLOR)
    }

    /// Secondary color, falling back to the default theme.
    #[must_use]
    pub fn secondary_color(&self) -> &str {
        self.secondary_color
            .as_deref()
            .unwrap_or(DEFAULT_SECONDARY_COLOR)
    }
}

/// `#RRGGBB`.
fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s.chars().skip(1).all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_shop(name: &str) -> NewShop {
        NewShop {
            name: name.to_owned(),
            description: String::new(),
            logo_url: None,
            primary_color: None,
            secondary_color: None,
        }
    }

    #[test]
    fn test_theme_defaults() {
        let shop = new_shop("Corner Store");
        assert_eq!(shop.primary_color(), "#3B82F6");
        assert_eq!(shop.secondary_color(), "#64748B");
    }

    #[test]
    fn test_validate() {
        assert!(new_shop("Corner Store").validate().is_ok());
        assert!(new_shop("   ").validate().is_err());

        let mut shop = new_shop("Corner Store");
        shop.primary_color = Some("blue".to_owned());
        assert_eq!(shop.validate(), Err("invalid color: blue".to_owned()));
        shop.primary_color = Some("#00ff7F".to_owned());
        assert!(shop.validate().is_ok());
    }
}
