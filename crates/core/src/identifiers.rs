//! Human-facing identifier generation: slugs, SKUs and order numbers.
//!
//! Generation is split from uniqueness probing. This module produces the
//! base value and the ordered list of [`Candidates`]; the caller checks each
//! candidate against its uniqueness scope inside the transaction that will
//! insert the row, and stops at the first free one.
//!
//! ```
//! use std::collections::HashSet;
//! use easycart_core::identifiers::{Candidates, slug_base};
//!
//! let taken: HashSet<String> = ["home-garden".to_owned()].into();
//! let slug = Candidates::new(slug_base("Home & Garden", "category"))
//!     .find(|c| !taken.contains(c))
//!     .unwrap();
//! assert_eq!(slug, "home-garden-1");
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::types::ShopId;

/// Upper bound on candidates tried for one identifier.
pub const MAX_ATTEMPTS: usize = 1000;

/// Maximum number of name characters kept in a SKU.
pub const SKU_NAME_LEN: usize = 10;

/// Prefix of every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Errors from identifier generation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Every candidate within the retry budget was already taken.
    #[error("could not allocate a unique {kind} for '{base}' after {attempts} attempts")]
    Exhausted {
        /// Identifier kind ("slug", "sku", "order number").
        kind: &'static str,
        /// Base value the candidates were derived from.
        base: String,
        /// Number of candidates tried.
        attempts: usize,
    },
}

impl IdentifierError {
    /// Build the error for a retry loop that ran out of candidates.
    #[must_use]
    pub fn exhausted(kind: &'static str, base: impl Into<String>) -> Self {
        Self::Exhausted {
            kind,
            base: base.into(),
            attempts: MAX_ATTEMPTS,
        }
    }
}

/// Lower-case a name and collapse every run of characters outside
/// `[a-z0-9]` into a single `-`, trimming separators at both ends.
///
/// May return an empty string; see [`slug_base`].
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// [`slugify`] with a fallback for names that contain no letters or digits.
#[must_use]
pub fn slug_base(name: &str, fallback: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        fallback.to_owned()
    } else {
        slug
    }
}

/// SKU base for a product name: `<SHOPTAG>-<NAME>`.
///
/// `NAME` keeps only ASCII letters and digits, upper-cased and truncated to
/// [`SKU_NAME_LEN`] characters; an empty result becomes `ITEM`.
#[must_use]
pub fn sku_base(shop_id: ShopId, name: &str) -> String {
    let compressed: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(SKU_NAME_LEN)
        .collect();
    let compressed = if compressed.is_empty() {
        "ITEM".to_owned()
    } else {
        compressed
    };
    format!("{}-{compressed}", shop_id.sku_tag())
}

/// Render an order number for a given instant and random discriminator.
///
/// Format: `ORD-YYYYMMDDHHMMSSmmm-NNNN`.
#[must_use]
pub fn format_order_number(at: DateTime<Utc>, discriminator: u16) -> String {
    format!(
        "{ORDER_NUMBER_PREFIX}-{}-{:04}",
        at.format("%Y%m%d%H%M%S%3f"),
        discriminator % 10_000
    )
}

/// Draw a fresh order number from the current time and a random suffix.
///
/// Uniqueness is probabilistic; callers must still check the database and
/// rely on its unique constraint.
#[must_use]
pub fn new_order_number() -> String {
    let discriminator = rand::rng().random_range(0..10_000_u16);
    format_order_number(Utc::now(), discriminator)
}

/// Fresh order-number candidates, at most [`MAX_ATTEMPTS`] of them.
pub fn order_number_candidates() -> impl Iterator<Item = String> {
    (0..MAX_ATTEMPTS).map(|_| new_order_number())
}

/// Candidate values for a slug or SKU: `base`, `base-1`, `base-2`, ...
///
/// The suffix is always a decimal counter. Yields at most [`MAX_ATTEMPTS`]
/// values including the bare base.
#[derive(Debug, Clone)]
pub struct Candidates {
    base: String,
    next: usize,
}

impl Candidates {
    /// Start a candidate sequence from `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            next: 0,
        }
    }

    /// The unsuffixed base value.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Iterator for Candidates {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= MAX_ATTEMPTS {
            return None;
        }
        let candidate = if self.next == 0 {
            self.base.clone()
        } else {
            format!("{}-{}", self.base, self.next)
        };
        self.next += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = MAX_ATTEMPTS.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Candidates {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify("Home & Garden"), "home-garden");
        assert_eq!(slugify("  --Summer   Sale!! 2026--  "), "summer-sale-2026");
        assert_eq!(slugify("Café Crème"), "caf-cr-me");
        assert_eq!(slugify("ALLCAPS"), "allcaps");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slug_base_fallback() {
        assert_eq!(slug_base("***", "category"), "category");
        assert_eq!(slug_base("Shoes", "category"), "shoes");
    }

    #[test]
    fn test_candidates_use_decimal_suffixes() {
        let candidates: Vec<_> = Candidates::new("home-garden").take(12).collect();
        assert_eq!(candidates[0], "home-garden");
        assert_eq!(candidates[1], "home-garden-1");
        assert_eq!(candidates[10], "home-garden-10");
        assert_eq!(candidates[11], "home-garden-11");
        assert!(candidates.iter().all(|c| c.is_ascii()));
    }

    #[test]
    fn test_second_category_with_same_name_gets_suffix() {
        let mut taken = HashSet::new();
        for _ in 0..2 {
            let slug = Candidates::new(slug_base("Home & Garden", "category"))
                .find(|c| !taken.contains(c))
                .unwrap();
            taken.insert(slug);
        }
        assert!(taken.contains("home-garden"));
        assert!(taken.contains("home-garden-1"));
    }

    #[test]
    fn test_candidates_are_bounded() {
        let candidates = Candidates::new("x");
        assert_eq!(candidates.len(), MAX_ATTEMPTS);
        assert_eq!(candidates.last().unwrap(), format!("x-{}", MAX_ATTEMPTS - 1));
    }

    #[test]
    fn test_sku_base() {
        let shop: ShopId = "3fa85f64-5717-4562-b3fc-2c963f66afa6".parse().unwrap();
        assert_eq!(sku_base(shop, "Blue T-Shirt (XL)"), "3FA85F64-BLUETSHIRT");
        assert_eq!(sku_base(shop, "mug"), "3FA85F64-MUG");
        assert_eq!(sku_base(shop, "✨✨"), "3FA85F64-ITEM");
    }

    #[test]
    fn test_format_order_number() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 19, 15, 30, 45)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(123))
            .unwrap();
        assert_eq!(format_order_number(at, 42), "ORD-20261019153045123-0042");
    }

    #[test]
    fn test_order_number_candidates_bounded_and_prefixed() {
        let numbers: Vec<_> = order_number_candidates().collect();
        assert_eq!(numbers.len(), MAX_ATTEMPTS);
        assert!(numbers.iter().all(|n| n.starts_with("ORD-") && n.len() == 26));
    }

    #[test]
    fn test_exhausted_error_message() {
        let err = IdentifierError::exhausted("slug", "home-garden");
        assert_eq!(
            err.to_string(),
            "could not allocate a unique slug for 'home-garden' after 1000 attempts"
        );
    }
}
