//! Domain models for the API.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. Money fields serialize as integers in minor units.

pub mod catalog;
pub mod order;
pub mod page;
pub mod shop;

pub use catalog::{Category, Media, NewCategory, NewMedia, NewProduct, Product, ProductDetail};
pub use order::{Order, OrderItem};
pub use page::{Page, PageInfo};
pub use shop::{NewShop, Shop};
