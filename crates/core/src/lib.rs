//! EasyCart Core - Shared domain types.
//!
//! This crate provides the types used across all EasyCart components:
//! - `api` - Storefront and shop-owner HTTP service
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Uniqueness probing for generated identifiers is
//! left to the caller, which runs it inside its own transaction.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, emails, statuses and roles
//! - [`identifiers`] - Slug, SKU and order-number generation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod identifiers;
pub mod types;

pub use identifiers::{Candidates, IdentifierError};
pub use types::*;
