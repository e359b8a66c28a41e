//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Shop-owner routes authenticate per handler with [`RequireShopOwner`].

pub mod auth;
pub mod request_id;

pub use auth::{Claims, RequireShopOwner, verify_bearer};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
