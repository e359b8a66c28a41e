//! Order engine: placement, queries and status updates.
//!
//! [`OrderCoordinator`] places orders atomically over an [`OrderStore`];
//! [`OrderQueryService`] lists, reads and updates persisted orders.

pub mod error;
pub mod placement;
pub mod query;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use error::OrderError;
pub use placement::{
    LineItemRequest, OrderCoordinator, PlaceOrderRequest, ValidatedLine, ValidatedOrder,
};
pub use query::{ListOrdersQuery, OrderList, OrderQueryService, StatusChange, StatusUpdateRequest};
pub use store::{OrderStore, OrderTransaction};
