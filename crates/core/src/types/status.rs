//! Status enums for orders and user roles.
//!
//! Statuses are stored as lower-case `TEXT` and parsed back with
//! [`std::str::FromStr`]; the database `CHECK` constraints list the same
//! values.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status or role string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct UnknownVariant {
    /// What was being parsed (e.g. "order status").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Order fulfillment status.
///
/// The intended lifecycle is `pending → processing → shipped → delivered`,
/// with `cancelled` reachable before shipping. Updates are not validated
/// against it; see [`OrderStatus::is_forward_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status in the forward-only lifecycle.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether `self → next` follows the forward-only lifecycle.
    ///
    /// Staying in the same status counts as allowed.
    #[must_use]
    pub const fn is_forward_transition(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Processing | Self::Cancelled)
                | (Self::Processing, Self::Processing | Self::Shipped | Self::Cancelled)
                | (Self::Shipped, Self::Shipped | Self::Delivered)
                | (Self::Delivered, Self::Delivered)
                | (Self::Cancelled, Self::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(UnknownVariant {
                kind: "order status",
                value: s.to_owned(),
            }),
        }
    }
}

/// Payment status. Independent of [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(UnknownVariant {
                kind: "payment status",
                value: s.to_owned(),
            }),
        }
    }
}

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Platform administrator.
    Admin,
    /// Shop owner or staff.
    Manager,
    /// Storefront customer.
    Customer,
}

impl UserRole {
    /// May manage a shop's catalog and orders.
    #[must_use]
    pub const fn can_manage_shop(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }

    /// May manage other users.
    #[must_use]
    pub const fn can_manage_users(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "customer" => Ok(Self::Customer),
            _ => Err(UnknownVariant {
                kind: "user role",
                value: s.to_owned(),
            }),
        }
    }
}
