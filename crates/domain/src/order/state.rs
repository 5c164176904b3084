//! Order fulfillment state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Paid ──► Processing ──► Shipped ──► Delivered
///    │         │
///    └─────────┴──► Cancelled
/// ```
///
/// Orders start as `Pending` (legacy cart checkout with no payment step) or
/// `Paid` (checkout after a verified payment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed without a settled payment.
    #[default]
    Pending,

    /// Placed after the payment was verified.
    Paid,

    /// A seller has started fulfilling the order.
    Processing,

    /// Handed over to the carrier.
    Shipped,

    /// Received by the buyer (terminal state).
    Delivered,

    /// Cancelled before fulfillment started (terminal state).
    Cancelled,
}

/// Every legal edge of the lifecycle. Anything not listed here is rejected.
const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Paid),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Paid, OrderStatus::Processing),
    (OrderStatus::Paid, OrderStatus::Cancelled),
    (OrderStatus::Processing, OrderStatus::Shipped),
    (OrderStatus::Shipped, OrderStatus::Delivered),
];

/// The subset of edges a seller may drive for orders containing their products.
const SELLER_TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Paid, OrderStatus::Processing),
    (OrderStatus::Processing, OrderStatus::Shipped),
];

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        TRANSITIONS.contains(&(*self, next))
    }

    /// Returns true if a seller may move an order from this status to `next`.
    pub fn seller_can_transition_to(&self, next: OrderStatus) -> bool {
        SELLER_TRANSITIONS.contains(&(*self, next))
    }

    /// Returns true if the buyer may still cancel the order.
    pub fn can_cancel(&self) -> bool {
        self.can_transition_to(OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}
