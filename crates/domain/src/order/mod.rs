//! Order record and related types.

mod record;
mod state;
mod value_objects;

pub use record::{NewOrder, Order};
pub use state::OrderStatus;
pub use value_objects::{LineItem, Money, OrderItem, PaymentReference, ProductId, ShippingDetails};

use thiserror::Error;

/// Errors that can occur when building or transitioning an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The order total does not fit in the money representation.
    #[error("Order total overflows")]
    AmountOverflow,

    /// The requested lifecycle edge is not in the transition table.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string that does not name any lifecycle state.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
