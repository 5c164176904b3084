//! Checkout error types.

use common::OrderId;
use domain::{OrderError, OrderStatus, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while placing, paying for, or fulfilling an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Neither the request nor the persisted cart has any items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A referenced product no longer exists in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Stock was depleted before the reservation could be made.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Payment intents must be for a positive amount.
    #[error("Invalid amount: {0} (must be greater than 0)")]
    InvalidAmount(i64),

    /// Line quantities must be positive.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The order total does not fit in the money representation.
    #[error("Order total overflows")]
    AmountOverflow,

    /// The payment provider rejected the request or could not be reached.
    #[error("Payment gateway error [{code}]: {message}")]
    Gateway { code: String, message: String },

    /// The completion signature did not match.
    #[error("Payment verification failed")]
    PaymentNotAuthentic,

    /// The verified transaction is already attached to another order.
    #[error("Payment transaction {0} has already been settled")]
    PaymentAlreadySettled(String),

    /// The caller has no stake in the order.
    #[error("Not allowed to change the status of order {0}")]
    UnauthorizedTransition(OrderId),

    /// The requested lifecycle edge is not legal from the current status.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status string that does not name any lifecycle state.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A collaborator could not be set up.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected persistence failure.
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl CheckoutError {
    pub(crate) fn gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(product_id) => Self::ProductNotFound(product_id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderNotFound(order_id) => Self::OrderNotFound(order_id),
            StoreError::DuplicatePayment(txn) => Self::PaymentAlreadySettled(txn),
            other => Self::Store(other),
        }
    }
}

impl From<OrderError> for CheckoutError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoItems => Self::EmptyCart,
            OrderError::InvalidQuantity {
                product_id,
                quantity,
            } => Self::InvalidQuantity {
                product_id,
                quantity,
            },
            OrderError::AmountOverflow => Self::AmountOverflow,
            OrderError::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            OrderError::UnknownStatus(status) => Self::UnknownStatus(status),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_meaning() {
        let err: CheckoutError = StoreError::InsufficientStock {
            product_id: ProductId::new("P1"),
            requested: 3,
            available: 1,
        }
        .into();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                requested: 3,
                available: 1,
                ..
            }
        ));

        let err: CheckoutError = StoreError::DuplicatePayment("pay_1".to_string()).into();
        assert!(matches!(err, CheckoutError::PaymentAlreadySettled(ref txn) if txn == "pay_1"));

        let err: CheckoutError = StoreError::Unavailable("down".to_string()).into();
        assert!(matches!(err, CheckoutError::Store(_)));
    }

    #[test]
    fn test_order_errors_map_to_checkout_taxonomy() {
        assert!(matches!(
            CheckoutError::from(OrderError::NoItems),
            CheckoutError::EmptyCart
        ));
        assert!(matches!(
            CheckoutError::from(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            }),
            CheckoutError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            }
        ));
    }
}
