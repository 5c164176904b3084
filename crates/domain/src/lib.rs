//! Domain layer for order placement and fulfillment.
//!
//! This crate provides:
//! - `Money` and `ProductId` value objects
//! - The `Order` record with its `OrderItem`s, built through `NewOrder`
//! - The `OrderStatus` state machine with an explicit transition table

pub mod order;

pub use order::{
    LineItem, Money, NewOrder, Order, OrderError, OrderItem, OrderStatus, PaymentReference,
    ProductId, ShippingDetails,
};
