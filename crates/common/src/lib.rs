//! Types shared by every crate in the order settlement workspace.

mod secret;
mod types;

pub use secret::Secret;
pub use types::{BuyerId, OrderId, OrderItemId, SellerId};
