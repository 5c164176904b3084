//! Persistence for checkout: the inventory ledger, catalog and cart reads,
//! and durable order records.
//!
//! Each concern is an async trait in [`store`]. [`InMemoryStore`] and
//! [`PostgresStore`] implement all of them and are handed to the checkout
//! services by their constructors. Nothing here holds a global connection.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CartLine, CartStore, Catalog, InventoryLedger, OrderRepository, Product};
