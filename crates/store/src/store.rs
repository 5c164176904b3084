use async_trait::async_trait;
use common::{BuyerId, OrderId, SellerId};
use domain::{Money, Order, OrderStatus, ProductId};

use crate::Result;

/// A catalog entry as seen by checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current list price. Orders copy it at placement time.
    pub price: Money,
    pub stock: u32,
    /// Seller-of-record, the only seller allowed to fulfill lines for this product.
    pub seller_id: SellerId,
}

/// A persisted cart row, keyed by `(buyer_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub buyer_id: BuyerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Per-product available quantity.
///
/// Both operations must be atomic at the storage layer: `reserve` is a single
/// conditional decrement ("subtract `quantity` only if stock >= `quantity`"),
/// never a read followed by a separate write. Concurrent reservations that
/// together exceed the stock must see exactly the first ones succeed, and stock
/// can never go negative.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Decrements stock by `quantity`.
    ///
    /// Fails with `InsufficientStock` if less than `quantity` is available and
    /// with `ProductNotFound` if the product is unknown. Stock is unchanged on failure.
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// Compensating increment for a reservation that has to be undone.
    async fn restore(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// Returns the available stock, or `None` for an unknown product.
    async fn stock(&self, product_id: &ProductId) -> Result<Option<u32>>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a single product.
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Looks up several products. Unknown ids are skipped; order is unspecified.
    async fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Returns the current unit price and stock of a product.
    async fn unit_price_and_stock(&self, product_id: &ProductId) -> Result<Option<(Money, u32)>> {
        Ok(self
            .product(product_id)
            .await?
            .map(|product| (product.price, product.stock)))
    }
}

/// The buyer's persisted cart.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the buyer's cart lines in the order they were added.
    async fn cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>>;

    /// Deletes every cart line of the buyer. Returns the number of rows removed.
    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<u64>;
}

/// Durable order records.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order and all of its items as one atomic batch.
    ///
    /// Fails with `DuplicatePayment` if another order already carries the same
    /// external payment transaction id.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Loads an order with its items.
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Loads all orders of a buyer with their items, newest first.
    async fn orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>>;

    /// Compare-and-set status update.
    ///
    /// Moves the order to `next` only if it is still in `expected`, storing
    /// `notes` when given. Returns the updated order, or `None` if the order
    /// was not in `expected` any more (or does not exist).
    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<String>,
    ) -> Result<Option<Order>>;
}
