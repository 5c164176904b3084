use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{BuyerId, OrderId};
use domain::{Order, OrderStatus, ProductId};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{CartLine, CartStore, Catalog, InventoryLedger, OrderRepository, Product},
};

/// In-memory store implementation for tests and local runs.
///
/// Implements every storage trait over shared state, so the catalog, the
/// ledger and the order repository see each other's writes. Stock mutation
/// happens under a single write lock, which makes `reserve` an atomic
/// check-and-decrement.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
    carts: Arc<RwLock<HashMap<BuyerId, Vec<CartLine>>>>,
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    fail_on_insert: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog entry.
    pub async fn put_product(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    /// Adds `quantity` of a product to the buyer's cart.
    pub async fn add_to_cart(&self, buyer_id: BuyerId, product_id: ProductId, quantity: u32) {
        let mut carts = self.carts.write().await;
        let lines = carts.entry(buyer_id).or_default();
        match lines.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => lines.push(CartLine {
                buyer_id,
                product_id,
                quantity,
            }),
        }
    }

    /// Makes the next order inserts fail as if the database were down.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the total number of order items across all orders.
    pub async fn order_item_count(&self) -> usize {
        self.orders
            .read()
            .await
            .values()
            .map(|order| order.items.len())
            .sum()
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn reserve(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(())
    }

    async fn restore(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut products = self.products.write().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| StoreError::Corrupt(format!("stock overflow for {product_id}")))?;
        Ok(())
    }

    async fn stock(&self, product_id: &ProductId) -> Result<Option<u32>> {
        Ok(self
            .products
            .read()
            .await
            .get(product_id)
            .map(|product| product.stock))
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(product_id).cloned())
    }

    async fn products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| products.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn cart_lines(&self, buyer_id: BuyerId) -> Result<Vec<CartLine>> {
        Ok(self
            .carts
            .read()
            .await
            .get(&buyer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_cart(&self, buyer_id: BuyerId) -> Result<u64> {
        let removed = self.carts.write().await.remove(&buyer_id);
        Ok(removed.map_or(0, |lines| lines.len() as u64))
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        if self.fail_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order insert failed".to_string()));
        }

        let mut orders = self.orders.write().await;
        if let Some(txn) = &order.external_payment_transaction_id
            && orders
                .values()
                .any(|o| o.external_payment_transaction_id.as_ref() == Some(txn))
        {
            return Err(StoreError::DuplicatePayment(txn.clone()));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn orders_for_buyer(&self, buyer_id: BuyerId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|order| order.buyer_id == buyer_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        notes: Option<String>,
    ) -> Result<Option<Order>> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order_id) {
            Some(order) if order.status == expected => {
                order.status = next;
                if notes.is_some() {
                    order.notes = notes;
                }
                Ok(Some(order.clone()))
            }
            _ => Ok(None),
        }
    }
}
