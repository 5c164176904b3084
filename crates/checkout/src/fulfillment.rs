//! Post-placement status changes.

use common::{BuyerId, OrderId, SellerId};
use domain::{Order, OrderStatus, ProductId};
use store::{Catalog, InventoryLedger, OrderRepository};

use crate::error::{CheckoutError, Result};

/// Drives orders through the fulfillment lifecycle.
///
/// Every write is a compare-and-set on the status that was checked, so two
/// actors racing on one order cannot both succeed.
pub struct FulfillmentService<S> {
    store: S,
}

impl<S> FulfillmentService<S>
where
    S: Catalog + OrderRepository + InventoryLedger,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Moves an order forward on behalf of a seller.
    ///
    /// The seller must own at least one product in the order, and only
    /// `Paid → Processing` and `Processing → Shipped` are allowed.
    #[tracing::instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        seller_id: SellerId,
        next: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        let order = self.load(order_id).await?;

        if !self.sells_into(&order, seller_id).await? {
            tracing::warn!(%order_id, %seller_id, "seller owns no item of the order");
            return Err(CheckoutError::UnauthorizedTransition(order_id));
        }

        if !order.status.seller_can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        self.swap_status(&order, next, notes).await
    }

    /// Cancels a `Pending` or `Paid` order for its buyer and gives the stock back.
    ///
    /// Refunding a paid order happens at the payment provider.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, buyer_id: BuyerId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if order.buyer_id != buyer_id {
            return Err(CheckoutError::UnauthorizedTransition(order_id));
        }

        if !order.status.can_cancel() {
            return Err(CheckoutError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }
        let cancelled = self
            .swap_status(&order, OrderStatus::Cancelled, None)
            .await?;

        for item in &cancelled.items {
            if let Err(err) = self.store.restore(&item.product_id, item.quantity).await {
                tracing::error!(
                    %order_id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %err,
                    "failed to restore stock for cancelled order"
                );
            }
        }

        Ok(cancelled)
    }

    /// Marks a shipped order as delivered for its buyer.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_delivery(&self, order_id: OrderId, buyer_id: BuyerId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if order.buyer_id != buyer_id {
            return Err(CheckoutError::UnauthorizedTransition(order_id));
        }

        let next = order.transition(OrderStatus::Delivered)?;
        self.swap_status(&order, next, None).await
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    async fn sells_into(&self, order: &Order, seller_id: SellerId) -> Result<bool> {
        let ids: Vec<ProductId> = order
            .items
            .iter()
            .map(|item| item.product_id.clone())
            .collect();
        let products = self.store.products(&ids).await?;
        Ok(products
            .iter()
            .any(|product| product.seller_id == seller_id))
    }

    async fn swap_status(
        &self,
        order: &Order,
        next: OrderStatus,
        notes: Option<String>,
    ) -> Result<Order> {
        match self
            .store
            .update_status(order.id, order.status, next, notes)
            .await?
        {
            Some(updated) => {
                metrics::counter!("order_status_transitions_total", "to" => next.as_str())
                    .increment(1);
                tracing::info!(order_id = %order.id, from = %order.status, to = %next, "order status changed");
                Ok(updated)
            }
            None => {
                // Someone else moved the order first; report against what it is now.
                let current = self.load(order.id).await?;
                Err(CheckoutError::InvalidTransition {
                    from: current.status,
                    to: next,
                })
            }
        }
    }
}
