//! Order placement with compensating rollback.

use std::time::Instant;

use common::BuyerId;
use domain::{NewOrder, Order, OrderItem, ShippingDetails};
use store::{CartStore, Catalog, InventoryLedger, OrderRepository, StoreError};

use crate::error::{CheckoutError, Result};
use crate::intents::VerifiedPayment;
use crate::resolver::{CartSnapshotResolver, RequestedItem, SnapshotSource};

/// Input of [`OrderPlacement::place_order`].
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub buyer_id: BuyerId,
    /// `None` snapshots the buyer's persisted cart.
    pub items: Option<Vec<RequestedItem>>,
    pub shipping: ShippingDetails,
    /// Present only after [`crate::PaymentIntents::settle`] accepted the payment.
    pub payment: Option<VerifiedPayment>,
}

/// The order write path.
///
/// Effects happen in this order: each line is reserved against the ledger in
/// snapshot order, the order and its items are inserted as one batch, and the
/// source cart is cleared. The order only becomes visible once every line is
/// reserved. If a reservation or the insert fails, every reservation that
/// already succeeded is restored before the error is returned, so a failed
/// placement leaves no order and no stock change.
pub struct OrderPlacement<S> {
    store: S,
    resolver: CartSnapshotResolver<S>,
}

impl<S> OrderPlacement<S>
where
    S: InventoryLedger + Catalog + CartStore + OrderRepository + Clone,
{
    pub fn new(store: S) -> Self {
        let resolver = CartSnapshotResolver::new(store.clone());
        Self { store, resolver }
    }

    /// Places an order for `request.buyer_id`.
    ///
    /// The order starts as `Paid` when a verified payment is attached and as
    /// `Pending` otherwise.
    #[tracing::instrument(
        skip(self, request),
        fields(buyer_id = %request.buyer_id, paid = request.payment.is_some())
    )]
    pub async fn place_order(&self, request: PlaceOrder) -> Result<Order> {
        let start = Instant::now();
        let PlaceOrder {
            buyer_id,
            items,
            shipping,
            payment,
        } = request;

        // 1. Resolve the snapshot. Nothing is written before this succeeds.
        let snapshot = self.resolver.resolve(buyer_id, items).await?;

        // 2. Build the order; totals are computed from the snapshot prices.
        let mut new_order = NewOrder::new(buyer_id, shipping, snapshot.lines);
        if let Some(payment) = payment {
            new_order = new_order.with_payment(payment.into_reference());
        }
        let order = new_order.build()?;

        // 3. Reserve stock. A failed line gives back the lines before it.
        if let Err(err) = self.reserve_all(&order.items).await {
            metrics::counter!("inventory_reservation_failures_total").increment(1);
            tracing::warn!(order_id = %order.id, error = %err, "reservation failed, rolled back");
            return Err(self.fail(start, err));
        }

        // 4. Persist order and items as one batch.
        if let Err(err) = self.store.insert_order(&order).await {
            tracing::warn!(order_id = %order.id, error = %err, "order insert failed, releasing stock");
            self.restore_reserved(&order.items).await;
            return Err(self.fail(start, err));
        }

        // 5. The order is committed. A leftover cart is harmless, so failing to
        //    clear it does not fail the request.
        if snapshot.source == SnapshotSource::Cart
            && let Err(err) = self.store.clear_cart(buyer_id).await
        {
            tracing::error!(order_id = %order.id, error = %err, "failed to clear cart after placement");
        }

        let duration = start.elapsed().as_secs_f64();
        metrics::histogram!("order_placement_duration_seconds").record(duration);
        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            total = %order.total_amount,
            quantity = order.total_quantity(),
            duration,
            "order placed"
        );

        Ok(order)
    }

    /// Reserves every line in order. On failure, the lines already reserved
    /// are restored before the error is returned.
    async fn reserve_all(&self, items: &[OrderItem]) -> std::result::Result<(), StoreError> {
        for (reserved, item) in items.iter().enumerate() {
            if let Err(err) = self.store.reserve(&item.product_id, item.quantity).await {
                self.restore_reserved(&items[..reserved]).await;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Gives back stock for `items`, in the order they were reserved.
    async fn restore_reserved(&self, items: &[OrderItem]) {
        for item in items {
            if let Err(err) = self.store.restore(&item.product_id, item.quantity).await {
                metrics::counter!("order_placement_compensation_failures_total").increment(1);
                tracing::error!(
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %err,
                    "failed to restore reserved stock"
                );
            }
        }
    }

    fn fail(&self, start: Instant, err: StoreError) -> CheckoutError {
        metrics::counter!("order_placement_rollbacks_total").increment(1);
        metrics::histogram!("order_placement_duration_seconds").record(start.elapsed().as_secs_f64());
        err.into()
    }
}
