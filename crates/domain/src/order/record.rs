//! The order record produced by checkout.

use chrono::{DateTime, Utc};
use common::{BuyerId, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};

use super::{
    LineItem, Money, OrderError, OrderItem, OrderStatus, PaymentReference, ShippingDetails,
};

/// A placed order with its line items.
///
/// `total_amount` is fixed at creation as the sum of the items' `unit_price *
/// quantity` and does not follow later catalog price changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
    pub shipping: ShippingDetails,
    pub total_amount: Money,
    pub external_payment_order_id: Option<String>,
    pub external_payment_transaction_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Returns the sum of the items' line totals.
    pub fn items_total(&self) -> Option<Money> {
        self.items.iter().try_fold(Money::zero(), |acc, item| {
            item.line_total().and_then(|line| acc.checked_add(line))
        })
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Checks `next` against the transition table and returns it if the edge is legal.
    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.status.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }
}

/// Builder for a not-yet-persisted order.
///
/// Validates the lines and computes the total once, so every `Order` it
/// produces satisfies `total_amount == items_total()`.
#[derive(Debug, Clone)]
pub struct NewOrder {
    buyer_id: BuyerId,
    shipping: ShippingDetails,
    lines: Vec<LineItem>,
    payment: Option<PaymentReference>,
}

impl NewOrder {
    pub fn new(buyer_id: BuyerId, shipping: ShippingDetails, lines: Vec<LineItem>) -> Self {
        Self {
            buyer_id,
            shipping,
            lines,
            payment: None,
        }
    }

    /// Marks the order as settled by the given payment. The order starts `Paid`.
    pub fn with_payment(mut self, payment: PaymentReference) -> Self {
        self.payment = Some(payment);
        self
    }

    /// Validates the lines and produces the order record.
    pub fn build(self) -> Result<Order, OrderError> {
        if self.lines.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut total = Money::zero();
        let mut items = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
            total = line
                .line_total()
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or(OrderError::AmountOverflow)?;
            items.push(OrderItem {
                id: OrderItemId::new(),
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        let (status, payment_order_id, payment_transaction_id) = match self.payment {
            Some(payment) => (
                OrderStatus::Paid,
                Some(payment.external_order_id),
                Some(payment.external_transaction_id),
            ),
            None => (OrderStatus::Pending, None, None),
        };

        Ok(Order {
            id: OrderId::new(),
            buyer_id: self.buyer_id,
            status,
            shipping: self.shipping,
            total_amount: total,
            external_payment_order_id: payment_order_id,
            external_payment_transaction_id: payment_transaction_id,
            notes: None,
            created_at: Utc::now(),
            items,
        })
    }
}
