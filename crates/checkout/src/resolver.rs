//! Cart snapshot resolution.
//!
//! Turns either an explicit item list or the buyer's persisted cart into the
//! ordered `LineItem`s an order is built from. Prices always come from the
//! catalog; a caller-supplied price is only compared and logged.

use std::collections::HashMap;

use common::BuyerId;
use domain::{LineItem, Money, ProductId};
use store::{CartStore, Catalog};

use crate::error::{CheckoutError, Result};

/// One line of an explicit checkout request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price the client displayed. Untrusted.
    pub client_price: Option<Money>,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            client_price: None,
        }
    }

    pub fn with_client_price(mut self, price: Money) -> Self {
        self.client_price = Some(price);
        self
    }
}

/// Where a snapshot's lines came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The buyer's persisted cart. Cleared once the order is placed.
    Cart,
    /// An explicit list sent with the checkout request.
    Explicit,
}

/// A non-empty, priced list of lines ready to become an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub source: SnapshotSource,
    pub lines: Vec<LineItem>,
}

/// Read-only resolver over the catalog and the cart store.
#[derive(Clone)]
pub struct CartSnapshotResolver<S> {
    store: S,
}

impl<S> CartSnapshotResolver<S>
where
    S: Catalog + CartStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolves the lines for `buyer_id`.
    ///
    /// `Some(items)` takes the explicit path, `None` reads the persisted cart.
    #[tracing::instrument(skip(self, items), fields(explicit = items.is_some()))]
    pub async fn resolve(
        &self,
        buyer_id: BuyerId,
        items: Option<Vec<RequestedItem>>,
    ) -> Result<CartSnapshot> {
        match items {
            Some(items) => self.resolve_explicit(items).await,
            None => self.resolve_cart(buyer_id).await,
        }
    }

    async fn resolve_explicit(&self, items: Vec<RequestedItem>) -> Result<CartSnapshot> {
        let requested = merge_requested(items)?;
        if requested.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut lines = Vec::with_capacity(requested.len());
        for item in requested {
            let (price, _stock) = self
                .store
                .unit_price_and_stock(&item.product_id)
                .await?
                .ok_or_else(|| CheckoutError::ProductNotFound(item.product_id.clone()))?;

            if let Some(client_price) = item.client_price
                && client_price != price
            {
                tracing::debug!(
                    product_id = %item.product_id,
                    %client_price,
                    catalog_price = %price,
                    "ignoring client-supplied price"
                );
            }

            lines.push(LineItem::new(item.product_id, item.quantity, price));
        }

        Ok(CartSnapshot {
            source: SnapshotSource::Explicit,
            lines,
        })
    }

    async fn resolve_cart(&self, buyer_id: BuyerId) -> Result<CartSnapshot> {
        let cart = self.store.cart_lines(buyer_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.iter().map(|line| line.product_id.clone()).collect();
        let prices: HashMap<ProductId, Money> = self
            .store
            .products(&ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product.price))
            .collect();

        let lines = cart
            .into_iter()
            .map(|line| {
                if line.quantity == 0 {
                    return Err(CheckoutError::InvalidQuantity {
                        product_id: line.product_id,
                        quantity: line.quantity,
                    });
                }
                let price = prices
                    .get(&line.product_id)
                    .copied()
                    .ok_or_else(|| CheckoutError::ProductNotFound(line.product_id.clone()))?;
                Ok(LineItem::new(line.product_id, line.quantity, price))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CartSnapshot {
            source: SnapshotSource::Cart,
            lines,
        })
    }
}

/// Validates quantities and folds repeated products into one line, keeping
/// the position of the first occurrence.
fn merge_requested(items: Vec<RequestedItem>) -> Result<Vec<RequestedItem>> {
    let mut merged: Vec<RequestedItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: item.product_id,
                quantity: 0,
            });
        }
        match merged
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| CheckoutError::InvalidQuantity {
                        product_id: item.product_id.clone(),
                        quantity: item.quantity,
                    })?;
            }
            None => merged.push(item),
        }
    }
    Ok(merged)
}
