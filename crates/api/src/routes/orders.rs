//! Buyer-facing order endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{PaymentDetails, PlaceOrder, RequestedItem};
use common::{BuyerId, OrderId};
use domain::{Money, Order, ProductId, ShippingDetails};
use serde::{Deserialize, Serialize};
use store::{Catalog, OrderRepository, Product};

use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::{AppState, Backend};

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    /// Omitted to check out the persisted cart.
    #[serde(default)]
    pub items: Option<Vec<OrderItemRequest>>,
    pub shipping_details: ShippingDetails,
    #[serde(default)]
    pub payment_details: Option<PaymentDetailsRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    /// Display price in minor units. Compared with the catalog, never charged.
    #[serde(default)]
    pub price: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsRequest {
    pub external_payment_order_id: String,
    pub external_payment_transaction_id: String,
    #[serde(default)]
    pub signature: String,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub status: String,
    pub shipping_details: ShippingDetails,
    pub total_amount: i64,
    pub external_payment_order_id: Option<String>,
    pub external_payment_transaction_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

/// The minimal product fields shown next to an order line.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_id: String,
    pub name: String,
    pub price: i64,
}

impl OrderResponse {
    pub(crate) fn from_order(order: Order, catalog: &HashMap<ProductId, Product>) -> Self {
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItemResponse {
                id: item.id.to_string(),
                product: catalog.get(&item.product_id).map(|product| ProductSummary {
                    product_id: product.id.to_string(),
                    name: product.name.clone(),
                    price: product.price.minor(),
                }),
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
                unit_price: item.unit_price.minor(),
            })
            .collect();

        Self {
            id: order.id.to_string(),
            buyer_id: order.buyer_id.to_string(),
            status: order.status.to_string(),
            shipping_details: order.shipping,
            total_amount: order.total_amount.minor(),
            external_payment_order_id: order.external_payment_order_id,
            external_payment_transaction_id: order.external_payment_transaction_id,
            notes: order.notes,
            created_at: order.created_at.to_rfc3339(),
            items,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self::from_order(order, &HashMap::new())
    }
}

// -- Handlers --

/// POST /orders/place/{buyer_id}: verify the payment (if any) and place the order.
#[tracing::instrument(skip(state, body))]
pub async fn place<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(buyer_id): Path<String>,
    body: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let buyer_id: BuyerId = parse_id(&buyer_id, "buyer id")?;
    let req = json_body(body)?;

    let payment = match req.payment_details {
        Some(details) => Some(state.intents.settle(PaymentDetails {
            external_payment_order_id: details.external_payment_order_id,
            external_payment_transaction_id: details.external_payment_transaction_id,
            signature: details.signature,
        })?),
        None => None,
    };

    let items = req.items.map(|items| {
        items
            .into_iter()
            .map(|item| {
                let requested = RequestedItem::new(item.product_id, item.quantity);
                match item.price {
                    Some(price) => requested.with_client_price(Money::from_minor(price)),
                    None => requested,
                }
            })
            .collect()
    });

    let command = PlaceOrder {
        buyer_id,
        items,
        shipping: req.shipping_details,
        payment,
    };

    // Placement runs on its own task so a dropped connection cannot stop it
    // between reservation and rollback.
    let task_state = state.clone();
    let order = tokio::spawn(async move { task_state.placement.place_order(command).await })
        .await
        .map_err(|e| ApiError::Internal(format!("order placement task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/user/{buyer_id}: list a buyer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_buyer<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(buyer_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let buyer_id: BuyerId = parse_id(&buyer_id, "buyer id")?;
    let orders = state.store.orders_for_buyer(buyer_id).await?;

    let mut ids: Vec<ProductId> = orders
        .iter()
        .flat_map(|order| order.items.iter().map(|item| item.product_id.clone()))
        .collect();
    ids.sort();
    ids.dedup();
    let catalog: HashMap<ProductId, Product> = state
        .store
        .products(&ids)
        .await?
        .into_iter()
        .map(|product| (product.id.clone(), product))
        .collect();

    Ok(Json(
        orders
            .into_iter()
            .map(|order| OrderResponse::from_order(order, &catalog))
            .collect(),
    ))
}

/// GET /orders/{order_id}: load one order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id: OrderId = parse_id(&order_id, "order id")?;
    let order = state
        .store
        .order(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))?;

    Ok(Json(order.into()))
}

/// POST /orders/{order_id}/cancel/{buyer_id}: cancel before fulfillment starts.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path((order_id, buyer_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&order_id, "order id")?;
    let buyer_id: BuyerId = parse_id(&buyer_id, "buyer id")?;

    let order = state.fulfillment.cancel_order(order_id, buyer_id).await?;
    Ok(Json(order.into()))
}

/// POST /orders/{order_id}/delivered/{buyer_id}: buyer confirms receipt.
#[tracing::instrument(skip(state))]
pub async fn delivered<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path((order_id, buyer_id)): Path<(String, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&order_id, "order id")?;
    let buyer_id: BuyerId = parse_id(&buyer_id, "buyer id")?;

    let order = state
        .fulfillment
        .confirm_delivery(order_id, buyer_id)
        .await?;
    Ok(Json(order.into()))
}
