//! Seller fulfillment endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use checkout::CheckoutError;
use common::{OrderId, SellerId};
use domain::OrderStatus;
use serde::Deserialize;

use super::orders::OrderResponse;
use super::{json_body, parse_id};
use crate::error::ApiError;
use crate::{AppState, Backend};

/// Header carrying the caller identity, set by the upstream identity layer.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn acting_seller(headers: &HeaderMap) -> Result<SellerId, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))?;
    raw.parse()
        .map_err(|_| ApiError::Unauthorized(format!("Malformed {USER_ID_HEADER} header")))
}

/// PUT /seller/orders/{order_id}/status: advance an order the seller sells into.
#[tracing::instrument(skip(state, headers, body))]
pub async fn update_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let seller_id = acting_seller(&headers)?;
    let order_id: OrderId = parse_id(&order_id, "order id")?;
    let req = json_body(body)?;
    let next: OrderStatus = req.status.parse().map_err(CheckoutError::from)?;

    let order = state
        .fulfillment
        .update_status(order_id, seller_id, next, req.notes)
        .await?;
    Ok(Json(order.into()))
}
