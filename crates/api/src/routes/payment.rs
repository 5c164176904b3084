//! Payment intent endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use checkout::PaymentIntent;
use domain::Money;
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::error::ApiError;
use crate::{AppState, Backend};

#[derive(Deserialize)]
pub struct CreateIntentRequest {
    /// Minor units.
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub receipt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub external_payment_order_id: String,
    pub external_payment_transaction_id: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub success: bool,
}

/// POST /payment/create-order: register an intent with the provider.
#[tracing::instrument(skip(state, body))]
pub async fn create_order<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let req = json_body(body)?;
    let intent = state
        .intents
        .create_intent(
            Money::from_minor(req.amount),
            req.currency.as_deref(),
            &req.receipt,
        )
        .await?;
    Ok(Json(intent))
}

/// POST /payment/verify: check a completion signature.
#[tracing::instrument(skip(state, body))]
pub async fn verify<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let req = json_body(body)?;
    let result = state.intents.verify_completion(
        &req.external_payment_order_id,
        &req.external_payment_transaction_id,
        &req.signature,
    );
    Ok(Json(VerifyResponse {
        success: result.is_authentic(),
    }))
}
