//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller did not identify itself.
    Unauthorized(String),
    /// Checkout service error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidAmount(_)
        | CheckoutError::InvalidQuantity { .. }
        | CheckoutError::AmountOverflow
        | CheckoutError::UnknownStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::PaymentNotAuthentic => (
            StatusCode::BAD_REQUEST,
            "Payment verification failed, please retry the payment".to_string(),
        ),
        CheckoutError::ProductNotFound(_) | CheckoutError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::InsufficientStock { .. }
        | CheckoutError::InvalidTransition { .. }
        | CheckoutError::PaymentAlreadySettled(_) => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::UnauthorizedTransition(_) => (StatusCode::FORBIDDEN, err.to_string()),
        CheckoutError::Gateway { code, message } => {
            tracing::warn!(%code, %message, "payment gateway error");
            (
                StatusCode::BAD_GATEWAY,
                format!("Payment provider error [{code}]"),
            )
        }
        CheckoutError::Store(_) | CheckoutError::Configuration(_) => {
            tracing::error!(error = %err, "checkout failed unexpectedly");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(err.into())
    }
}
