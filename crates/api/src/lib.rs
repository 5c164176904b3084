//! HTTP API for order placement, payment settlement and fulfillment.
//!
//! Provides REST endpoints for checkout and seller fulfillment, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CheckoutError, FulfillmentService, GatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway,
    OrderPlacement, PaymentGateway, PaymentIntents, SignatureVerifier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartStore, Catalog, InventoryLedger, OrderRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Everything a storage backend must provide to serve the API.
pub trait Backend:
    InventoryLedger + Catalog + CartStore + OrderRepository + Clone + Send + Sync + 'static
{
}

impl<T> Backend for T where
    T: InventoryLedger + Catalog + CartStore + OrderRepository + Clone + Send + Sync + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub placement: OrderPlacement<S>,
    pub fulfillment: FulfillmentService<S>,
    pub intents: PaymentIntents,
}

impl<S: Backend> AppState<S> {
    /// Wires the checkout services over one store handle.
    pub fn new(store: S, intents: PaymentIntents) -> Self {
        Self {
            placement: OrderPlacement::new(store.clone()),
            fulfillment: FulfillmentService::new(store.clone()),
            store,
            intents,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/orders/place/{buyer_id}", post(routes::orders::place::<S>))
        .route(
            "/orders/user/{buyer_id}",
            get(routes::orders::list_for_buyer::<S>),
        )
        .route("/orders/{order_id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{order_id}/cancel/{buyer_id}",
            post(routes::orders::cancel::<S>),
        )
        .route(
            "/orders/{order_id}/delivered/{buyer_id}",
            post(routes::orders::delivered::<S>),
        )
        .route(
            "/payment/create-order",
            post(routes::payment::create_order::<S>),
        )
        .route("/payment/verify", post(routes::payment::verify::<S>))
        .route(
            "/seller/orders/{order_id}/status",
            put(routes::seller::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the payment side from configuration.
///
/// Without `PAYMENT_GATEWAY_URL` an in-memory gateway stands in for the provider.
/// A missing or blank `PAYMENT_KEY_SECRET` is a configuration error.
pub fn create_intents(config: &Config) -> Result<PaymentIntents, CheckoutError> {
    let verifier = SignatureVerifier::new(&config.payment_key_secret)?;
    let gateway: Arc<dyn PaymentGateway> = match &config.payment_gateway_url {
        Some(base_url) => Arc::new(HttpPaymentGateway::new(GatewayConfig {
            base_url: base_url.clone(),
            key_id: config.payment_key_id.clone(),
            key_secret: config.payment_key_secret.clone(),
            timeout: config.payment_gateway_timeout,
        })?),
        None => {
            tracing::warn!("PAYMENT_GATEWAY_URL not set, using in-memory payment gateway");
            Arc::new(InMemoryPaymentGateway::new())
        }
    };

    Ok(PaymentIntents::new(
        gateway,
        verifier,
        config.payment_currency.clone(),
    ))
}
