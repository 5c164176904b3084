//! Payment gateway trait, HTTP client and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::Secret;
use domain::Money;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CheckoutError, Result};

/// A payment intent as acknowledged by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Provider-assigned order id the client pays against.
    pub external_payment_order_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
}

/// Trait for creating payment intents with an external provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers an intent for `amount` (minor units) with the provider.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent>;
}

/// Connection settings for [`HttpPaymentGateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub timeout: Duration,
}

/// Wire body of `POST /orders`.
#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Payment gateway reached over HTTPS with basic authentication.
///
/// The request timeout is set on the client, so no call can hold the
/// checkout path longer than `GatewayConfig::timeout`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(e.to_string()))?;
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self), fields(amount = amount.minor()))]
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent> {
        let response = self
            .client
            .post(self.url("/orders"))
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()))
            .json(&CreateOrderBody {
                amount: amount.minor(),
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| CheckoutError::gateway("TRANSPORT", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let created = response
                .json::<CreatedOrder>()
                .await
                .map_err(|e| CheckoutError::gateway("INVALID_RESPONSE", e.to_string()))?;
            tracing::debug!(external_order_id = %created.id, "payment intent created");
            return Ok(PaymentIntent {
                external_payment_order_id: created.id,
                amount: Money::from_minor(created.amount),
                currency: created.currency,
                receipt: created.receipt.unwrap_or_else(|| receipt.to_string()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::gateway("TRANSPORT", e.to_string()))?;
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (
                envelope
                    .error
                    .code
                    .unwrap_or_else(|| status.as_u16().to_string()),
                envelope.error.description.unwrap_or(body),
            ),
            Err(_) => (status.as_u16().to_string(), body),
        };
        tracing::warn!(%status, %code, "payment gateway rejected intent");
        Err(CheckoutError::Gateway { code, message })
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: Vec<PaymentIntent>,
    next_id: u32,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
    fail_on_create: Arc<AtomicBool>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory payment gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to reject intent creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of intents created so far.
    pub async fn intent_count(&self) -> usize {
        self.state.lock().await.intents.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(CheckoutError::gateway(
                "GATEWAY_UNAVAILABLE",
                "Payment provider unavailable",
            ));
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let intent = PaymentIntent {
            external_payment_order_id: format!("order_{:04}", state.next_id),
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        };
        state.intents.push(intent.clone());
        Ok(intent)
    }
}
