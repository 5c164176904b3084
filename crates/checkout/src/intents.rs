//! Payment intent creation and settlement.

use std::sync::Arc;

use domain::{Money, PaymentReference};

use crate::error::{CheckoutError, Result};
use crate::services::payment::{PaymentGateway, PaymentIntent};
use crate::verification::{SignatureVerifier, Verification};

/// Completion proof sent back by the client after paying out-of-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub external_payment_order_id: String,
    pub external_payment_transaction_id: String,
    pub signature: String,
}

/// Proof that a payment completion was verified.
///
/// Only [`PaymentIntents::settle`] can produce one, which is what makes
/// "placed as Paid" imply "signature checked".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    external_order_id: String,
    external_transaction_id: String,
}

impl VerifiedPayment {
    pub fn external_order_id(&self) -> &str {
        &self.external_order_id
    }

    pub fn external_transaction_id(&self) -> &str {
        &self.external_transaction_id
    }

    pub(crate) fn into_reference(self) -> PaymentReference {
        PaymentReference {
            external_order_id: self.external_order_id,
            external_transaction_id: self.external_transaction_id,
        }
    }
}

/// Creates intents with the provider and verifies their completion.
#[derive(Clone)]
pub struct PaymentIntents {
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    default_currency: String,
}

impl PaymentIntents {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            verifier,
            default_currency: default_currency.into(),
        }
    }

    /// Registers an intent for `amount` with the provider.
    ///
    /// Falls back to the configured currency when `currency` is `None`.
    #[tracing::instrument(skip(self), fields(amount = amount.minor()))]
    pub async fn create_intent(
        &self,
        amount: Money,
        currency: Option<&str>,
        receipt: &str,
    ) -> Result<PaymentIntent> {
        if !amount.is_positive() {
            return Err(CheckoutError::InvalidAmount(amount.minor()));
        }

        let currency = currency.unwrap_or(&self.default_currency);
        let intent = self.gateway.create_order(amount, currency, receipt).await?;

        metrics::counter!("payment_intents_created_total").increment(1);
        tracing::info!(
            external_order_id = %intent.external_payment_order_id,
            "payment intent created"
        );
        Ok(intent)
    }

    /// Checks the completion signature for an intent.
    #[tracing::instrument(skip(self, signature))]
    pub fn verify_completion(
        &self,
        external_payment_order_id: &str,
        external_payment_transaction_id: &str,
        signature: &str,
    ) -> Verification {
        let result = self.verifier.verify(
            external_payment_order_id,
            external_payment_transaction_id,
            signature,
        );

        metrics::counter!("payment_verifications_total", "result" => result.as_str())
            .increment(1);
        if !result.is_authentic() {
            tracing::warn!("payment signature mismatch");
        }
        result
    }

    /// Verifies `details` and hands out the token placement needs.
    pub fn settle(&self, details: PaymentDetails) -> Result<VerifiedPayment> {
        match self.verify_completion(
            &details.external_payment_order_id,
            &details.external_payment_transaction_id,
            &details.signature,
        ) {
            Verification::Authentic => Ok(VerifiedPayment {
                external_order_id: details.external_payment_order_id,
                external_transaction_id: details.external_payment_transaction_id,
            }),
            Verification::Inauthentic => Err(CheckoutError::PaymentNotAuthentic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payment::InMemoryPaymentGateway;
    use common::Secret;

    fn intents(gateway: InMemoryPaymentGateway) -> (PaymentIntents, SignatureVerifier) {
        let verifier = SignatureVerifier::new(&Secret::new("secret".to_string())).unwrap();
        (
            PaymentIntents::new(Arc::new(gateway), verifier.clone(), "INR"),
            verifier,
        )
    }

    #[tokio::test]
    async fn test_create_intent_uses_default_currency() {
        let gateway = InMemoryPaymentGateway::new();
        let (intents, _) = intents(gateway.clone());

        let intent = intents
            .create_intent(Money::from_minor(1500), None, "rcpt-1")
            .await
            .unwrap();

        assert_eq!(intent.currency, "INR");
        assert_eq!(intent.amount, Money::from_minor(1500));
        assert_eq!(gateway.intent_count().await, 1);
    }

    #[tokio::test]
    async fn test_non_positive_amount_never_reaches_gateway() {
        let gateway = InMemoryPaymentGateway::new();
        let (intents, _) = intents(gateway.clone());

        for amount in [0, -100] {
            let result = intents
                .create_intent(Money::from_minor(amount), Some("USD"), "rcpt")
                .await;
            assert!(matches!(result, Err(CheckoutError::InvalidAmount(a)) if a == amount));
        }
        assert_eq!(gateway.intent_count().await, 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_surfaced() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(true);
        let (intents, _) = intents(gateway);

        let result = intents
            .create_intent(Money::from_minor(100), None, "rcpt")
            .await;
        assert!(matches!(result, Err(CheckoutError::Gateway { .. })));
    }

    #[test]
    fn test_settle_authentic() {
        let (intents, verifier) = intents(InMemoryPaymentGateway::new());
        let signature = verifier.sign("order_0001", "pay_1");

        let verified = intents
            .settle(PaymentDetails {
                external_payment_order_id: "order_0001".to_string(),
                external_payment_transaction_id: "pay_1".to_string(),
                signature,
            })
            .unwrap();

        assert_eq!(verified.external_order_id(), "order_0001");
        assert_eq!(verified.external_transaction_id(), "pay_1");
    }

    #[test]
    fn test_settle_forged() {
        let (intents, _) = intents(InMemoryPaymentGateway::new());

        let result = intents.settle(PaymentDetails {
            external_payment_order_id: "order_0001".to_string(),
            external_payment_transaction_id: "pay_1".to_string(),
            signature: "00".repeat(32),
        });
        assert!(matches!(result, Err(CheckoutError::PaymentNotAuthentic)));
    }
}
