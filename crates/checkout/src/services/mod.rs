//! External service adapters used by checkout.

pub mod payment;

pub use payment::{
    GatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, PaymentIntent,
};
