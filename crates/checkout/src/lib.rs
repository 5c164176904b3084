//! Order placement, payment settlement and fulfillment.
//!
//! The checkout flow is:
//! 1. [`PaymentIntents::create_intent`] registers an intent with the provider
//! 2. The client pays out-of-band and comes back with a signature
//! 3. [`PaymentIntents::settle`] verifies it and yields a [`VerifiedPayment`]
//! 4. [`OrderPlacement::place_order`] persists the order and reserves stock,
//!    rolling back on any reservation failure
//! 5. [`FulfillmentService`] moves the order along as sellers and buyers act
//!
//! Every service receives its store handle through its constructor.

pub mod error;
pub mod fulfillment;
pub mod intents;
pub mod placement;
pub mod resolver;
pub mod services;
pub mod verification;

pub use error::{CheckoutError, Result};
pub use fulfillment::FulfillmentService;
pub use intents::{PaymentDetails, PaymentIntents, VerifiedPayment};
pub use placement::{OrderPlacement, PlaceOrder};
pub use resolver::{CartSnapshot, CartSnapshotResolver, RequestedItem, SnapshotSource};
pub use services::{
    GatewayConfig, HttpPaymentGateway, InMemoryPaymentGateway, PaymentGateway, PaymentIntent,
};
pub use verification::{SignatureVerifier, Verification};
