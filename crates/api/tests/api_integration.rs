//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{CheckoutError, InMemoryPaymentGateway, PaymentIntents, SignatureVerifier};
use common::{BuyerId, OrderId, Secret, SellerId};
use domain::{Money, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{InMemoryStore, InventoryLedger, Product};
use tower::ServiceExt;

const KEY_SECRET: &str = "api_test_secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    seller: SellerId,
    provider_signer: SignatureVerifier,
}

impl TestApp {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let seller = SellerId::new();
        for (id, price, stock) in [("P1", 100, 5), ("P2", 300, 1)] {
            store
                .put_product(Product {
                    id: ProductId::new(id),
                    name: format!("Product {id}"),
                    price: Money::from_minor(price),
                    stock,
                    seller_id: seller,
                })
                .await;
        }

        let secret = Secret::new(KEY_SECRET.to_string());
        let intents = PaymentIntents::new(
            Arc::new(InMemoryPaymentGateway::new()),
            SignatureVerifier::new(&secret).unwrap(),
            "INR",
        );
        let state = Arc::new(AppState::new(store.clone(), intents));

        Self {
            app: api::create_app(state, get_metrics_handle()),
            store,
            seller,
            provider_signer: SignatureVerifier::new(&secret).unwrap(),
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        user_id: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn stock(&self, id: &str) -> u32 {
        self.store
            .stock(&ProductId::new(id))
            .await
            .unwrap()
            .unwrap()
    }

    /// Creates an intent, signs it like the provider would, and places the order.
    async fn place_paid(&self, buyer_id: BuyerId, items: Value) -> (StatusCode, Value) {
        let (status, intent) = self
            .send(
                "POST",
                "/payment/create-order",
                Some(json!({ "amount": 200, "receipt": "rcpt_1" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let external_order_id = intent["externalPaymentOrderId"].as_str().unwrap();
        let txn_id = format!("pay_{external_order_id}");
        let signature = self.provider_signer.sign(external_order_id, &txn_id);

        self.send(
            "POST",
            &format!("/orders/place/{buyer_id}"),
            Some(json!({
                "items": items,
                "shippingDetails": shipping(),
                "paymentDetails": {
                    "externalPaymentOrderId": external_order_id,
                    "externalPaymentTransactionId": txn_id,
                    "signature": signature,
                },
            })),
            None,
        )
        .await
    }
}

fn shipping() -> Value {
    json!({
        "address": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "zip": "62701",
        "phone": "5550100",
    })
}

#[test]
fn test_startup_requires_payment_key_secret() {
    let missing = api::config::Config::from_lookup(|_| None);
    assert!(matches!(
        api::create_intents(&missing),
        Err(CheckoutError::Configuration(_))
    ));

    let blank = api::config::Config::from_lookup(|key| {
        (key == "PAYMENT_KEY_SECRET").then(|| "  ".to_string())
    });
    assert!(api::create_intents(&blank).is_err());

    let configured = api::config::Config::from_lookup(|key| {
        (key == "PAYMENT_KEY_SECRET").then(|| KEY_SECRET.to_string())
    });
    let intents = api::create_intents(&configured).unwrap();
    let forged = SignatureVerifier::new(&Secret::new("guess".to_string()))
        .unwrap()
        .sign("order_x", "pay_forged");
    assert!(
        !intents
            .verify_completion("order_x", "pay_forged", &forged)
            .is_authentic()
    );
}

#[tokio::test]
async fn test_health_check() {
    let test = TestApp::new().await;

    let (status, json) = test.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let test = TestApp::new().await;

    let response = test
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_place_order_from_explicit_items() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({
                "items": [{ "productId": "P1", "quantity": 2, "price": 100 }],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["buyerId"], buyer.to_string());
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["totalAmount"], 200);
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
    assert_eq!(json["items"][0]["productId"], "P1");
    assert_eq!(json["items"][0]["unitPrice"], 100);
    assert_eq!(json["shippingDetails"]["city"], "Springfield");
    assert_eq!(test.stock("P1").await, 3);
}

#[tokio::test]
async fn test_place_order_charges_catalog_price() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({
                "items": [{ "productId": "P1", "quantity": 1, "price": 1 }],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["totalAmount"], 100);
}

#[tokio::test]
async fn test_place_order_from_cart_clears_it() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();
    test.store
        .add_to_cart(buyer, ProductId::new("P1"), 1)
        .await;
    test.store
        .add_to_cart(buyer, ProductId::new("P2"), 1)
        .await;

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({ "shippingDetails": shipping() })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["totalAmount"], 400);

    // Nothing left to check out.
    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({ "shippingDetails": shipping() })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_place_order_with_empty_cart() {
    let test = TestApp::new().await;

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({ "shippingDetails": shipping() })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back() {
    let test = TestApp::new().await;

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({
                "items": [
                    { "productId": "P1", "quantity": 2 },
                    { "productId": "P2", "quantity": 2 },
                ],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["message"].as_str().unwrap().contains("P2"));
    assert_eq!(test.stock("P1").await, 5);
    assert_eq!(test.stock("P2").await, 1);
    assert_eq!(test.store.order_count().await, 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let test = TestApp::new().await;

    let (status, _) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({
                "items": [{ "productId": "NOPE", "quantity": 1 }],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_and_buyer_id() {
    let test = TestApp::new().await;

    let (status, json) = test
        .send("POST", "/orders/place/not-a-uuid", Some(json!({})), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].as_str().unwrap().contains("buyer id"));

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({ "items": "nope" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_payment_create_and_verify() {
    let test = TestApp::new().await;

    let (status, intent) = test
        .send(
            "POST",
            "/payment/create-order",
            Some(json!({ "amount": 500, "receipt": "rcpt_7" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 500);
    assert_eq!(intent["currency"], "INR");
    assert_eq!(intent["receipt"], "rcpt_7");
    let external_order_id = intent["externalPaymentOrderId"].as_str().unwrap();

    let signature = test.provider_signer.sign(external_order_id, "pay_1");
    let (status, json) = test
        .send(
            "POST",
            "/payment/verify",
            Some(json!({
                "externalPaymentOrderId": external_order_id,
                "externalPaymentTransactionId": "pay_1",
                "signature": signature,
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = test
        .send(
            "POST",
            "/payment/verify",
            Some(json!({
                "externalPaymentOrderId": external_order_id,
                "externalPaymentTransactionId": "pay_2",
                "signature": signature,
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_create_intent_rejects_non_positive_amount() {
    let test = TestApp::new().await;

    let (status, _) = test
        .send(
            "POST",
            "/payment/create-order",
            Some(json!({ "amount": 0, "receipt": "r" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paid_placement_and_replay() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();
    let items = json!([{ "productId": "P1", "quantity": 2 }]);

    let (status, json) = test.place_paid(buyer, items.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "Paid");
    assert!(json["externalPaymentTransactionId"].is_string());

    // Replaying the same payment must not create a second order.
    let order_id = json["externalPaymentOrderId"].as_str().unwrap().to_string();
    let txn_id = json["externalPaymentTransactionId"]
        .as_str()
        .unwrap()
        .to_string();
    let (status, _) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({
                "items": items,
                "shippingDetails": shipping(),
                "paymentDetails": {
                    "externalPaymentOrderId": order_id,
                    "externalPaymentTransactionId": txn_id,
                    "signature": test.provider_signer.sign(&order_id, &txn_id),
                },
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(test.store.order_count().await, 1);
    assert_eq!(test.stock("P1").await, 3);
}

#[tokio::test]
async fn test_forged_signature_places_nothing() {
    let test = TestApp::new().await;

    let (status, json) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({
                "items": [{ "productId": "P1", "quantity": 1 }],
                "shippingDetails": shipping(),
                "paymentDetails": {
                    "externalPaymentOrderId": "order_0001",
                    "externalPaymentTransactionId": "pay_1",
                    "signature": "00".repeat(32),
                },
            })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "Payment verification failed, please retry the payment"
    );
    assert_eq!(test.store.order_count().await, 0);
    assert_eq!(test.stock("P1").await, 5);
}

#[tokio::test]
async fn test_seller_status_updates() {
    let test = TestApp::new().await;
    let (_, placed) = test
        .place_paid(BuyerId::new(), json!([{ "productId": "P1", "quantity": 1 }]))
        .await;
    let uri = format!("/seller/orders/{}/status", placed["id"].as_str().unwrap());
    let seller = test.seller.to_string();

    let (status, _) = test
        .send("PUT", &uri, Some(json!({ "status": "Processing" })), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = test
        .send(
            "PUT",
            &uri,
            Some(json!({ "status": "Processing" })),
            Some("not-a-uuid"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = SellerId::new().to_string();
    let (status, _) = test
        .send(
            "PUT",
            &uri,
            Some(json!({ "status": "Processing" })),
            Some(&stranger),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = test
        .send(
            "PUT",
            &uri,
            Some(json!({ "status": "Delivered" })),
            Some(&seller),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = test
        .send("PUT", &uri, Some(json!({ "status": "Lost" })), Some(&seller))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = test
        .send(
            "PUT",
            &uri,
            Some(json!({ "status": "Processing", "notes": "packing" })),
            Some(&seller),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Processing");
    assert_eq!(json["notes"], "packing");
}

#[tokio::test]
async fn test_list_orders_for_buyer_includes_products() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();
    for product in ["P1", "P2"] {
        let (status, _) = test
            .send(
                "POST",
                &format!("/orders/place/{buyer}"),
                Some(json!({
                    "items": [{ "productId": product, "quantity": 1 }],
                    "shippingDetails": shipping(),
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = test
        .send("GET", &format!("/orders/user/{buyer}"), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    for order in orders {
        let item = &order["items"][0];
        assert_eq!(item["product"]["productId"], item["productId"]);
        assert!(item["product"]["name"].as_str().unwrap().starts_with("Product"));
    }

    let (status, json) = test
        .send("GET", &format!("/orders/user/{}", BuyerId::new()), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_order() {
    let test = TestApp::new().await;
    let (_, placed) = test
        .send(
            "POST",
            &format!("/orders/place/{}", BuyerId::new()),
            Some(json!({
                "items": [{ "productId": "P1", "quantity": 1 }],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;
    let id = placed["id"].as_str().unwrap();

    let (status, json) = test.send("GET", &format!("/orders/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], id);

    let (status, json) = test
        .send("GET", &format!("/orders/{}", OrderId::new()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_cancel_returns_stock() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();
    let (_, placed) = test
        .send(
            "POST",
            &format!("/orders/place/{buyer}"),
            Some(json!({
                "items": [{ "productId": "P1", "quantity": 3 }],
                "shippingDetails": shipping(),
            })),
            None,
        )
        .await;
    let id = placed["id"].as_str().unwrap();
    assert_eq!(test.stock("P1").await, 2);

    let (status, _) = test
        .send(
            "POST",
            &format!("/orders/{id}/cancel/{}", BuyerId::new()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = test
        .send("POST", &format!("/orders/{id}/cancel/{buyer}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Cancelled");
    assert_eq!(test.stock("P1").await, 5);

    let (status, _) = test
        .send("POST", &format!("/orders/{id}/cancel/{buyer}"), None, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delivery_confirmation_requires_shipped() {
    let test = TestApp::new().await;
    let buyer = BuyerId::new();
    let (_, placed) = test
        .place_paid(buyer, json!([{ "productId": "P1", "quantity": 1 }]))
        .await;
    let id = placed["id"].as_str().unwrap();
    let seller = test.seller.to_string();

    let (status, _) = test
        .send("POST", &format!("/orders/{id}/delivered/{buyer}"), None, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    for next in ["Processing", "Shipped"] {
        let (status, _) = test
            .send(
                "PUT",
                &format!("/seller/orders/{id}/status"),
                Some(json!({ "status": next })),
                Some(&seller),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = test
        .send("POST", &format!("/orders/{id}/delivered/{buyer}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Delivered");
}
