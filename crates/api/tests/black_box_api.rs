use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use chaintrack_auth::JwtClaims;
use chaintrack_core::Address;
use chaintrack_infra::ChainConfig;
use chaintrack_shipments::StatusUpdatePolicy;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(policy: StatusUpdatePolicy) -> Self {
        let config = ChainConfig {
            jwt_secret: JWT_SECRET.to_string(),
            status_policy: policy,
            ..ChainConfig::default()
        };

        // Same router as prod, bound to an ephemeral port.
        let app = chaintrack_api::app::build_app(&config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn wallet(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

fn mint_jwt(secret: &str, sub: Address) -> String {
    let now = Utc::now();
    let claims = JwtClaims::new(sub, now, now + ChronoDuration::minutes(10));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn add_product(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    name: &str,
    quantity: u64,
) -> u64 {
    let res = client
        .post(srv.url("/inventory/products"))
        .bearer_auth(token)
        .json(&json!({ "name": name, "description": format!("Test {name}"), "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_u64().unwrap()
}

async fn set_status(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    shipment: u64,
    status: Value,
) -> reqwest::Response {
    client
        .put(srv.url(&format!("/shipments/{shipment}/status")))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = mint_jwt("some-other-secret", wallet(1));
    let res = client
        .get(srv.url("/inventory/products"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, wallet(7));

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["address"].as_str().unwrap(), wallet(7).to_string());
    assert_eq!(body["status_policy"], "sender_only");
}

#[tokio::test]
async fn inventory_lifecycle() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, wallet(1));

    assert_eq!(add_product(&client, &srv, &token, "Product 1", 100).await, 1);
    assert_eq!(add_product(&client, &srv, &token, "Product 2", 5).await, 2);

    let res = client
        .get(srv.url("/inventory/products/1"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let product: Value = res.json().await.unwrap();
    assert_eq!(product["name"], "Product 1");
    assert_eq!(product["description"], "Test Product 1");
    assert_eq!(product["quantity"], 100);

    let res = client
        .get(srv.url("/inventory/products/1/availability?quantity=150"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["available"], false);

    let res = client
        .post(srv.url("/inventory/products/1/decrease"))
        .bearer_auth(&token)
        .json(&json!({ "amount": 150 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_inventory");
    assert!(body["message"].as_str().unwrap().contains("Insufficient inventory"));

    let res = client
        .put(srv.url("/inventory/products/1/quantity"))
        .bearer_auth(&token)
        .json(&json!({ "quantity": 75 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["quantity"], 75);

    let res = client
        .get(srv.url("/inventory/products/count"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 2);

    let res = client
        .get(srv.url("/inventory/products/low-stock"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["threshold"], 10);
    assert_eq!(body["products"].as_array().unwrap().len(), 1);
    assert_eq!(body["products"][0]["name"], "Product 2");

    let res = client
        .get(srv.url("/inventory/products/42"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/inventory/products/zero"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shipment_lifecycle_end_to_end() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();
    let sender = mint_jwt(JWT_SECRET, wallet(1));
    let outsider = mint_jwt(JWT_SECRET, wallet(9));
    let receiver = wallet(2);

    let product = add_product(&client, &srv, &sender, "Product 1", 100).await;

    let res = client
        .post(srv.url("/shipments"))
        .bearer_auth(&sender)
        .json(&json!({
            "receiver": receiver.to_string(),
            "product_ids": [product],
            "quantities": [50],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let shipment = res.json::<Value>().await.unwrap()["id"].as_u64().unwrap();
    assert_eq!(shipment, 1);

    let res = client
        .get(srv.url("/inventory/products/1"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["quantity"], 50);

    let res = client
        .get(srv.url("/shipments/1/status"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "Pending");

    let res = set_status(&client, &srv, &outsider, shipment, json!("InTransit")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await.unwrap()["error"], "unauthorized");

    let res = set_status(&client, &srv, &sender, shipment, json!("Delivered")).await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.json::<Value>().await.unwrap()["error"], "invalid_transition");

    let res = set_status(&client, &srv, &sender, shipment, json!(1)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = set_status(&client, &srv, &sender, shipment, json!("Delivered")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/shipments/1"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "Delivered");
    assert_eq!(body["status_code"], 2);
    assert_eq!(body["sender"], wallet(1).to_string());
    assert_eq!(body["receiver"], receiver.to_string());
    assert!(body["delivered_at"].is_string());
    assert_eq!(body["items"][0]["quantity"], 50);

    let res = client
        .get(srv.url(&format!("/shipments?receiver={receiver}")))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap().as_array().unwrap().len(), 1);

    let res = client
        .get(srv.url("/analytics"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    let analytics: Value = res.json().await.unwrap();
    assert_eq!(analytics["total_shipments"], 1);
    assert_eq!(analytics["delivered_shipments"], 1);
    assert_eq!(analytics["status_counts"]["Delivered"], 1);

    let res = client
        .get(srv.url("/events?ledger_type=shipments"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    let log: Value = res.json().await.unwrap();
    assert_eq!(log["total"], 3);
}

#[tokio::test]
async fn shipment_requests_are_validated() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();
    let sender = mint_jwt(JWT_SECRET, wallet(1));
    add_product(&client, &srv, &sender, "Product 1", 10).await;

    let cases = [
        (json!({ "receiver": wallet(2).to_string(), "product_ids": [1, 1], "quantities": [1] }), StatusCode::BAD_REQUEST),
        (json!({ "receiver": Address::ZERO.to_string(), "product_ids": [1], "quantities": [1] }), StatusCode::BAD_REQUEST),
        (json!({ "receiver": "not-an-address", "product_ids": [1], "quantities": [1] }), StatusCode::BAD_REQUEST),
        (json!({ "receiver": wallet(2).to_string(), "product_ids": [1], "quantities": [11] }), StatusCode::CONFLICT),
        (json!({ "receiver": wallet(2).to_string(), "product_ids": [5], "quantities": [1] }), StatusCode::NOT_FOUND),
    ];

    for (body, expected) in cases {
        let res = client
            .post(srv.url("/shipments"))
            .bearer_auth(&sender)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected, "body: {body}");
    }

    let res = client
        .post(srv.url("/shipments"))
        .bearer_auth(&sender)
        .json(&json!({ "receiver": wallet(2).to_string(), "product_ids": [1], "quantities": [-1] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_input");
    assert!(body["message"].is_string());

    let res = client
        .get(srv.url("/shipments/count"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["count"], 0);
}

#[tokio::test]
async fn malformed_arguments_are_invalid_input() {
    let srv = TestServer::spawn(StatusUpdatePolicy::SenderOnly).await;
    let client = reqwest::Client::new();
    let sender = mint_jwt(JWT_SECRET, wallet(1));
    add_product(&client, &srv, &sender, "Product 1", 10).await;
    let res = client
        .post(srv.url("/shipments"))
        .bearer_auth(&sender)
        .json(&json!({ "receiver": wallet(2).to_string(), "product_ids": [1], "quantities": [1] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let requests = [
        client
            .post(srv.url("/inventory/products"))
            .json(&json!({ "name": "X", "quantity": -5 })),
        client
            .put(srv.url("/inventory/products/1/quantity"))
            .json(&json!({ "quantity": "lots" })),
        client
            .post(srv.url("/inventory/products/1/decrease"))
            .body("not json")
            .header("content-type", "application/json"),
        client.get(srv.url("/inventory/products/1/availability?quantity=-1")),
        client
            .put(srv.url("/shipments/1/status"))
            .json(&json!({ "status": -1 })),
        client.get(srv.url("/events?limit=many")),
    ];

    for request in requests {
        let res = request.bearer_auth(&sender).send().await.unwrap();
        let url = res.url().clone();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{url}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_input", "{url}");
    }

    // Nothing was mutated by the rejected calls.
    let res = client
        .get(srv.url("/shipments/1/status"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "Pending");
    let res = client
        .get(srv.url("/inventory/products/count"))
        .bearer_auth(&sender)
        .send()
        .await
        .unwrap();
    assert_eq!(res.json::<Value>().await.unwrap()["count"], 1);
}

#[tokio::test]
async fn receiver_confirms_delivery_when_configured() {
    let srv = TestServer::spawn(StatusUpdatePolicy::ReceiverConfirmsDelivery).await;
    let client = reqwest::Client::new();
    let sender = mint_jwt(JWT_SECRET, wallet(1));
    let receiver = mint_jwt(JWT_SECRET, wallet(2));

    add_product(&client, &srv, &sender, "Product 1", 10).await;
    let res = client
        .post(srv.url("/shipments"))
        .bearer_auth(&sender)
        .json(&json!({ "receiver": wallet(2).to_string(), "product_ids": [1], "quantities": [3] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = set_status(&client, &srv, &receiver, 1, json!("InTransit")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = set_status(&client, &srv, &sender, 1, json!("InTransit")).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = set_status(&client, &srv, &receiver, 1, json!("Delivered")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "Delivered");
}
