//! HTTP tests against a running storefront.
//!
//! These tests require:
//! - A migrated and seeded database (`kirana-cli migrate`, `kirana-cli seed`)
//! - The storefront running (`cargo run -p kirana-storefront`)
//!
//! Run with: `cargo test -p kirana-integration-tests -- --ignored`

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use kirana_integration_tests::storefront_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

async fn register(client: &Client) -> Value {
    let email = format!("shopper-{}@example.com", Uuid::new_v4());
    let resp = client
        .post(format!("{}/api/auth/register", storefront_url()))
        .json(&json!({
            "name": "Test Shopper",
            "email": email,
            "password": "correct-horse-42",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.expect("Failed to read response")
}

async fn first_product(client: &Client) -> Value {
    let body: Value = client
        .get(format!("{}/api/products?limit=1", storefront_url()))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to read response");

    body["data"]["items"][0].clone()
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_health() {
    let resp = client()
        .get(format!("{}/health", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_unknown_route_uses_error_envelope() {
    let resp = client()
        .get(format!("{}/api/nope", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.expect("Failed to read response");
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_cart_requires_login() {
    let resp = client()
        .get(format!("{}/api/cart", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront and seeded database"]
async fn test_register_cart_and_cod_order() {
    let client = client();
    let base_url = storefront_url();

    let registered = register(&client).await;
    assert_eq!(registered["success"], true);
    assert_eq!(registered["data"]["role"], "user");

    let product = first_product(&client).await;
    let product_id = product["id"].as_i64().expect("seeded product");

    let resp = client
        .post(format!("{base_url}/api/cart"))
        .json(&json!({ "product_id": product_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/api/orders"))
        .json(&json!({
            "shipping_address": {
                "full_name": "Test Shopper",
                "phone": "9876543210",
                "address_line1": "12 MG Road",
                "city": "Pune",
                "state": "Maharashtra",
                "postal_code": "411001",
                "country": "India"
            },
            "payment_method": "cod"
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = resp.json().await.expect("Failed to read response");
    let order = &body["data"]["order"];
    assert_eq!(order["status"], "pending");
    assert!(
        order["order_number"]
            .as_str()
            .is_some_and(|n| n.starts_with("ORD-"))
    );

    // The ordered product leaves the cart.
    let cart: Value = client
        .get(format!("{base_url}/api/cart"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read response");
    assert_eq!(cart["data"]["item_count"], 0);

    // A pending order can be cancelled by its owner.
    let order_id = order["id"].as_i64().expect("order id");
    let resp = client
        .post(format!("{base_url}/api/orders/{order_id}/cancel"))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront and database"]
async fn test_admin_routes_forbidden_for_shoppers() {
    let client = client();
    register(&client).await;

    let resp = client
        .get(format!("{}/api/admin/dashboard", storefront_url()))
        .send()
        .await
        .expect("Failed to reach storefront");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
