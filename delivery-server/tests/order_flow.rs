//! End-to-end order lifecycle through the HTTP router

mod common;

use std::sync::Arc;

use common::*;
use http::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app
        .request(http::Method::GET, "/api/health", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn missing_or_foreign_token_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .request(http::Method::GET, "/api/orders", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Drivers cannot place orders
    let (status, body) = app
        .post(
            "/api/orders",
            DRIVER,
            json!({
                "restaurant_id": RESTAURANT,
                "address_id": ADDRESS,
                "items": [{ "menu_item_id": NDOLE, "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2002);
}

#[tokio::test]
async fn placement_prices_with_percentage_coupon() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/orders",
            CLIENT,
            json!({
                "restaurant_id": RESTAURANT,
                "address_id": ADDRESS,
                "items": [
                    { "menu_item_id": NDOLE, "quantity": 2 },
                    { "menu_item_id": POULET_DG, "quantity": 1 }
                ],
                "payment_method": "mtn_momo",
                "coupon_code": "welcome10"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let order = &body["data"]["order"];
    // 2 x 2500 + 1 x 1200 (discount price)
    assert_eq!(dec(&order["subtotal"]), Decimal::from(6200));
    assert_eq!(dec(&order["discount"]), Decimal::from(620));
    assert_eq!(dec(&order["delivery_fee"]), Decimal::from(500));
    assert_eq!(dec(&order["total"]), Decimal::from(6080));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["coupon_code"], "WELCOME10");

    let delivery = &body["data"]["delivery"];
    assert_eq!(delivery["status"], "searching");
    assert!(delivery["driver_id"].is_null());
}

#[tokio::test]
async fn free_delivery_coupon_waives_fee() {
    let app = TestApp::new();
    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), Some("FREESHIP"))
        .await;
    let (_, body) = app.get(&format!("/api/orders/{id}"), CLIENT).await;
    let order = &body["data"];
    assert_eq!(dec(&order["total"]), Decimal::from(2500));
    assert_eq!(order["delivery_fee_waived"], true);
    assert_eq!(dec(&order["delivery_fee"]), Decimal::from(500));
}

#[tokio::test]
async fn invalid_carts_are_rejected() {
    let app = TestApp::new();
    let place = |items| {
        app.post(
            "/api/orders",
            CLIENT,
            json!({
                "restaurant_id": RESTAURANT,
                "address_id": ADDRESS,
                "items": items,
                "payment_method": "cash"
            }),
        )
    };

    let (status, _) = place(json!([])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = place(json!([{ "menu_item_id": SOYA, "quantity": 1 }])).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 4007);

    let (status, _) = place(json!([{ "menu_item_id": 9999, "quantity": 1 }])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Another client's address
    let (status, body) = app
        .post(
            "/api/orders",
            OTHER_CLIENT,
            json!({
                "restaurant_id": RESTAURANT,
                "address_id": ADDRESS,
                "items": [{ "menu_item_id": NDOLE, "quantity": 1 }],
                "payment_method": "cash"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4010);
}

#[tokio::test]
async fn coupon_quote_and_per_user_limit() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/coupons/validate",
            CLIENT,
            json!({ "code": "once", "restaurant_id": RESTAURANT, "subtotal": "3000" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(dec(&body["data"]["discount"]), Decimal::from(500));

    app.place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), Some("ONCE"))
        .await;

    let (status, body) = app
        .post(
            "/api/coupons/validate",
            CLIENT,
            json!({ "code": "ONCE", "restaurant_id": RESTAURANT, "subtotal": "3000" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 6004);
}

#[tokio::test]
async fn restaurant_cannot_skip_or_set_driver_states() {
    let app = TestApp::new();
    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), None)
        .await;
    let uri = format!("/api/restaurants/{RESTAURANT}/orders/{id}/status");

    let (status, body) = app.post(&uri, OWNER, json!({ "status": "ready" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);

    let (status, _) = app.post(&uri, OWNER, json!({ "status": "on_the_way" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app.get(&format!("/api/orders/{id}"), CLIENT).await;
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn only_the_owner_manages_restaurant_orders() {
    let app = TestApp::new();
    let (status, _) = app
        .get(&format!("/api/restaurants/{RESTAURANT}/orders"), OTHER_CLIENT)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), None)
        .await;
    let (status, body) = app
        .get(&format!("/api/restaurants/{RESTAURANT}/orders?status=pending"), ADMIN)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn client_cancel_window() {
    let app = TestApp::new();
    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), None)
        .await;
    let (status, body) = app
        .request(
            http::Method::POST,
            &format!("/api/orders/{id}/cancel"),
            Some(CLIENT),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["cancellation_reason"], "Annulé par le client");
    assert_eq!(app.sink.count_titled("Commande annulée"), 1);

    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), None)
        .await;
    app.make_ready(id).await;
    let (status, body) = app
        .post(&format!("/api/orders/{id}/cancel"), CLIENT, json!({ "reason": "too slow" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4003);
}

#[tokio::test]
async fn full_lifecycle_with_rating_and_earnings() {
    let app = TestApp::new();
    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 2 }]), None)
        .await;
    app.make_ready(id).await;
    assert_eq!(app.sink.for_user(CLIENT).len(), 3);

    app.go_online(DRIVER).await;
    let (_, body) = app.get("/api/driver/available-orders", DRIVER).await;
    let offers = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["restaurant_name"], "Chez Ngozi");

    let (status, body) = app
        .post(&format!("/api/driver/orders/{id}/accept"), DRIVER, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let delivery_id = body["data"]["id"].as_i64().expect("delivery id");
    assert_eq!(app.sink.count_titled("Livreur assigné"), 1);

    let (status, _) = app
        .post(
            "/api/driver/location",
            DRIVER,
            json!({ "latitude": 4.045, "longitude": 9.74, "delivery_id": delivery_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app
        .get(&format!("/api/deliveries/{delivery_id}/driver-location"), CLIENT)
        .await;
    assert_eq!(body["data"]["driver_name"], "Eric");
    assert_eq!(body["data"]["position"]["latitude"], 4.045);

    let update = format!("/api/driver/deliveries/{delivery_id}/update-status");
    for status in ["going_to_restaurant", "picked_up", "on_the_way", "delivered"] {
        let (code, body) = app.post(&update, DRIVER, json!({ "status": status })).await;
        assert_eq!(code, StatusCode::OK, "{status}: {body}");
    }

    let (_, body) = app.get(&format!("/api/orders/{id}"), CLIENT).await;
    assert_eq!(body["data"]["status"], "delivered");
    assert!(body["data"]["delivered_at"].is_i64());

    // fee_share 80% of 500
    let (_, body) = app.get("/api/driver/earnings", DRIVER).await;
    assert_eq!(dec(&body["data"]["total"]), Decimal::from(400));
    assert_eq!(dec(&body["data"]["wallet_balance"]), Decimal::from(400));
    assert_eq!(body["data"]["delivered_count"], 1);

    let (_, body) = app.get("/api/driver/stats", DRIVER).await;
    assert_eq!(body["data"]["total_deliveries"], 1);
    assert_eq!(body["data"]["today_deliveries"], 1);
    assert_eq!(dec(&body["data"]["today_earnings"]), Decimal::from(400));

    // Terminal deliveries are immutable
    let (status, body) = app
        .post(&update, DRIVER, json!({ "status": "on_the_way" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let rate = format!("/api/orders/{id}/rate");
    let (status, body) = app
        .post(&rate, CLIENT, json!({ "restaurant_rating": 5, "driver_rating": 4 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, body) = app
        .post(&rate, CLIENT, json!({ "restaurant_rating": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4006);

    let driver = app.state.storage.get_user(DRIVER).unwrap().unwrap();
    assert_eq!(driver.rating, 4.0);
    assert_eq!(driver.rating_count, 1);
}

#[tokio::test]
async fn rating_bounds_are_validated() {
    let app = TestApp::new();
    let id = app
        .place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), None)
        .await;
    let (status, _) = app
        .post(&format!("/api/orders/{id}/rate"), CLIENT, json!({ "restaurant_rating": 6 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(&format!("/api/orders/{id}/rate"), CLIENT, json!({ "restaurant_rating": 5 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 4005);
}

#[tokio::test]
async fn notification_inbox_and_push_token() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/api/profile/push-token",
            CLIENT,
            json!({ "token": "not-an-expo-token" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/profile/push-token",
            CLIENT,
            json!({ "token": "ExponentPushToken[abc123]" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let user = app.state.storage.get_user(CLIENT).unwrap().unwrap();
    assert_eq!(user.push_token.as_deref(), Some("ExponentPushToken[abc123]"));

    let (status, _) = app
        .request(
            http::Method::DELETE,
            "/api/profile/push-token",
            Some(CLIENT),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let user = app.state.storage.get_user(CLIENT).unwrap().unwrap();
    assert!(user.push_token.is_none());

    let (status, body) = app.get("/api/notifications", CLIENT).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_array());

    let (status, _) = app
        .post("/api/notifications/123/read", CLIENT, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post("/api/notifications/read-all", CLIENT, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["updated"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_use_coupon_is_redeemed_once_under_concurrency() {
    let app = Arc::new(TestApp::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                app.place_order(json!([{ "menu_item_id": NDOLE, "quantity": 1 }]), Some("LASTONE"))
                    .await
            })
        })
        .collect();

    let mut discounted = 0;
    for handle in handles {
        let id = handle.await.expect("task");
        let (_, body) = app.get(&format!("/api/orders/{id}"), CLIENT).await;
        if dec(&body["data"]["discount"]) == Decimal::from(300) {
            discounted += 1;
        } else {
            assert_eq!(dec(&body["data"]["discount"]), Decimal::ZERO);
        }
    }
    assert_eq!(discounted, 1);

    let coupon = app
        .state
        .storage
        .get_coupon("LASTONE")
        .expect("storage")
        .expect("coupon");
    assert_eq!(coupon.usage_count, 1);
}
