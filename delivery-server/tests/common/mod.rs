//! Test harness: temp database, seeded catalog, fake gateway, recording sink

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use delivery_server::auth::JwtConfig;
use delivery_server::catalog::{self, CatalogSnapshot};
use delivery_server::notify::RecordingSink;
use delivery_server::payments::{
    CollectRequest, CollectResponse, GatewayError, GatewayStatus, PaymentGateway,
};
use delivery_server::{Config, ServerState, Storage, build_app};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use shared::models::UserRole;
use tempfile::TempDir;
use tower::ServiceExt;

pub const CLIENT: i64 = 1;
pub const OTHER_CLIENT: i64 = 2;
pub const DRIVER: i64 = 10;
pub const OTHER_DRIVER: i64 = 11;
pub const OWNER: i64 = 20;
pub const ADMIN: i64 = 30;

pub const RESTAURANT: i64 = 100;
pub const ADDRESS: i64 = 500;
/// 2500 XAF
pub const NDOLE: i64 = 1000;
/// 1500 XAF, discounted to 1200
pub const POULET_DG: i64 = 1001;
/// Unavailable
pub const SOYA: i64 = 1002;

/// Gateway that accepts every collection and answers polls with a fixed status
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<CollectRequest>>,
    pub poll_status: Mutex<Option<String>>,
    pub fail_initiate: Mutex<bool>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initiate(&self, request: CollectRequest) -> Result<CollectResponse, GatewayError> {
        if *self.fail_initiate.lock() {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "payer not registered".into(),
            });
        }
        let reference = format!("FMP-{}", request.external_id);
        self.requests.lock().push(request);
        Ok(CollectResponse {
            reference: reference.clone(),
            status: "PENDING".into(),
            raw: json!({ "reference": reference, "status": "PENDING" }),
        })
    }

    async fn status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let status = self
            .poll_status
            .lock()
            .clone()
            .unwrap_or_else(|| "PENDING".into());
        Ok(GatewayStatus {
            status: status.clone(),
            reason: None,
            raw: json!({ "reference": reference, "status": status }),
        })
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: ServerState,
    pub sink: Arc<RecordingSink>,
    pub gateway: Arc<FakeGateway>,
    _dir: TempDir,
}

fn seed() -> CatalogSnapshot {
    serde_json::from_value(json!({
        "users": [
            { "id": CLIENT, "name": "Awa", "phone": "237690000001", "role": "client" },
            { "id": OTHER_CLIENT, "name": "Paul", "phone": "237690000002", "role": "client" },
            { "id": DRIVER, "name": "Eric", "phone": "237690000010", "role": "driver" },
            { "id": OTHER_DRIVER, "name": "Marc", "phone": "237690000011", "role": "driver" },
            { "id": OWNER, "name": "Mama Ngozi", "phone": "237690000020", "role": "restaurant" },
            { "id": ADMIN, "name": "Ops", "phone": "237690000030", "role": "admin" }
        ],
        "restaurants": [
            {
                "id": RESTAURANT,
                "name": "Chez Ngozi",
                "owner_id": OWNER,
                "location": { "latitude": 4.0511, "longitude": 9.7679 },
                "delivery_fee": "500"
            }
        ],
        "menu_items": [
            { "id": NDOLE, "restaurant_id": RESTAURANT, "name": "Ndolé", "price": "2500" },
            { "id": POULET_DG, "restaurant_id": RESTAURANT, "name": "Poulet DG", "price": "1500", "discount_price": "1200" },
            { "id": SOYA, "restaurant_id": RESTAURANT, "name": "Soya", "price": "1000", "is_available": false }
        ],
        "addresses": [
            {
                "id": ADDRESS,
                "user_id": CLIENT,
                "label": "Maison",
                "address": "Rue Njo-Njo, Bonapriso",
                "location": { "latitude": 4.0300, "longitude": 9.6950 }
            }
        ],
        "coupons": [
            {
                "id": 1, "code": "WELCOME10", "type": "percentage", "value": "10",
                "minimum_order": "2000", "maximum_discount": "1000", "is_active": true
            },
            { "id": 2, "code": "FREESHIP", "type": "free_delivery", "is_active": true },
            {
                "id": 3, "code": "ONCE", "type": "fixed_amount", "value": "500",
                "per_user_limit": 1, "is_active": true
            },
            {
                "id": 4, "code": "LASTONE", "type": "fixed_amount", "value": "300",
                "usage_limit": 1, "is_active": true
            }
        ]
    }))
    .expect("seed catalog")
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let work_dir = dir.path().to_string_lossy().to_string();
        let config = Config::with_defaults(work_dir, JwtConfig::with_secret("t".repeat(48)));
        let storage = Storage::open(config.database_path()).expect("open storage");
        catalog::import(&storage, &seed()).expect("seed");

        let sink = Arc::new(RecordingSink::new());
        let gateway = Arc::new(FakeGateway::default());
        let state = ServerState::new(config, storage, gateway.clone(), sink.clone());
        let app = build_app(state.clone());

        Self {
            app,
            state,
            sink,
            gateway,
            _dir: dir,
        }
    }

    pub fn token(&self, user_id: i64) -> String {
        let role = match user_id {
            CLIENT | OTHER_CLIENT => UserRole::Client,
            DRIVER | OTHER_DRIVER => UserRole::Driver,
            OWNER => UserRole::Restaurant,
            _ => UserRole::Admin,
        };
        self.state
            .jwt_service
            .generate_token(user_id, role)
            .expect("token")
    }

    /// Send an unauthenticated raw body, returning only the status
    pub async fn request_raw(
        &self,
        uri: &str,
        content_type: Option<&str>,
        body: &'static str,
    ) -> StatusCode {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        let request = builder.body(Body::from(body)).expect("request");
        let response = self.app.clone().oneshot(request).await.expect("response");
        response.status()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        user: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(id)));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: i64) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: i64, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(user), Some(body)).await
    }

    /// Place an order for `CLIENT` and return its id
    pub async fn place_order(&self, items: Value, coupon: Option<&str>) -> i64 {
        let (status, body) = self
            .post(
                "/api/orders",
                CLIENT,
                json!({
                    "restaurant_id": RESTAURANT,
                    "address_id": ADDRESS,
                    "items": items,
                    "payment_method": "mtn_momo",
                    "coupon_code": coupon,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["order"]["id"].as_i64().expect("order id")
    }

    /// Restaurant walks an order to `ready`
    pub async fn make_ready(&self, order_id: i64) {
        for status in ["confirmed", "preparing", "ready"] {
            let (code, body) = self
                .post(
                    &format!("/api/restaurants/{RESTAURANT}/orders/{order_id}/status"),
                    OWNER,
                    json!({ "status": status }),
                )
                .await;
            assert_eq!(code, StatusCode::OK, "{status}: {body}");
        }
    }

    pub async fn go_online(&self, driver: i64) {
        let (code, body) = self
            .post("/api/driver/toggle-online", driver, json!({}))
            .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["data"]["is_online"], true);
    }
}

/// Decimal fields serialize as strings
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
