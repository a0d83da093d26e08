//! Shared helpers for the in-process daemon scenario tests.
//!
//! The router is driven through `tower::ServiceExt::oneshot`; no sockets.
//! Identity is a static token table; the gateway is a scripted stub.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use posh_daemon::{auth::StaticIdentity, routes, state::AppState};
use posh_gateway::{GatewayError, PushGateway, StkPushHandle, StkQueryOutcome};
use posh_store::{NewProduct, Store};

// ---------------------------------------------------------------------------
// Gateway stub
// ---------------------------------------------------------------------------

pub struct StubGateway {
    refs: Mutex<VecDeque<String>>,
    queries: Mutex<VecDeque<Result<StkQueryOutcome, GatewayError>>>,
    initiate_error: Option<GatewayError>,
}

impl StubGateway {
    pub fn with_refs(refs: &[&str]) -> Self {
        Self {
            refs: Mutex::new(refs.iter().map(|r| r.to_string()).collect()),
            queries: Mutex::new(VecDeque::new()),
            initiate_error: None,
        }
    }

    pub fn failing_initiate(err: GatewayError) -> Self {
        Self {
            refs: Mutex::new(VecDeque::new()),
            queries: Mutex::new(VecDeque::new()),
            initiate_error: Some(err),
        }
    }

    pub async fn script_query(&self, step: Result<StkQueryOutcome, GatewayError>) {
        self.queries.lock().await.push_back(step);
    }
}

#[async_trait]
impl PushGateway for StubGateway {
    async fn initiate(
        &self,
        _phone: &str,
        _amount: Decimal,
        _order_ref: &str,
    ) -> Result<StkPushHandle, GatewayError> {
        if let Some(err) = &self.initiate_error {
            return Err(err.clone());
        }
        let checkout_ref = self
            .refs
            .lock()
            .await
            .pop_front()
            .expect("stub ran out of scripted checkout refs");
        Ok(StkPushHandle {
            checkout_ref,
            merchant_ref: "29115-34620561-1".to_string(),
            description: "Success. Request accepted for processing".to_string(),
        })
    }

    async fn query(&self, _checkout_ref: &str) -> Result<StkQueryOutcome, GatewayError> {
        self.queries
            .lock()
            .await
            .pop_front()
            .expect("stub ran out of scripted query steps")
    }
}

// ---------------------------------------------------------------------------
// State / router construction
// ---------------------------------------------------------------------------

pub const ADMIN_SECRET: &str = "test-secret";

/// Fresh state with three known tokens: `tok-alice` and `tok-bob` are
/// customers, `tok-admin` is promoted to admin.
pub async fn make_state(gateway: Arc<dyn PushGateway>) -> Arc<AppState> {
    let store = Arc::new(Store::new());
    store.directory.sync("uid-alice", "Alice", None).await;
    store.directory.sync("uid-bob", "Bob", None).await;
    store.directory.sync("uid-admin", "Root", None).await;
    store.directory.make_admin("uid-admin").await.unwrap();

    let identity = StaticIdentity::new()
        .with_token("tok-alice", "uid-alice", "Alice")
        .with_token("tok-bob", "uid-bob", "Bob")
        .with_token("tok-admin", "uid-admin", "Root");

    Arc::new(AppState::new(
        store,
        gateway,
        Arc::new(identity),
        ADMIN_SECRET.to_string(),
    ))
}

pub async fn seed_product(state: &AppState, price_cents: i64, stock: u32) -> Uuid {
    state
        .store
        .catalog
        .insert(NewProduct {
            name: "Canvas Print".to_string(),
            description: String::new(),
            price: Decimal::new(price_cents, 2),
            stock,
            sizes: vec!["A3".to_string()],
            colors: vec![],
            category: "Print".to_string(),
            image_url: None,
        })
        .await
        .id
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

/// Drive the router with a single request and return (status, json body).
pub async fn call(
    state: Arc<AppState>,
    req: Request<axum::body::Body>,
) -> (StatusCode, serde_json::Value) {
    let resp = routes::build_router(state)
        .oneshot(req)
        .await
        .expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, json)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {t}"));
    }
    builder.body(axum::body::Body::empty()).unwrap()
}

pub fn send_json(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: &serde_json::Value,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(t) = token {
        builder = builder.header("Authorization", format!("Bearer {t}"));
    }
    builder
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Place a one-line order for `token` and return the order id.
pub async fn place_order(state: Arc<AppState>, token: &str, product_id: Uuid) -> Uuid {
    let (status, body) = call(
        state,
        send_json(
            "POST",
            "/api/orders",
            Some(token),
            &serde_json::json!({
                "items": [{ "product_id": product_id, "quantity": 1 }],
                "delivery_method": "pickup"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "order placement failed: {body}");
    body["id"].as_str().unwrap().parse().unwrap()
}

pub fn success_callback(checkout_ref: &str, receipt: &str) -> serde_json::Value {
    serde_json::json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": checkout_ref,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": 1501 },
                        { "Name": "MpesaReceiptNumber", "Value": receipt },
                        { "Name": "TransactionDate", "Value": 20260201120000u64 },
                        { "Name": "PhoneNumber", "Value": 254706276584u64 }
                    ]
                }
            }
        }
    })
}

pub fn failure_callback(checkout_ref: &str, desc: &str) -> serde_json::Value {
    serde_json::json!({
        "Body": {
            "stkCallback": {
                "CheckoutRequestID": checkout_ref,
                "ResultCode": 1032,
                "ResultDesc": desc
            }
        }
    })
}
