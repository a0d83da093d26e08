//! End-to-end payment flows through the HTTP surface: initiate, callback,
//! poll, and manual mark, including the authorization gates.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::*;
use posh_gateway::{GatewayError, StkQueryOutcome};
use serde_json::json;

#[tokio::test]
async fn initiate_then_callback_settles_the_order() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 150050, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    // Initiate.
    let (status, body) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["checkout_ref"], "ws_CO_1");

    // Gateway callback arrives.
    let (status, ack) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/callback",
            None,
            &success_callback("ws_CO_1", "QGR7XYZ123"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["ResultCode"], 0);

    // Status reflects the settled payment.
    let (status, body) = call(
        Arc::clone(&state),
        get(
            &format!("/api/payments/status/{order_id}"),
            Some("tok-alice"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["receipt_ref"], "QGR7XYZ123");
    assert_eq!(body["payment_method"], "gateway");
    assert!(!body["paid_at"].is_null());
}

#[tokio::test]
async fn status_poll_falls_back_to_gateway_query() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway.clone()).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;

    // Callback lost; the query reports failure.
    gateway
        .script_query(Ok(StkQueryOutcome::Failed {
            code: "1".to_string(),
            desc: "The balance is insufficient for the transaction".to_string(),
        }))
        .await;

    let (status, body) = call(
        Arc::clone(&state),
        get(
            &format!("/api/payments/status/{order_id}"),
            Some("tok-alice"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "failed");
    assert_eq!(
        body["error"],
        "The balance is insufficient for the transaction"
    );
}

#[tokio::test]
async fn status_poll_survives_gateway_transport_failure() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway.clone()).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;

    gateway
        .script_query(Err(GatewayError::Transport(
            "connection refused".to_string(),
        )))
        .await;

    // The caller sees the last-known status, not a 5xx.
    let (status, body) = call(
        Arc::clone(&state),
        get(
            &format!("/api/payments/status/{order_id}"),
            Some("tok-alice"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "pending");
}

#[tokio::test]
async fn initiation_requires_auth_and_ownership() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    // No token.
    let (status, _) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            None,
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Another customer.
    let (status, _) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-bob"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner succeeds.
    let (status, _) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn initiating_a_paid_order_is_rejected_with_400() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    // Admin marks it paid manually.
    let (status, body) = call(
        Arc::clone(&state),
        send_json(
            "PUT",
            &format!("/api/orders/{order_id}/payment"),
            Some("tok-admin"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment"]["status"], "paid");
    assert_eq!(body["payment"]["method"], "manual");

    let (status, body) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "order is already paid");
}

#[tokio::test]
async fn gateway_rejection_surfaces_as_502_with_gateway_text() {
    let gateway = Arc::new(StubGateway::failing_initiate(GatewayError::Request(
        "Invalid PhoneNumber".to_string(),
    )));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    let (status, body) = call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        body["error"].as_str().unwrap().contains("Invalid PhoneNumber"),
        "gateway text must surface: {body}"
    );

    // No partial state: the order is still unpaid.
    let (_, status_body) = call(
        Arc::clone(&state),
        get(
            &format!("/api/payments/status/{order_id}"),
            Some("tok-alice"),
        ),
    )
    .await;
    assert_eq!(status_body["payment_status"], "unpaid");
}

#[tokio::test]
async fn manual_mark_is_admin_only_over_http() {
    let gateway = Arc::new(StubGateway::with_refs(&[]));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 100000, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    let (status, _) = call(
        Arc::clone(&state),
        send_json(
            "PUT",
            &format!("/api/orders/{order_id}/payment"),
            Some("tok-alice"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "owner is not enough");

    let (status, body) = call(
        Arc::clone(&state),
        send_json(
            "PUT",
            &format!("/api/orders/{order_id}/payment"),
            Some("tok-admin"),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"]["method"], "manual");
    assert!(
        body["payment"]["checkout_ref"].is_null(),
        "manual payment needs no gateway correlation"
    );
}

#[tokio::test]
async fn paid_order_survives_replayed_and_contradicting_callbacks() {
    let gateway = Arc::new(StubGateway::with_refs(&["ws_CO_1"]));
    let state = make_state(gateway).await;
    let product = seed_product(&state, 150050, 5).await;
    let order_id = place_order(Arc::clone(&state), "tok-alice", product).await;

    call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/initiate",
            Some("tok-alice"),
            &json!({ "order_id": order_id, "phone": "0706276584" }),
        ),
    )
    .await;
    call(
        Arc::clone(&state),
        send_json(
            "POST",
            "/api/payments/callback",
            None,
            &success_callback("ws_CO_1", "QGR7XYZ123"),
        ),
    )
    .await;

    // Replay + contradicting failure, both still acknowledged.
    for payload in [
        success_callback("ws_CO_1", "DIFFERENT"),
        failure_callback("ws_CO_1", "late failure"),
    ] {
        let (status, ack) = call(
            Arc::clone(&state),
            send_json("POST", "/api/payments/callback", None, &payload),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["ResultCode"], 0);
    }

    let (_, body) = call(
        Arc::clone(&state),
        get(
            &format!("/api/payments/status/{order_id}"),
            Some("tok-alice"),
        ),
    )
    .await;
    assert_eq!(body["payment_status"], "paid");
    assert_eq!(body["receipt_ref"], "QGR7XYZ123");
}
