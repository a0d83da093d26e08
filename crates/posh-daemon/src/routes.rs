//! Axum router and all HTTP handlers for posh-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.
//!
//! The callback route is special: it must acknowledge the gateway no matter
//! what arrived, so it reads raw bytes instead of using the `Json` extractor
//! (which would reject malformed bodies with a 400 before the handler runs).

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use posh_payments::{Actor, PaymentError};
use posh_schemas::Role;
use posh_store::{ItemRequest, NewProduct, PlaceOrder, ProductPatch, StoreError};

use crate::{
    api_types::{
        AdminSetupRequest, CallbackAck, CreateProductRequest, ErrorResponse, HealthResponse,
        InitiatePaymentRequest, InitiatePaymentResponse, PaymentStatusResponse, PlaceOrderRequest,
        SyncRequest, UpdateOrderStatusRequest, UpdateProductRequest, UpdateSettingsRequest,
        UserResponse,
    },
    auth::{bearer_token, AuthUser},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/sync", post(auth_sync))
        .route("/api/auth/me", get(auth_me))
        .route("/api/admin/setup", post(admin_setup))
        .route("/api/products", get(list_products).post(create_product))
        .route(
            "/api/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/orders", get(list_orders).post(place_order))
        .route("/api/orders/:id", put(update_order_status))
        .route("/api/orders/:id/payment", put(manual_payment))
        .route("/api/payments/initiate", post(initiate_payment))
        .route("/api/payments/status/:order_id", get(payment_status))
        .route("/api/payments/callback", post(payment_callback))
        .route("/api/settings", get(get_settings).put(update_settings))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// ApiError: the HTTP mapping of the error taxonomy
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized,
    Forbidden,
    NotFound,
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid or missing token".to_string(),
            ),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "not authorized".to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => {
                warn!(%msg, "internal error surfaced as 500");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            stock @ StoreError::Stock { .. } => ApiError::Conflict(stock.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => ApiError::BadRequest(msg),
            PaymentError::Authorization => ApiError::Forbidden,
            PaymentError::NotFound => ApiError::NotFound,
            PaymentError::Gateway(g) => ApiError::BadGateway(g.to_string()),
            PaymentError::Store(s) => ApiError::Internal(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

/// Verify the bearer token and pair the identity with its directory role.
async fn require_user(st: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    let identity = st
        .identity
        .verify(token)
        .await
        .ok_or(ApiError::Unauthorized)?;
    let role = st.store.directory.role(&identity.subject).await;
    Ok(AuthUser {
        subject: identity.subject,
        name: identity.name,
        email: identity.email,
        role,
    })
}

async fn require_admin(st: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = require_user(st, headers).await?;
    if user.role != Role::Admin {
        return Err(ApiError::Forbidden);
    }
    Ok(user)
}

fn actor(user: &AuthUser) -> Actor {
    Actor {
        subject: user.subject.clone(),
        role: user.role,
    }
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Auth routes
// ---------------------------------------------------------------------------

pub(crate) async fn auth_sync(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SyncRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;
    let name = body.name.filter(|n| !n.is_empty()).unwrap_or(user.name);
    let profile = st
        .store
        .directory
        .sync(&user.subject, &name, user.email.as_deref())
        .await;
    Ok(Json(UserResponse {
        subject: profile.subject,
        email: profile.email,
        name: profile.name,
        role: profile.role,
    }))
}

pub(crate) async fn auth_me(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;
    Ok(Json(UserResponse {
        subject: user.subject,
        email: user.email,
        name: user.name,
        role: user.role,
    }))
}

/// Promote a synced profile to admin, gated by the bootstrap secret from the
/// environment rather than any session.
pub(crate) async fn admin_setup(
    State(st): State<Arc<AppState>>,
    Json(body): Json<AdminSetupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.secret != st.admin_secret {
        return Err(ApiError::Forbidden);
    }
    let profile = st.store.directory.make_admin(&body.subject).await?;
    info!(subject = %profile.subject, "admin role granted");
    Ok(Json(UserResponse {
        subject: profile.subject,
        email: profile.email,
        name: profile.name,
        role: profile.role,
    }))
}

// ---------------------------------------------------------------------------
// Product routes
// ---------------------------------------------------------------------------

pub(crate) async fn list_products(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(st.store.catalog.list().await)
}

pub(crate) async fn get_product(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(st.store.catalog.get(id).await?))
}

pub(crate) async fn create_product(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&st, &headers).await?;
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("product name is required".to_string()));
    }
    let product = st
        .store
        .catalog
        .insert(NewProduct {
            name: body.name,
            description: body.description.unwrap_or_default(),
            price: body.price,
            stock: body.stock,
            sizes: body.sizes.unwrap_or_else(|| vec!["M".to_string()]),
            colors: body.colors.unwrap_or_else(|| vec!["White".to_string()]),
            category: body.category.unwrap_or_else(|| "Basic".to_string()),
            image_url: body.image_url,
        })
        .await;
    Ok((StatusCode::CREATED, Json(product)))
}

pub(crate) async fn update_product(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&st, &headers).await?;
    let product = st
        .store
        .catalog
        .update(
            id,
            ProductPatch {
                name: body.name,
                description: body.description,
                price: body.price,
                stock: body.stock,
                sizes: body.sizes,
                colors: body.colors,
                category: body.category,
                image_url: body.image_url.map(Some),
            },
        )
        .await?;
    Ok(Json(product))
}

pub(crate) async fn delete_product(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&st, &headers).await?;
    st.store.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Order routes
// ---------------------------------------------------------------------------

pub(crate) async fn place_order(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;

    let delivery = match body.delivery_method.as_str() {
        "pickup" => posh_schemas::Delivery::Pickup,
        "delivery" => match body.delivery_location {
            Some(location) if !location.trim().is_empty() => {
                posh_schemas::Delivery::Delivery { location }
            }
            _ => {
                return Err(ApiError::BadRequest(
                    "delivery location is required".to_string(),
                ))
            }
        },
        _ => {
            return Err(ApiError::BadRequest(
                "delivery_method must be pickup or delivery".to_string(),
            ))
        }
    };

    let order = st
        .store
        .orders
        .place(
            &st.store.catalog,
            &user.subject,
            &user.name,
            PlaceOrder {
                items: body
                    .items
                    .into_iter()
                    .map(|i| ItemRequest {
                        product_id: i.product_id,
                        quantity: i.quantity,
                        size: i.size,
                        color: i.color,
                    })
                    .collect(),
                delivery,
                customer_phone: body.customer_phone,
            },
        )
        .await?;

    info!(order_id = %order.id, user = %user.subject, total = %order.total, "order placed");
    Ok((StatusCode::CREATED, Json(order)))
}

pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;
    let orders = if user.role == Role::Admin {
        st.store.orders.list_all().await
    } else {
        st.store.orders.list_for_user(&user.subject).await
    };
    Ok(Json(orders))
}

pub(crate) async fn update_order_status(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&st, &headers).await?;
    let order = st.store.orders.set_status(id, body.status).await?;
    Ok(Json(order))
}

// ---------------------------------------------------------------------------
// Payment routes
// ---------------------------------------------------------------------------

pub(crate) async fn initiate_payment(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;
    let receipt = st
        .payments
        .initiate(&actor(&user), body.order_id, &body.phone)
        .await?;
    Ok(Json(InitiatePaymentResponse {
        message: "Push sent. Check your phone to complete payment.".to_string(),
        checkout_ref: receipt.checkout_ref,
    }))
}

pub(crate) async fn payment_status(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&st, &headers).await?;
    let order = st.payments.poll_status(&actor(&user), order_id).await?;
    Ok(Json(PaymentStatusResponse::from(&order)))
}

/// Gateway webhook. Always acknowledges: an unparseable body, an unmatched
/// checkout reference, or an internal store failure must never give the
/// gateway a reason to retry indefinitely.
pub(crate) async fn payment_callback(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> impl IntoResponse {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => {
            let outcome = st.payments.reconcile_callback(&payload).await;
            info!(?outcome, "gateway callback processed");
        }
        Err(err) => {
            warn!(%err, "gateway callback body was not JSON; dropping");
        }
    }
    (StatusCode::OK, Json(CallbackAck::accepted()))
}

/// Admin manual override: mark an order paid without gateway evidence.
pub(crate) async fn manual_payment(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_admin(&st, &headers).await?;
    let order = st.payments.manual_mark(&actor(&user), id).await?;
    Ok(Json(order))
}

// ---------------------------------------------------------------------------
// Settings routes
// ---------------------------------------------------------------------------

pub(crate) async fn get_settings(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(st.store.settings.get().await)
}

pub(crate) async fn update_settings(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&st, &headers).await?;
    let settings = st
        .store
        .settings
        .update(body.currency, body.currency_symbol)
        .await;
    Ok(Json(settings))
}
