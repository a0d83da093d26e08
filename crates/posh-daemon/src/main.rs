//! posh-daemon entry point.
//!
//! This file is intentionally thin: it loads configuration, sets up tracing,
//! builds the shared state, wires middleware, and starts the HTTP server.
//! All route handlers live in `routes.rs`; shared state in `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::Method;
use posh_daemon::{auth::UserInfoIdentity, routes, state::AppState};
use posh_gateway::DarajaClient;
use posh_store::Store;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; silent if the file does not exist; production
    // injects env vars directly.
    let _ = dotenvy::dotenv();

    init_tracing();

    let daemon_cfg =
        posh_config::DaemonConfig::from_env().context("daemon configuration incomplete")?;
    let gateway_cfg =
        posh_config::GatewayConfig::from_env().context("gateway configuration incomplete")?;
    let userinfo_url = std::env::var("POSH_IDENTITY_USERINFO_URL")
        .context("missing required environment variable POSH_IDENTITY_USERINFO_URL")?;

    info!(env = ?gateway_cfg.env, "gateway configured");

    let state = Arc::new(AppState::new(
        Arc::new(Store::new()),
        Arc::new(DarajaClient::new(gateway_cfg)),
        Arc::new(UserInfoIdentity::new(userinfo_url)),
        daemon_cfg.admin_secret.clone(),
    ));

    let app = routes::build_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer());

    info!("posh-daemon listening on http://{}", daemon_cfg.bind_addr);
    axum::serve(
        tokio::net::TcpListener::bind(daemon_cfg.bind_addr).await?,
        app,
    )
    .await
    .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// The storefront UI is served from another origin; the gateway callback
/// arrives without CORS at all, so a permissive policy here is about the
/// browser clients only.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
