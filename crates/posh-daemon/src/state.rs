//! Shared runtime state for posh-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The store is the only
//! mutable thing here; everything else is wiring.

use std::sync::Arc;

use posh_gateway::PushGateway;
use posh_payments::PaymentOrchestrator;
use posh_store::Store;

use crate::auth::IdentityProvider;

/// Static build metadata included in the health response.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

pub struct AppState {
    pub store: Arc<Store>,
    pub payments: PaymentOrchestrator,
    pub identity: Arc<dyn IdentityProvider>,
    /// Gate for the admin bootstrap route; compared against the request body.
    pub admin_secret: String,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn PushGateway>,
        identity: Arc<dyn IdentityProvider>,
        admin_secret: String,
    ) -> Self {
        Self {
            payments: PaymentOrchestrator::new(Arc::clone(&store), gateway),
            store,
            identity,
            admin_secret,
            build: BuildInfo {
                service: "posh-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
