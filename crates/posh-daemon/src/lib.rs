//! HTTP surface for the storefront: routing, auth extraction, and the
//! request/response types. The binary in `main.rs` wires configuration and
//! middleware around [`routes::build_router`].

pub mod api_types;
pub mod auth;
pub mod routes;
pub mod state;
