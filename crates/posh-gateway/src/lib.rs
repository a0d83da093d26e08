//! Client for the mobile-money STK-push gateway (Safaricom Daraja).
//!
//! All gateway interaction lives here: OAuth token exchange, phone-number
//! normalization, push-payment initiation, status query, and callback
//! parsing. The rest of the workspace depends only on the [`PushGateway`]
//! trait; test code substitutes stubs for it.

mod client;
mod error;
mod phone;
mod types;

pub use client::{DarajaClient, PushGateway};
pub use error::GatewayError;
pub use phone::format_phone_number;
pub use types::{
    parse_callback, CallbackOutcome, StkPushHandle, StkQueryOutcome,
};
