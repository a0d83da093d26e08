//! Environment-derived configuration for the storefront daemon.
//!
//! All credential lookups are fail-fast: a missing required variable is a
//! [`ConfigError::Missing`], never a silent placeholder default. Lookup is
//! injectable so tests never read or mutate process environment.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// GatewayEnv
// ---------------------------------------------------------------------------

/// Which Daraja deployment the gateway client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnv {
    Sandbox,
    Production,
}

impl GatewayEnv {
    pub fn base_url(&self) -> &'static str {
        match self {
            GatewayEnv::Sandbox => "https://sandbox.safaricom.co.ke",
            GatewayEnv::Production => "https://api.safaricom.co.ke",
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Credentials and endpoints for the mobile-money push-payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub env: GatewayEnv,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub shortcode: String,
    pub callback_url: String,
}

impl GatewayConfig {
    /// Read from process environment. Fails on the first missing credential.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read from an arbitrary lookup function (tests inject maps here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let env = match lookup("MPESA_ENV").as_deref() {
            None | Some("sandbox") => GatewayEnv::Sandbox,
            Some("production") => GatewayEnv::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "MPESA_ENV",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            env,
            consumer_key: required(&lookup, "MPESA_CONSUMER_KEY")?,
            consumer_secret: required(&lookup, "MPESA_CONSUMER_SECRET")?,
            passkey: required(&lookup, "MPESA_PASSKEY")?,
            shortcode: required(&lookup, "MPESA_SHORTCODE")?,
            callback_url: required(&lookup, "MPESA_CALLBACK_URL")?,
        })
    }

    pub fn base_url(&self) -> &'static str {
        self.env.base_url()
    }
}

// ---------------------------------------------------------------------------
// DaemonConfig
// ---------------------------------------------------------------------------

/// HTTP-surface configuration. The bind address has a local default; the
/// admin bootstrap secret does not; the admin-setup route is unusable
/// without one, on purpose.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub bind_addr: SocketAddr,
    pub admin_secret: String,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let bind_addr = match lookup("POSH_DAEMON_ADDR") {
            None => SocketAddr::from(([127, 0, 0, 1], 5000)),
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "POSH_DAEMON_ADDR",
                value: raw,
            })?,
        };

        Ok(Self {
            bind_addr,
            admin_secret: required(&lookup, "POSH_ADMIN_SECRET")?,
        })
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(name) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
