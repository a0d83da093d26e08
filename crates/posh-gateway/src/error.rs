use thiserror::Error;

/// Failure modes of the push-payment gateway.
///
/// `Transport` covers connection / decode failures where the gateway gave no
/// verdict at all; the poll path treats those as transient and keeps the
/// order's last-known status. `Auth` and `Request` carry the gateway's own
/// error text where it supplied one.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway credential exchange failed: {0}")]
    Auth(String),
    #[error("gateway rejected the request: {0}")]
    Request(String),
    #[error("gateway transport failure: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}
