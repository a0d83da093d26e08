//! The live HTTP adapter for the Daraja STK-push API.
//!
//! [`DarajaClient`] re-derives the signed password on every call and never
//! caches a failed token exchange. Orchestration code holds no locks while
//! these calls are in flight.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use posh_config::GatewayConfig;

use crate::error::GatewayError;
use crate::phone::format_phone_number;
use crate::types::{
    OauthResponse, StkPushApiResponse, StkPushHandle, StkPushRequest, StkQueryApiResponse,
    StkQueryOutcome, StkQueryRequest,
};

// ---------------------------------------------------------------------------
// PushGateway
// ---------------------------------------------------------------------------

/// The seam between payment orchestration and the real gateway.
///
/// Production wires [`DarajaClient`]; tests wire stubs. Phone formatting and
/// callback parsing are pure functions and deliberately not on the trait.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Submit a push-payment request. `amount` is rounded **up** to the next
    /// whole currency unit before submission; the gateway rejects fractions.
    async fn initiate(
        &self,
        phone: &str,
        amount: Decimal,
        order_ref: &str,
    ) -> Result<StkPushHandle, GatewayError>;

    /// Ask the gateway for the current verdict on a prior push.
    async fn query(&self, checkout_ref: &str) -> Result<StkQueryOutcome, GatewayError>;
}

// ---------------------------------------------------------------------------
// DarajaClient
// ---------------------------------------------------------------------------

pub struct DarajaClient {
    http: reqwest::Client,
    cfg: GatewayConfig,
}

impl DarajaClient {
    pub fn new(cfg: GatewayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            cfg,
        }
    }

    /// Exchange consumer key/secret for a short-lived bearer token.
    async fn access_token(&self) -> Result<String, GatewayError> {
        let basic = B64.encode(format!(
            "{}:{}",
            self.cfg.consumer_key, self.cfg.consumer_secret
        ));
        let resp = self
            .http
            .get(format!(
                "{}/oauth/v1/generate?grant_type=client_credentials",
                self.cfg.base_url()
            ))
            .header("Authorization", format!("Basic {basic}"))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(body));
        }
        let token: OauthResponse = resp.json().await?;
        Ok(token.access_token)
    }

    fn password_and_timestamp(&self) -> (String, String) {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = stk_password(&self.cfg.shortcode, &self.cfg.passkey, &timestamp);
        (password, timestamp)
    }
}

/// base64(shortcode + passkey + timestamp), the gateway's request signature.
fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    B64.encode(format!("{shortcode}{passkey}{timestamp}"))
}

/// Round a decimal total up to whole currency units for the wire.
///
/// Negative or absurd totals never reach this point (order totals are sums
/// of non-negative snapshots), but saturate to 0 rather than panic.
pub(crate) fn gateway_amount(total: Decimal) -> u64 {
    total.ceil().to_u64().unwrap_or(0)
}

#[async_trait]
impl PushGateway for DarajaClient {
    async fn initiate(
        &self,
        phone: &str,
        amount: Decimal,
        order_ref: &str,
    ) -> Result<StkPushHandle, GatewayError> {
        let token = self.access_token().await?;
        let (password, timestamp) = self.password_and_timestamp();
        let msisdn = format_phone_number(phone);

        let body = StkPushRequest {
            business_short_code: self.cfg.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: gateway_amount(amount),
            party_a: msisdn.clone(),
            party_b: self.cfg.shortcode.clone(),
            phone_number: msisdn,
            callback_url: self.cfg.callback_url.clone(),
            account_reference: format!("PoshPrint-{order_ref}"),
            transaction_desc: format!("Payment for Order #{order_ref}"),
        };

        let resp: StkPushApiResponse = self
            .http
            .post(format!(
                "{}/mpesa/stkpush/v1/processrequest",
                self.cfg.base_url()
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp.response_code.as_deref() != Some("0") {
            // The gateway's own text is the most useful thing we can surface.
            let msg = resp
                .error_message
                .or(resp.response_description)
                .unwrap_or_else(|| "push payment request failed".to_string());
            return Err(GatewayError::Request(msg));
        }

        match (resp.checkout_request_id, resp.merchant_request_id) {
            (Some(checkout_ref), Some(merchant_ref)) => {
                debug!(%checkout_ref, "stk push accepted");
                Ok(StkPushHandle {
                    checkout_ref,
                    merchant_ref,
                    description: resp
                        .response_description
                        .unwrap_or_else(|| "Success. Request accepted for processing".to_string()),
                })
            }
            _ => Err(GatewayError::Request(
                "gateway accepted the push but returned no checkout reference".to_string(),
            )),
        }
    }

    async fn query(&self, checkout_ref: &str) -> Result<StkQueryOutcome, GatewayError> {
        let token = self.access_token().await?;
        let (password, timestamp) = self.password_and_timestamp();

        let body = StkQueryRequest {
            business_short_code: self.cfg.shortcode.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_ref.to_string(),
        };

        let resp: StkQueryApiResponse = self
            .http
            .post(format!(
                "{}/mpesa/stkpushquery/v1/query",
                self.cfg.base_url()
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        Ok(StkQueryOutcome::from_response(resp))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
