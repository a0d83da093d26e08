//! Wire shapes for the STK-push gateway and the tagged callback parse.
//!
//! Field names follow the gateway's PascalCase JSON exactly via serde
//! renames. Result codes arrive as either JSON numbers or strings depending
//! on the endpoint; everything here normalizes them to strings before
//! comparing against `"0"`.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outbound request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

// ---------------------------------------------------------------------------
// Inbound response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OauthResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StkPushApiResponse {
    #[serde(rename = "ResponseCode", default, deserialize_with = "code_string")]
    pub response_code: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    /// Present on request-level rejections (bad credentials, rate limit).
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StkQueryApiResponse {
    #[serde(rename = "ResultCode", default, deserialize_with = "code_string")]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Accept a result/response code as either a JSON number or string.
fn code_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(de)?;
    Ok(match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// StkPushHandle
// ---------------------------------------------------------------------------

/// What a successful initiation hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StkPushHandle {
    /// Correlation id matched against the asynchronous callback.
    pub checkout_ref: String,
    pub merchant_ref: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// StkQueryOutcome
// ---------------------------------------------------------------------------

/// Verdict of a status query. An absent result code is not an error; the
/// push is still sitting on the customer's handset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StkQueryOutcome {
    Success,
    Failed { code: String, desc: String },
    StillProcessing,
}

impl StkQueryOutcome {
    pub(crate) fn from_response(resp: StkQueryApiResponse) -> Self {
        match resp.result_code.as_deref() {
            None => StkQueryOutcome::StillProcessing,
            Some("0") => StkQueryOutcome::Success,
            Some(code) => StkQueryOutcome::Failed {
                code: code.to_string(),
                desc: resp
                    .result_desc
                    .unwrap_or_else(|| "payment not completed".to_string()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Callback parsing
// ---------------------------------------------------------------------------

/// Tagged result of parsing the gateway's asynchronous notification.
///
/// Callers must treat `Unparseable` as a no-op and still acknowledge the
/// gateway; this type exists so that contract is structural rather than a
/// convention around exceptions.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Success {
        checkout_ref: String,
        merchant_ref: Option<String>,
        receipt_ref: Option<String>,
        amount: Option<Decimal>,
        transaction_date: Option<String>,
        phone: Option<String>,
    },
    Failure {
        checkout_ref: String,
        result_code: String,
        desc: String,
    },
    Unparseable,
}

/// Extract the callback verdict from `Body.stkCallback`. Never panics; any
/// payload without the expected nesting is `Unparseable`.
pub fn parse_callback(payload: &Value) -> CallbackOutcome {
    let Some(stk) = payload.get("Body").and_then(|b| b.get("stkCallback")) else {
        return CallbackOutcome::Unparseable;
    };
    let Some(checkout_ref) = stk
        .get("CheckoutRequestID")
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return CallbackOutcome::Unparseable;
    };
    let merchant_ref = stk
        .get("MerchantRequestID")
        .and_then(Value::as_str)
        .map(str::to_string);

    let result_code = match stk.get("ResultCode") {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return CallbackOutcome::Unparseable,
    };

    if result_code != "0" {
        let desc = stk
            .get("ResultDesc")
            .and_then(Value::as_str)
            .unwrap_or("payment failed")
            .to_string();
        return CallbackOutcome::Failure {
            checkout_ref,
            result_code,
            desc,
        };
    }

    // CallbackMetadata.Item is a [{Name, Value}] list; absent items simply
    // leave their field empty.
    let mut receipt_ref = None;
    let mut amount = None;
    let mut transaction_date = None;
    let mut phone = None;
    if let Some(items) = stk
        .get("CallbackMetadata")
        .and_then(|m| m.get("Item"))
        .and_then(Value::as_array)
    {
        for item in items {
            let Some(name) = item.get("Name").and_then(Value::as_str) else {
                continue;
            };
            let value = item.get("Value");
            match name {
                "MpesaReceiptNumber" => {
                    receipt_ref = value.and_then(Value::as_str).map(str::to_string);
                }
                "Amount" => {
                    amount = value.and_then(decimal_from_value);
                }
                "TransactionDate" => {
                    transaction_date = value.map(scalar_to_string);
                }
                "PhoneNumber" => {
                    phone = value.map(scalar_to_string);
                }
                _ => {}
            }
        }
    }

    CallbackOutcome::Success {
        checkout_ref,
        merchant_ref,
        receipt_ref,
        amount,
        transaction_date,
        phone,
    }
}

fn decimal_from_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
