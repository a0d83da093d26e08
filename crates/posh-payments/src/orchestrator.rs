//! Async glue between the state machine, the order store, and the gateway.
//!
//! # Locking discipline
//!
//! Gateway calls are blocking network I/O and are **never** made while a
//! store lock is held: each operation reads a snapshot of the order,
//! validates preconditions, performs any gateway I/O, and only then applies
//! the resulting signal through the store's version CAS. A conflicting
//! concurrent writer surfaces as a version conflict; the loop re-reads and
//! re-applies the signal against the fresh record, where the state machine
//! decides whether it still means anything.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use posh_gateway::{
    format_phone_number, parse_callback, CallbackOutcome, GatewayError, PushGateway,
    StkQueryOutcome,
};
use posh_schemas::{Order, PaymentStatus, Role};
use posh_store::{Store, StoreError};

use crate::machine::{apply, signal_name, PaymentSignal, Transition};

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Who is asking. Customers act on their own orders; admins on any.
#[derive(Debug, Clone)]
pub struct Actor {
    pub subject: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn may_act_on(&self, order: &Order) -> bool {
        self.is_admin() || order.user_id == self.subject
    }
}

// ---------------------------------------------------------------------------
// PaymentError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("not authorized to act on this order")]
    Authorization,
    #[error("order not found")]
    NotFound,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => PaymentError::NotFound,
            other => PaymentError::Store(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation results
// ---------------------------------------------------------------------------

/// Returned to the client after a successful initiation.
#[derive(Debug, Clone)]
pub struct InitiateReceipt {
    pub order: Order,
    pub checkout_ref: String,
    pub description: String,
}

/// Internal verdict of a callback receipt. The HTTP endpoint acknowledges
/// the gateway no matter which variant this is; tests assert on it.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Applied { order_id: Uuid },
    Ignored { order_id: Uuid, reason: &'static str },
    Unmatched,
    Unparseable,
}

// ---------------------------------------------------------------------------
// PaymentOrchestrator
// ---------------------------------------------------------------------------

pub struct PaymentOrchestrator {
    store: Arc<Store>,
    gateway: Arc<dyn PushGateway>,
}

impl PaymentOrchestrator {
    pub fn new(store: Arc<Store>, gateway: Arc<dyn PushGateway>) -> Self {
        Self { store, gateway }
    }

    // -----------------------------------------------------------------------
    // initiate
    // -----------------------------------------------------------------------

    /// Start a push payment for an order.
    ///
    /// Rejected with a validation error when the order is already paid:
    /// a no-op error, not a silent success. The gateway call happens with no
    /// lock held; if a callback or manual mark settles the order while the
    /// push is in flight, the freshly issued checkout ref is discarded and
    /// the terminal state wins.
    pub async fn initiate(
        &self,
        actor: &Actor,
        order_id: Uuid,
        phone: &str,
    ) -> Result<InitiateReceipt, PaymentError> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(PaymentError::Validation(
                "phone number is required".to_string(),
            ));
        }

        let order = self.store.orders.get(order_id).await?;
        if !actor.may_act_on(&order) {
            return Err(PaymentError::Authorization);
        }
        if order.payment.status == PaymentStatus::Paid {
            return Err(PaymentError::Validation(
                "order is already paid".to_string(),
            ));
        }

        let msisdn = format_phone_number(phone);
        let handle = self
            .gateway
            .initiate(&msisdn, order.total, &order.id.to_string())
            .await?;

        info!(
            order_id = %order.id,
            checkout_ref = %handle.checkout_ref,
            "push payment accepted by gateway"
        );

        let signal = PaymentSignal::Initiated {
            checkout_ref: handle.checkout_ref.clone(),
            phone: msisdn,
        };
        let order = self.apply_signal(order_id, &signal).await?.ok_or_else(|| {
            // The order settled while the push was in flight.
            PaymentError::Validation("order is already paid".to_string())
        })?;

        Ok(InitiateReceipt {
            order,
            checkout_ref: handle.checkout_ref,
            description: handle.description,
        })
    }

    // -----------------------------------------------------------------------
    // reconcile_callback
    // -----------------------------------------------------------------------

    /// Ingest a gateway callback payload.
    ///
    /// Infallible by contract: unparseable payloads and unmatched checkout
    /// references are logged and dropped, never surfaced; the HTTP endpoint
    /// acknowledges the gateway regardless, so it stops retrying.
    pub async fn reconcile_callback(&self, payload: &serde_json::Value) -> ReconcileOutcome {
        let (checkout_ref, signal) = match parse_callback(payload) {
            CallbackOutcome::Success {
                checkout_ref,
                receipt_ref,
                ..
            } => (
                checkout_ref,
                PaymentSignal::GatewaySuccess {
                    receipt_ref,
                    paid_at: Utc::now(),
                },
            ),
            CallbackOutcome::Failure {
                checkout_ref,
                desc,
                result_code,
            } => {
                info!(%checkout_ref, %result_code, "gateway reported push failure");
                (checkout_ref, PaymentSignal::GatewayFailure { desc })
            }
            CallbackOutcome::Unparseable => {
                warn!("dropping unparseable gateway callback");
                return ReconcileOutcome::Unparseable;
            }
        };

        let Some(order) = self.store.orders.find_by_checkout_ref(&checkout_ref).await else {
            warn!(%checkout_ref, "callback matched no order; dropping");
            return ReconcileOutcome::Unmatched;
        };

        match self.apply_signal(order.id, &signal).await {
            Ok(Some(updated)) => {
                info!(
                    order_id = %updated.id,
                    status = ?updated.payment.status,
                    signal = signal_name(&signal),
                    "callback reconciled"
                );
                ReconcileOutcome::Applied {
                    order_id: updated.id,
                }
            }
            Ok(None) => ReconcileOutcome::Ignored {
                order_id: order.id,
                reason: "no-op from current state",
            },
            Err(err) => {
                // Store-level failure still must not propagate to the gateway.
                warn!(order_id = %order.id, %err, "callback application failed");
                ReconcileOutcome::Ignored {
                    order_id: order.id,
                    reason: "store rejected the update",
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // poll_status
    // -----------------------------------------------------------------------

    /// Client-driven status check, with a best-effort gateway query as the
    /// fallback for a delayed or lost callback.
    ///
    /// A query transport failure is swallowed: the caller gets the order's
    /// last-known status, never a 5xx from upstream flakiness.
    pub async fn poll_status(&self, actor: &Actor, order_id: Uuid) -> Result<Order, PaymentError> {
        let order = self.store.orders.get(order_id).await?;
        if !actor.may_act_on(&order) {
            return Err(PaymentError::Authorization);
        }

        let checkout_ref = match (&order.payment.status, &order.payment.checkout_ref) {
            (PaymentStatus::Pending, Some(r)) => r.clone(),
            _ => return Ok(order),
        };

        let signal = match self.gateway.query(&checkout_ref).await {
            Ok(StkQueryOutcome::Success) => PaymentSignal::GatewaySuccess {
                receipt_ref: None,
                paid_at: Utc::now(),
            },
            Ok(StkQueryOutcome::Failed { desc, code }) => {
                info!(order_id = %order.id, %code, "status query reported failure");
                PaymentSignal::GatewayFailure { desc }
            }
            Ok(StkQueryOutcome::StillProcessing) => return Ok(order),
            Err(err) => {
                warn!(order_id = %order.id, %err, "status query transport failure; returning last known status");
                return Ok(order);
            }
        };

        match self.apply_signal(order_id, &signal).await? {
            Some(updated) => Ok(updated),
            // A racing callback settled it first; the fresh read is the truth.
            None => Ok(self.store.orders.get(order_id).await?),
        }
    }

    // -----------------------------------------------------------------------
    // manual_mark
    // -----------------------------------------------------------------------

    /// Admin override: mark an order paid without gateway evidence.
    /// Idempotent on an already-paid order.
    pub async fn manual_mark(&self, actor: &Actor, order_id: Uuid) -> Result<Order, PaymentError> {
        if !actor.is_admin() {
            return Err(PaymentError::Authorization);
        }

        let signal = PaymentSignal::ManualPaid { paid_at: Utc::now() };
        match self.apply_signal(order_id, &signal).await? {
            Some(updated) => {
                info!(order_id = %updated.id, admin = %actor.subject, "order manually marked paid");
                Ok(updated)
            }
            None => Ok(self.store.orders.get(order_id).await?),
        }
    }

    // -----------------------------------------------------------------------
    // CAS application loop
    // -----------------------------------------------------------------------

    /// Read-apply-write with retry on version conflict.
    ///
    /// Returns `Ok(Some(order))` when the signal moved the record,
    /// `Ok(None)` when the state machine ignored it (e.g. the order settled
    /// first). Bounded retries: a conflict means another writer won the
    /// version race, and re-reading always converges because the machine
    /// ignores signals that stop being meaningful.
    async fn apply_signal(
        &self,
        order_id: Uuid,
        signal: &PaymentSignal,
    ) -> Result<Option<Order>, PaymentError> {
        const MAX_CAS_RETRIES: usize = 8;

        let mut last_conflict = StoreError::VersionConflict {
            expected: 0,
            actual: 0,
        };
        for _ in 0..MAX_CAS_RETRIES {
            let current = self.store.orders.get(order_id).await?;
            let next = match apply(&current.payment, signal) {
                Transition::Applied(next) => next,
                Transition::Ignored { reason } => {
                    info!(
                        order_id = %order_id,
                        signal = signal_name(signal),
                        reason,
                        "signal ignored"
                    );
                    return Ok(None);
                }
            };

            match self
                .store
                .orders
                .apply_payment(order_id, current.version, next)
                .await
            {
                Ok(updated) => return Ok(Some(updated)),
                Err(conflict @ StoreError::VersionConflict { .. }) => {
                    last_conflict = conflict;
                    continue;
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(PaymentError::Store(last_conflict))
    }
}
