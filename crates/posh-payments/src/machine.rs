//! The payment state machine.
//!
//! # State diagram
//!
//! ```text
//!              initiate                    callback / poll success
//!   Unpaid ───────────────► Pending ───────────────────────────► Paid (terminal)
//!                             │  ▲                                 ▲
//!     callback / poll failure │  │ initiate (fresh checkout ref)   │ admin manual mark
//!                             ▼  │                                 │ (from any non-Paid)
//!                           Failed ────────────────────────────────┘
//! ```
//!
//! Two invariants are enforced here and relied on everywhere else:
//!
//! 1. **`Paid` is terminal.** Every signal applied to a `Paid` record is an
//!    [`Transition::Ignored`] no-op: a stale callback, a duplicate replay,
//!    or a racing poll can never rewrite `receipt_ref` or `paid_at`.
//! 2. **Gateway verdicts only settle a pending attempt.** Success/failure
//!    signals on `Unpaid` or `Failed` records are dropped; the checkout
//!    reference that matched them is no longer the live attempt.
//!
//! The function is pure; callers own the read-modify-write cycle and apply
//! the returned record through the store's version CAS.

use chrono::{DateTime, Utc};

use posh_schemas::{PaymentMethod, PaymentRecord, PaymentStatus};

// ---------------------------------------------------------------------------
// PaymentSignal
// ---------------------------------------------------------------------------

/// Everything that can try to move a payment record.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentSignal {
    /// A push request was accepted by the gateway for this order.
    Initiated {
        checkout_ref: String,
        phone: String,
    },
    /// The gateway reports the push completed (callback or poll path).
    /// `receipt_ref` is present on the callback path only; the status query
    /// does not return one.
    GatewaySuccess {
        receipt_ref: Option<String>,
        paid_at: DateTime<Utc>,
    },
    /// The gateway reports the push failed (callback or poll path).
    GatewayFailure { desc: String },
    /// The gateway has no verdict yet.
    StillProcessing,
    /// Admin override, bypassing the gateway entirely.
    ManualPaid { paid_at: DateTime<Utc> },
}

impl PaymentSignal {
    fn name(&self) -> &'static str {
        match self {
            PaymentSignal::Initiated { .. } => "initiated",
            PaymentSignal::GatewaySuccess { .. } => "gateway_success",
            PaymentSignal::GatewayFailure { .. } => "gateway_failure",
            PaymentSignal::StillProcessing => "still_processing",
            PaymentSignal::ManualPaid { .. } => "manual_paid",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// Result of applying a signal to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The signal moved the record; the new record is to be CAS-written.
    Applied(PaymentRecord),
    /// The signal is a no-op from this state. `reason` is for logs only.
    Ignored { reason: &'static str },
}

/// Apply `signal` to `record`, returning the resulting transition.
///
/// Reconciliation is order-insensitive: whichever of callback/poll/manual
/// arrives first settles the record, and everything that arrives after a
/// terminal `Paid` is ignored.
pub fn apply(record: &PaymentRecord, signal: &PaymentSignal) -> Transition {
    use PaymentStatus::*;

    if record.status == Paid {
        // Terminal. Includes replayed success callbacks and manual re-marks.
        return Transition::Ignored {
            reason: "record is already paid",
        };
    }

    match signal {
        // Initiation is legal from Unpaid, from Failed (retry), and from
        // Pending (the customer dismissed the first push and asked again).
        // Each initiation carries a fresh checkout ref (the gateway does
        // not allow reuse) and clears the previous attempt's outcome.
        PaymentSignal::Initiated {
            checkout_ref,
            phone,
        } => Transition::Applied(PaymentRecord {
            status: Pending,
            method: Some(PaymentMethod::Gateway),
            checkout_ref: Some(checkout_ref.clone()),
            gateway_phone: Some(phone.clone()),
            receipt_ref: None,
            error: None,
            paid_at: None,
        }),

        PaymentSignal::GatewaySuccess {
            receipt_ref,
            paid_at,
        } => match record.status {
            Pending => Transition::Applied(PaymentRecord {
                status: Paid,
                receipt_ref: receipt_ref.clone(),
                paid_at: Some(*paid_at),
                error: None,
                ..record.clone()
            }),
            _ => Transition::Ignored {
                reason: "success verdict without a pending attempt",
            },
        },

        PaymentSignal::GatewayFailure { desc } => match record.status {
            Pending => Transition::Applied(PaymentRecord {
                status: Failed,
                error: Some(desc.clone()),
                ..record.clone()
            }),
            _ => Transition::Ignored {
                reason: "failure verdict without a pending attempt",
            },
        },

        PaymentSignal::StillProcessing => Transition::Ignored {
            reason: "gateway has no verdict yet",
        },

        PaymentSignal::ManualPaid { paid_at } => Transition::Applied(PaymentRecord {
            status: Paid,
            method: Some(PaymentMethod::Manual),
            paid_at: Some(*paid_at),
            error: None,
            ..record.clone()
        }),
    }
}

/// Log-friendly name of a signal. Used by the orchestrator's tracing fields.
pub(crate) fn signal_name(signal: &PaymentSignal) -> &'static str {
    signal.name()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        "2026-02-01T12:00:00Z".parse().unwrap()
    }

    fn pending() -> PaymentRecord {
        match apply(
            &PaymentRecord::unpaid(),
            &PaymentSignal::Initiated {
                checkout_ref: "ws_CO_1".to_string(),
                phone: "254706276584".to_string(),
            },
        ) {
            Transition::Applied(p) => p,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    fn paid() -> PaymentRecord {
        match apply(
            &pending(),
            &PaymentSignal::GatewaySuccess {
                receipt_ref: Some("QGR7XYZ123".to_string()),
                paid_at: ts(),
            },
        ) {
            Transition::Applied(p) => p,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn initiate_sets_pending_with_gateway_method() {
        let p = pending();
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.method, Some(PaymentMethod::Gateway));
        assert_eq!(p.checkout_ref.as_deref(), Some("ws_CO_1"));
        assert_eq!(p.gateway_phone.as_deref(), Some("254706276584"));
    }

    #[test]
    fn callback_success_settles_pending_with_receipt() {
        let p = paid();
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.receipt_ref.as_deref(), Some("QGR7XYZ123"));
        assert_eq!(p.paid_at, Some(ts()));
        assert!(p.error.is_none());
    }

    #[test]
    fn failure_settles_pending_with_gateway_description() {
        let t = apply(
            &pending(),
            &PaymentSignal::GatewayFailure {
                desc: "Request cancelled by user".to_string(),
            },
        );
        let Transition::Applied(p) = t else {
            panic!("expected Applied");
        };
        assert_eq!(p.status, PaymentStatus::Failed);
        assert_eq!(p.error.as_deref(), Some("Request cancelled by user"));
        // The attempt's checkout ref is kept for audit.
        assert_eq!(p.checkout_ref.as_deref(), Some("ws_CO_1"));
    }

    #[test]
    fn paid_is_terminal_under_every_signal() {
        let settled = paid();
        let signals = [
            PaymentSignal::Initiated {
                checkout_ref: "ws_CO_2".to_string(),
                phone: "254700000000".to_string(),
            },
            PaymentSignal::GatewaySuccess {
                receipt_ref: Some("OTHER".to_string()),
                paid_at: ts(),
            },
            PaymentSignal::GatewayFailure {
                desc: "late failure".to_string(),
            },
            PaymentSignal::StillProcessing,
            PaymentSignal::ManualPaid { paid_at: ts() },
        ];
        for signal in &signals {
            assert!(
                matches!(apply(&settled, signal), Transition::Ignored { .. }),
                "signal {signal:?} must not move a paid record"
            );
        }
    }

    #[test]
    fn replayed_success_does_not_rewrite_receipt() {
        let settled = paid();
        let replay = apply(
            &settled,
            &PaymentSignal::GatewaySuccess {
                receipt_ref: Some("DIFFERENT".to_string()),
                paid_at: "2026-03-01T00:00:00Z".parse().unwrap(),
            },
        );
        assert!(matches!(replay, Transition::Ignored { .. }));
        assert_eq!(settled.receipt_ref.as_deref(), Some("QGR7XYZ123"));
        assert_eq!(settled.paid_at, Some(ts()));
    }

    #[test]
    fn failed_retries_into_pending_with_fresh_ref() {
        let Transition::Applied(failed) = apply(
            &pending(),
            &PaymentSignal::GatewayFailure {
                desc: "insufficient balance".to_string(),
            },
        ) else {
            panic!("expected Applied");
        };

        let Transition::Applied(retried) = apply(
            &failed,
            &PaymentSignal::Initiated {
                checkout_ref: "ws_CO_2".to_string(),
                phone: "254706276584".to_string(),
            },
        ) else {
            panic!("expected Applied");
        };
        assert_eq!(retried.status, PaymentStatus::Pending);
        assert_eq!(retried.checkout_ref.as_deref(), Some("ws_CO_2"));
        assert!(retried.error.is_none(), "retry clears the previous failure");
    }

    #[test]
    fn verdicts_without_pending_attempt_are_dropped() {
        let unpaid = PaymentRecord::unpaid();
        assert!(matches!(
            apply(
                &unpaid,
                &PaymentSignal::GatewaySuccess {
                    receipt_ref: None,
                    paid_at: ts()
                }
            ),
            Transition::Ignored { .. }
        ));
        assert!(matches!(
            apply(
                &unpaid,
                &PaymentSignal::GatewayFailure {
                    desc: "x".to_string()
                }
            ),
            Transition::Ignored { .. }
        ));
    }

    #[test]
    fn still_processing_is_always_a_noop() {
        assert!(matches!(
            apply(&pending(), &PaymentSignal::StillProcessing),
            Transition::Ignored { .. }
        ));
    }

    #[test]
    fn manual_mark_works_from_unpaid_without_checkout_ref() {
        let Transition::Applied(p) = apply(
            &PaymentRecord::unpaid(),
            &PaymentSignal::ManualPaid { paid_at: ts() },
        ) else {
            panic!("expected Applied");
        };
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.method, Some(PaymentMethod::Manual));
        assert!(p.checkout_ref.is_none());
        assert_eq!(p.paid_at, Some(ts()));
    }

    #[test]
    fn manual_mark_works_from_pending_and_failed() {
        for record in [pending(), {
            let Transition::Applied(f) = apply(
                &pending(),
                &PaymentSignal::GatewayFailure {
                    desc: "x".to_string(),
                },
            ) else {
                panic!()
            };
            f
        }] {
            let Transition::Applied(p) =
                apply(&record, &PaymentSignal::ManualPaid { paid_at: ts() })
            else {
                panic!("expected Applied from {record:?}");
            };
            assert_eq!(p.status, PaymentStatus::Paid);
            assert_eq!(p.method, Some(PaymentMethod::Manual));
        }
    }
}
