//! Payment reconciliation core.
//!
//! Three independent signal sources race to settle an order's payment: the
//! gateway's callback webhook, the client's status poll, and an admin manual
//! override. [`machine`] is the pure state machine that decides what each
//! signal does to a payment record; [`orchestrator`] wires it to the store
//! and gateway with a compare-and-swap application loop; [`poller`] is the
//! bounded client-side retry task.

pub mod machine;
pub mod orchestrator;
pub mod poller;

pub use machine::{apply, PaymentSignal, Transition};
pub use orchestrator::{
    Actor, InitiateReceipt, PaymentError, PaymentOrchestrator, ReconcileOutcome,
};
pub use poller::{CancelToken, PollOutcome, Sleeper, StatusPoller, StatusSource, TokioSleeper};
