use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("not enough stock for {name}: requested {requested}, available {available}")]
    Stock {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("stale write: expected version {expected}, order is at {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("checkout reference {0} already belongs to another order")]
    CheckoutRefInUse(String),

    #[error("{0}")]
    Validation(String),
}
