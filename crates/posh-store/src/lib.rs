//! Authoritative in-memory store for the storefront.
//!
//! Indexed collections behind per-collection locks. Orders additionally
//! carry an optimistic version so racing payment writers cannot lose
//! updates: every payment mutation goes through
//! [`orders::OrderBook::apply_payment`], which rejects stale versions.

mod catalog;
mod directory;
mod error;
mod orders;
mod settings;

pub use catalog::{Catalog, NewProduct, ProductPatch};
pub use directory::{Directory, UserProfile};
pub use error::StoreError;
pub use orders::{ItemRequest, OrderBook, PlaceOrder};
pub use settings::SettingsStore;

/// One handle bundling every collection. Cheap to clone via `Arc` at the
/// daemon layer; collections never take each other's locks.
pub struct Store {
    pub catalog: Catalog,
    pub orders: OrderBook,
    pub directory: Directory,
    pub settings: SettingsStore,
}

impl Store {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            orders: OrderBook::new(),
            directory: Directory::new(),
            settings: SettingsStore::new(),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
