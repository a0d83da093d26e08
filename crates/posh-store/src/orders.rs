//! The order book: placement, lookup, and the version-gated payment
//! mutation path.
//!
//! `by_checkout` maps a gateway checkout reference to the single order that
//! owns it: the join key between a payment initiation and its asynchronous
//! callback. Every mutation that sets or clears a reference maintains the
//! index in the same critical section, so lookups never see a torn state.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use posh_schemas::{Delivery, LineItem, Order, OrderStatus, PaymentRecord};

use crate::catalog::Catalog;
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Placement request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<ItemRequest>,
    pub delivery: Delivery,
    pub customer_phone: Option<String>,
}

// ---------------------------------------------------------------------------
// OrderBook
// ---------------------------------------------------------------------------

struct Inner {
    by_id: HashMap<Uuid, Order>,
    by_checkout: HashMap<String, Uuid>,
    next_seq: u64,
}

pub struct OrderBook {
    inner: RwLock<Inner>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_id: HashMap::new(),
                by_checkout: HashMap::new(),
                next_seq: 1,
            }),
        }
    }

    /// Place an order for `user`. Stock for all lines is reserved atomically
    /// in the catalog before the order exists; any failure there aborts the
    /// placement with nothing decremented. The total is recomputed from the
    /// catalog's prices; whatever the client claimed is never consulted.
    pub async fn place(
        &self,
        catalog: &Catalog,
        user_id: &str,
        customer_name: &str,
        req: PlaceOrder,
    ) -> Result<Order, StoreError> {
        if req.items.is_empty() {
            return Err(StoreError::Validation("order must have items".to_string()));
        }
        if req.items.iter().any(|i| i.quantity == 0) {
            return Err(StoreError::Validation(
                "line quantities must be at least 1".to_string(),
            ));
        }
        if let Delivery::Delivery { location } = &req.delivery {
            if location.trim().is_empty() {
                return Err(StoreError::Validation(
                    "delivery location is required".to_string(),
                ));
            }
        }

        let wanted: Vec<(Uuid, u32)> = req
            .items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();
        let reserved = catalog.reserve_all(&wanted).await?;

        let items: Vec<LineItem> = reserved
            .into_iter()
            .zip(req.items.iter())
            .map(|(r, i)| LineItem {
                product_id: r.product_id,
                name: r.name,
                unit_price: r.unit_price,
                quantity: r.quantity,
                size: i.size.clone(),
                color: i.color.clone(),
            })
            .collect();

        let total: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let mut guard = self.inner.write().await;
        let seq = guard.next_seq;
        guard.next_seq += 1;

        let order = Order {
            id: Uuid::new_v4(),
            seq,
            version: 1,
            user_id: user_id.to_string(),
            customer_name: customer_name.to_string(),
            customer_phone: req.customer_phone,
            items,
            total,
            delivery: req.delivery,
            status: OrderStatus::Pending,
            payment: PaymentRecord::unpaid(),
            created_at: Utc::now(),
        };
        guard.by_id.insert(order.id, order.clone());
        debug!(order_id = %order.id, seq, %total, "order placed");
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, StoreError> {
        self.inner
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// O(1) lookup by gateway checkout reference.
    pub async fn find_by_checkout_ref(&self, checkout_ref: &str) -> Option<Order> {
        let guard = self.inner.read().await;
        let id = guard.by_checkout.get(checkout_ref)?;
        guard.by_id.get(id).cloned()
    }

    pub async fn list_for_user(&self, user_id: &str) -> Vec<Order> {
        let guard = self.inner.read().await;
        let mut orders: Vec<Order> = guard
            .by_id
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.seq);
        orders
    }

    pub async fn list_all(&self) -> Vec<Order> {
        let guard = self.inner.read().await;
        let mut orders: Vec<Order> = guard.by_id.values().cloned().collect();
        orders.sort_by_key(|o| o.seq);
        orders
    }

    /// Admin fulfilment-status update. Not version-gated: the fulfilment
    /// lifecycle is single-writer (admin UI) and independent of payment.
    pub async fn set_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, StoreError> {
        let mut guard = self.inner.write().await;
        let order = guard.by_id.get_mut(&id).ok_or(StoreError::NotFound)?;
        order.status = status;
        order.version += 1;
        Ok(order.clone())
    }

    /// Replace the payment sub-record, compare-and-swap on `expected_version`.
    ///
    /// This is the only payment mutation path in the workspace; the payment
    /// orchestrator owns it. A conflicting concurrent write surfaces as
    /// [`StoreError::VersionConflict`]; the caller re-reads and re-applies
    /// its signal against the fresh state.
    ///
    /// The checkout index follows the record in the same critical section:
    /// the old reference (if changed) is unlinked, the new one claimed.
    /// Claiming a reference already owned by a different order is refused.
    pub async fn apply_payment(
        &self,
        id: Uuid,
        expected_version: u64,
        payment: PaymentRecord,
    ) -> Result<Order, StoreError> {
        let mut guard = self.inner.write().await;

        if let Some(new_ref) = &payment.checkout_ref {
            if let Some(owner) = guard.by_checkout.get(new_ref) {
                if *owner != id {
                    return Err(StoreError::CheckoutRefInUse(new_ref.clone()));
                }
            }
        }

        let order = guard.by_id.get_mut(&id).ok_or(StoreError::NotFound)?;
        if order.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual: order.version,
            });
        }

        let old_ref = order.payment.checkout_ref.clone();
        order.payment = payment;
        order.version += 1;
        let new_ref = order.payment.checkout_ref.clone();
        let updated = order.clone();

        if old_ref != new_ref {
            if let Some(old) = old_ref {
                guard.by_checkout.remove(&old);
            }
            if let Some(new) = new_ref {
                guard.by_checkout.insert(new, id);
            }
        }

        Ok(updated)
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
