//! The seat reservation engine.
//!
//! [`SeatingService`] owns the store, the clock and the hold TTL. Its
//! operations are split across the submodules: hold creation and seat
//! availability in [`reservations`], the expiry sweep in [`sweeper`], cart
//! reconciliation in [`cart`] and payment-driven finalization in
//! [`finalization`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Order, OrderStatus};
use crate::store::{Store, StoreTx};
use crate::utils::clock::Clock;
use crate::utils::error::AppError;

pub mod cart;
pub mod finalization;
pub mod reservations;
pub mod sweeper;
pub mod tier_policy;

#[cfg(test)]
mod test_support;

pub use finalization::{FinalizationOutcome, PaymentEvent};
pub use reservations::{HeldSeatSummary, HoldSummary};
pub use sweeper::spawn_periodic_sweep;

pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 15;

#[derive(Clone)]
pub struct SeatingService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    hold_ttl: Duration,
}

impl<S: Store> SeatingService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, hold_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            hold_ttl,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Returns an order to the working basket. A checkout in flight is void, so a
/// pending order also gets a new payment reference.
async fn reopen_basket<T: StoreTx>(tx: &mut T, order: &mut Order) -> Result<(), AppError> {
    if order.status == OrderStatus::Pending {
        let reference = Order::new_reference();
        tx.set_order_reference(order.id, &reference).await?;
        tracing::info!(
            order_id = %order.id,
            "Basket changed during checkout, payment reference rotated"
        );
        order.external_reference = reference;
    }
    order.status = OrderStatus::Cart;
    Ok(())
}
