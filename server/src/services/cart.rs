//! Reconciliation of the client's cached cart with server state.
//!
//! The server's answer always replaces the client's copy. Product lines are
//! strict: a missing product or a stock shortfall fails the whole write.
//! Seat lines are soft: a seat whose hold lapsed simply drops out of the cart,
//! and a held seat the client no longer lists is released.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{reopen_basket, SeatingService};
use crate::models::{
    order_total, CartItem, CartItemInput, CartSnapshot, CheckoutSummary, HeldSeat, Order,
    OrderItem, OrderStatus,
};
use crate::store::{Store, StoreTx};
use crate::utils::error::AppError;

impl<S: Store> SeatingService<S> {
    #[instrument(skip(self))]
    pub async fn read_cart(&self, user_id: Uuid) -> Result<CartSnapshot, AppError> {
        self.sweep_best_effort(None).await;

        let now = self.now();
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let holds = self.live_holds(&mut tx, user_id, now).await?;
        let order = tx.open_order(user_id).await?;

        let items = match &order {
            Some(order) => {
                let items = tx.order_items(order.id).await?;
                let total = order_total(&items, holds.iter().map(|h| h.reservation.unit_price));
                if total != order.total_amount {
                    tx.update_order(order.id, order.status, total, now).await?;
                }
                items
            }
            None => Vec::new(),
        };

        tx.commit().await?;
        Ok(self.snapshot(order.as_ref(), &items, &holds))
    }

    #[instrument(skip(self, incoming), fields(item_count = incoming.len()))]
    pub async fn write_cart(
        &self,
        user_id: Uuid,
        incoming: Vec<CartItemInput>,
    ) -> Result<CartSnapshot, AppError> {
        let mut quantities: BTreeMap<Uuid, i32> = BTreeMap::new();
        let mut wanted_seats = Vec::new();
        for item in incoming {
            match item {
                CartItemInput::Product {
                    product_id,
                    quantity,
                } => {
                    if quantity <= 0 {
                        return Err(AppError::InvalidInput(format!(
                            "Quantity for product '{}' must be positive",
                            product_id
                        )));
                    }
                    let entry = quantities.entry(product_id).or_insert(0);
                    *entry = entry.checked_add(quantity).ok_or_else(|| {
                        AppError::InvalidInput(format!(
                            "Quantity for product '{}' is too large",
                            product_id
                        ))
                    })?;
                }
                CartItemInput::Seat { event_id, seat_id } => wanted_seats.push((event_id, seat_id)),
            }
        }

        let now = self.now();
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let mut order = tx.open_order(user_id).await?;
        let snapshots: HashMap<Uuid, OrderItem> = match &order {
            Some(order) => tx
                .order_items(order.id)
                .await?
                .into_iter()
                .map(|item| (item.product_id, item))
                .collect(),
            None => HashMap::new(),
        };

        let mut validated = Vec::with_capacity(quantities.len());
        for (product_id, quantity) in quantities {
            let product = tx.product(product_id).await?.ok_or_else(|| {
                AppError::NotFound(format!("Product '{}' was not found", product_id))
            })?;
            if product.stock < quantity {
                return Err(AppError::Unavailable {
                    message: format!(
                        "Only {} of '{}' left in stock, {} requested",
                        product.stock, product.name, quantity
                    ),
                    product_id,
                });
            }
            // Keep the price the product had when it first entered the cart.
            let unit_price = snapshots
                .get(&product_id)
                .map_or(product.price, |existing| existing.unit_price);
            validated.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: Uuid::nil(),
                product_id,
                quantity,
                unit_price,
            });
        }

        // Seat lines are the client's seats that still have a live hold of
        // this user behind them. Holds the client removed are released.
        let wanted: HashSet<(Uuid, Uuid)> = wanted_seats.iter().copied().collect();
        let (holds, removed): (Vec<_>, Vec<_>) = self
            .live_holds(&mut tx, user_id, now)
            .await?
            .into_iter()
            .partition(|h| wanted.contains(&(h.reservation.event_id, h.reservation.seat_id)));

        if !removed.is_empty() {
            let ids: Vec<Uuid> = removed.iter().map(|h| h.reservation.id).collect();
            let released = tx.delete_reservations(&ids).await?;
            info!(%user_id, released, "Released holds removed from cart");
        }

        let held_seats: HashSet<(Uuid, Uuid)> = holds
            .iter()
            .map(|h| (h.reservation.event_id, h.reservation.seat_id))
            .collect();
        for (event_id, seat_id) in &wanted_seats {
            if !held_seats.contains(&(*event_id, *seat_id)) {
                debug!(%user_id, %event_id, %seat_id, "Dropping seat without a live hold from cart");
            }
        }

        if order.is_none() && (!validated.is_empty() || !holds.is_empty()) {
            let fresh = Order::new_cart(user_id, now);
            tx.insert_order(&fresh).await?;
            order = Some(fresh);
        }

        if let Some(order) = order.as_mut() {
            for item in &mut validated {
                item.order_id = order.id;
            }
            tx.replace_order_items(order.id, &validated).await?;

            let unlinked: Vec<Uuid> = holds
                .iter()
                .filter(|h| h.reservation.order_id != Some(order.id))
                .map(|h| h.reservation.id)
                .collect();
            if !unlinked.is_empty() {
                tx.link_reservations(&unlinked, order.id).await?;
            }

            reopen_basket(&mut tx, order).await?;
            order.total_amount =
                order_total(&validated, holds.iter().map(|h| h.reservation.unit_price));
            tx.update_order(order.id, order.status, order.total_amount, now)
                .await?;
        }

        tx.commit().await?;

        info!(
            %user_id,
            products = validated.len(),
            seats = holds.len(),
            "Cart reconciled"
        );
        Ok(self.snapshot(order.as_ref(), &validated, &holds))
    }

    /// Freezes the open order for payment. Calling it again while the order
    /// is still pending returns the same reference.
    #[instrument(skip(self))]
    pub async fn checkout(&self, user_id: Uuid) -> Result<CheckoutSummary, AppError> {
        self.sweep_best_effort(None).await;

        let now = self.now();
        let mut tx = self.store.begin().await?;
        ensure_user(&mut tx, user_id).await?;

        let holds = self.live_holds(&mut tx, user_id, now).await?;
        let order = tx
            .open_order(user_id)
            .await?
            .ok_or_else(|| AppError::InvalidInput("Cart is empty".to_string()))?;
        let items = tx.order_items(order.id).await?;
        if items.is_empty() && holds.is_empty() {
            return Err(AppError::InvalidInput("Cart is empty".to_string()));
        }

        for item in &items {
            let stock = tx.product(item.product_id).await?.map_or(0, |p| p.stock);
            if stock < item.quantity {
                return Err(AppError::Unavailable {
                    message: format!(
                        "Only {} left in stock, {} in cart",
                        stock, item.quantity
                    ),
                    product_id: item.product_id,
                });
            }
        }

        let total = order_total(&items, holds.iter().map(|h| h.reservation.unit_price));
        tx.update_order(order.id, OrderStatus::Pending, total, now)
            .await?;
        tx.commit().await?;

        info!(%user_id, order_id = %order.id, %total, "Checkout started");
        Ok(CheckoutSummary {
            order_id: order.id,
            external_reference: order.external_reference,
            total_amount: total,
        })
    }

    /// The user's pending holds that are still within their TTL. Lapsed ones
    /// are deleted on the way.
    async fn live_holds(
        &self,
        tx: &mut S::Tx,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<HeldSeat>, AppError> {
        let (lapsed, live): (Vec<_>, Vec<_>) = tx
            .pending_reservations_for_user(user_id)
            .await?
            .into_iter()
            .partition(|h| h.reservation.is_expired(self.hold_ttl, now));

        if !lapsed.is_empty() {
            let ids: Vec<Uuid> = lapsed.iter().map(|h| h.reservation.id).collect();
            let removed = tx.delete_reservations(&ids).await?;
            debug!(%user_id, removed, "Removed lapsed holds while reading cart");
        }
        Ok(live)
    }

    fn snapshot(&self, order: Option<&Order>, items: &[OrderItem], holds: &[HeldSeat]) -> CartSnapshot {
        let products = items.iter().map(|item| CartItem::Product {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.line_total(),
        });
        let seats = holds.iter().map(|h| CartItem::Seat {
            event_id: h.reservation.event_id,
            seat_id: h.reservation.seat_id,
            seat_number: h.seat_number.clone(),
            tier: h.tier_name.clone(),
            unit_price: h.reservation.unit_price,
            expires_at: h.reservation.expires_at(self.hold_ttl),
        });

        CartSnapshot::new(order.map(|o| o.id), products.chain(seats).collect())
    }
}

async fn ensure_user<T: StoreTx>(tx: &mut T, user_id: Uuid) -> Result<(), AppError> {
    tx.lock_user_membership(user_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("User '{}' was not found", user_id)))
}
