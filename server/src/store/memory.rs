//! In-process store guarded by a single mutex.
//!
//! A transaction holds the lock for its whole lifetime and works on a copy of
//! the state, which replaces the shared state on commit. That makes every
//! transaction serializable, which is what the hold and finalization paths
//! rely on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreResult, StoreTx};
use crate::models::{
    Event, HeldSeat, MembershipTier, Order, OrderItem, OrderStatus, Payment, PricedSeat, Product,
    Reservation, ReservationStatus, Seat, SeatTier, User,
};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Default)]
struct State {
    membership_tiers: HashMap<Uuid, MembershipTier>,
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    seat_tiers: HashMap<Uuid, SeatTier>,
    seats: HashMap<Uuid, Seat>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    reservations: HashMap<Uuid, Reservation>,
    /// Keyed by order id.
    payments: HashMap<Uuid, Payment>,
}

impl State {
    fn priced(&self, seat: &Seat) -> StoreResult<PricedSeat> {
        let tier = self.seat_tiers.get(&seat.tier_id).ok_or_else(|| {
            AppError::Internal(format!("seat {} references a missing tier", seat.id))
        })?;
        Ok(PricedSeat {
            seat: seat.clone(),
            tier: tier.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    sweep_fault: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every stale-reservation sweep fails with an internal error.
    pub fn fail_sweeps(&self, fail: bool) {
        self.sweep_fault.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_membership_tier(&self, tier: MembershipTier) {
        self.state
            .lock()
            .await
            .membership_tiers
            .insert(tier.id, tier);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn insert_seat_tier(&self, tier: SeatTier) {
        self.state.lock().await.seat_tiers.insert(tier.id, tier);
    }

    pub async fn insert_seat(&self, seat: Seat) {
        self.state.lock().await.seats.insert(seat.id, seat);
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        let mut all: Vec<_> = self
            .state
            .lock()
            .await
            .reservations
            .values()
            .cloned()
            .collect();
        all.sort_by_key(|r| r.created_at);
        all
    }

    pub async fn seat(&self, seat_id: Uuid) -> Option<Seat> {
        self.state.lock().await.seats.get(&seat_id).cloned()
    }

    pub async fn product(&self, product_id: Uuid) -> Option<Product> {
        self.state.lock().await.products.get(&product_id).cloned()
    }

    pub async fn order(&self, order_id: Uuid) -> Option<Order> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    pub async fn order_items(&self, order_id: Uuid) -> Vec<OrderItem> {
        self.state
            .lock()
            .await
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect()
    }

    pub async fn payment(&self, order_id: Uuid) -> Option<Payment> {
        self.state.lock().await.payments.get(&order_id).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx {
            guard,
            working,
            sweep_fault: self.sweep_fault.load(Ordering::SeqCst),
        })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    sweep_fault: bool,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self) -> StoreResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.working.events.get(&event_id).cloned())
    }

    async fn lock_seats(
        &mut self,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> StoreResult<Vec<PricedSeat>> {
        let mut seats = Vec::with_capacity(seat_ids.len());
        for id in seat_ids {
            if let Some(seat) = self.working.seats.get(id) {
                if seat.event_id == event_id {
                    seats.push(self.working.priced(seat)?);
                }
            }
        }
        seats.sort_by_key(|s| s.seat.id);
        Ok(seats)
    }

    async fn event_seats(&mut self, event_id: Uuid) -> StoreResult<Vec<PricedSeat>> {
        let mut seats = self
            .working
            .seats
            .values()
            .filter(|seat| seat.event_id == event_id)
            .map(|seat| self.working.priced(seat))
            .collect::<StoreResult<Vec<_>>>()?;
        seats.sort_by(|a, b| a.seat.seat_number.cmp(&b.seat.seat_number));
        Ok(seats)
    }

    async fn mark_seat_sold(&mut self, seat_id: Uuid) -> StoreResult<()> {
        if let Some(seat) = self.working.seats.get_mut(&seat_id) {
            seat.is_reserved = true;
        }
        Ok(())
    }

    async fn lock_user_membership(
        &mut self,
        user_id: Uuid,
    ) -> StoreResult<Option<MembershipTier>> {
        let Some(user) = self.working.users.get(&user_id) else {
            return Ok(None);
        };
        Ok(self
            .working
            .membership_tiers
            .get(&user.membership_tier_id)
            .cloned())
    }

    async fn active_reservations_for_seats(
        &mut self,
        seat_ids: &[Uuid],
    ) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| seat_ids.contains(&r.seat_id))
            .cloned()
            .collect())
    }

    async fn event_reservations(&mut self, event_id: Uuid) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        let taken = self
            .working
            .reservations
            .values()
            .any(|r| r.seat_id == reservation.seat_id);
        if taken {
            let number = self
                .working
                .seats
                .get(&reservation.seat_id)
                .map(|s| s.seat_number.clone())
                .unwrap_or_else(|| reservation.seat_id.to_string());
            return Err(AppError::seats_taken(vec![number]));
        }
        self.working
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn delete_stale_reservations(
        &mut self,
        event_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        if self.sweep_fault {
            return Err(AppError::Internal("sweep failure injected".to_string()));
        }
        let before = self.working.reservations.len();
        self.working.reservations.retain(|_, r| {
            let in_scope = event_id.map_or(true, |id| r.event_id == id);
            !(in_scope && r.status == ReservationStatus::Pending && r.created_at < cutoff)
        });
        Ok((before - self.working.reservations.len()) as u64)
    }

    async fn delete_reservations(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let mut removed = 0;
        for id in ids {
            if self.working.reservations.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn pending_reservations_for_user(
        &mut self,
        user_id: Uuid,
    ) -> StoreResult<Vec<HeldSeat>> {
        let mut held = Vec::new();
        for r in self.working.reservations.values() {
            if r.user_id != user_id || r.status != ReservationStatus::Pending {
                continue;
            }
            let seat = self.working.seats.get(&r.seat_id).ok_or_else(|| {
                AppError::Internal(format!("reservation {} references a missing seat", r.id))
            })?;
            let priced = self.working.priced(seat)?;
            held.push(HeldSeat {
                reservation: r.clone(),
                seat_number: priced.seat.seat_number,
                tier_name: priced.tier.name,
            });
        }
        held.sort_by(|a, b| {
            a.reservation
                .created_at
                .cmp(&b.reservation.created_at)
                .then_with(|| a.seat_number.cmp(&b.seat_number))
        });
        Ok(held)
    }

    async fn order_reservations(&mut self, order_id: Uuid) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .working
            .reservations
            .values()
            .filter(|r| r.order_id == Some(order_id))
            .cloned()
            .collect())
    }

    async fn link_reservations(&mut self, ids: &[Uuid], order_id: Uuid) -> StoreResult<()> {
        for id in ids {
            if let Some(r) = self.working.reservations.get_mut(id) {
                r.order_id = Some(order_id);
            }
        }
        Ok(())
    }

    async fn confirm_reservation(&mut self, id: Uuid) -> StoreResult<()> {
        if let Some(r) = self.working.reservations.get_mut(&id) {
            r.status = ReservationStatus::Confirmed;
        }
        Ok(())
    }

    async fn open_order(&mut self, user_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.user_id == user_id && !o.status.is_terminal())
            .cloned())
    }

    async fn order_by_reference(&mut self, reference: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.external_reference == reference)
            .cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        let second_open = !order.status.is_terminal()
            && self
                .working
                .orders
                .values()
                .any(|o| o.user_id == order.user_id && !o.status.is_terminal());
        if second_open {
            return Err(AppError::Internal(format!(
                "user {} already has an open order",
                order.user_id
            )));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(
        &mut self,
        order_id: Uuid,
        status: OrderStatus,
        total_amount: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let order = self
            .working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Order '{}' was not found", order_id)))?;
        order.status = status;
        order.total_amount = total_amount;
        order.updated_at = now;
        Ok(())
    }

    async fn set_order_reference(&mut self, order_id: Uuid, reference: &str) -> StoreResult<()> {
        let order = self
            .working
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Order '{}' was not found", order_id)))?;
        order.external_reference = reference.to_string();
        Ok(())
    }

    async fn order_items(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .working
            .order_items
            .iter()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn replace_order_items(
        &mut self,
        order_id: Uuid,
        items: &[OrderItem],
    ) -> StoreResult<()> {
        self.working
            .order_items
            .retain(|item| item.order_id != order_id);
        self.working.order_items.extend_from_slice(items);
        Ok(())
    }

    async fn product(&mut self, product_id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<i32> {
        let Some(product) = self.working.products.get_mut(&product_id) else {
            return Ok(quantity);
        };
        let shortfall = (quantity - product.stock).max(0);
        product.stock = (product.stock - quantity).max(0);
        Ok(shortfall)
    }

    async fn payment_for_order(&mut self, order_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.working.payments.get(&order_id).cloned())
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        self.working
            .payments
            .insert(payment.order_id, payment.clone());
        Ok(())
    }
}
