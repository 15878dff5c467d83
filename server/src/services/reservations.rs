//! Hold creation and seat availability.
//!
//! A hold is all-or-nothing: every requested seat is checked for existence,
//! availability and tier access inside one transaction with the seat rows
//! locked, and only then is one pending reservation written per seat.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::tier_policy::can_reserve;
use super::{reopen_basket, SeatingService};
use crate::models::{
    order_total, Order, PricedSeat, Reservation, ReservationStatus,
    SeatAvailability, SeatListing,
};
use crate::store::{Store, StoreTx};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct HeldSeatSummary {
    pub seat_id: Uuid,
    pub seat_number: String,
    pub tier: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldSummary {
    pub hold_id: Uuid,
    pub order_id: Uuid,
    pub event_id: Uuid,
    pub seats: Vec<HeldSeatSummary>,
    pub total_amount: Decimal,
    pub expires_at: DateTime<Utc>,
}

impl<S: Store> SeatingService<S> {
    #[instrument(skip(self, seat_ids), fields(seat_count = seat_ids.len()))]
    pub async fn create_hold(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<HoldSummary, AppError> {
        if seat_ids.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one seat must be requested".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(seat_ids.len());
        let requested: Vec<Uuid> = seat_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        self.sweep_best_effort(Some(event_id)).await;

        let now = self.now();
        let mut tx = self.store.begin().await?;

        let event = tx
            .event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event '{}' was not found", event_id)))?;
        if event.is_closed(now) {
            return Err(AppError::EventClosed(format!(
                "Event '{}' has already started",
                event.title
            )));
        }

        let membership = tx
            .lock_user_membership(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' was not found", user_id)))?;

        // Order row before seat rows, the same lock order the webhook path uses.
        let mut order = match tx.open_order(user_id).await? {
            Some(order) => order,
            None => {
                let order = Order::new_cart(user_id, now);
                tx.insert_order(&order).await?;
                order
            }
        };

        let seats = tx.lock_seats(event_id, &requested).await?;
        if seats.len() != requested.len() {
            return Err(AppError::NotFound(format!(
                "{} of the requested seats do not exist for event '{}'",
                requested.len() - seats.len(),
                event.title
            )));
        }

        // Holds past their TTL that the sweep has not reached yet do not block.
        let existing = tx.active_reservations_for_seats(&requested).await?;
        let (lapsed, active): (Vec<_>, Vec<_>) = existing
            .into_iter()
            .partition(|r| r.is_expired(self.hold_ttl, now));
        if !lapsed.is_empty() {
            let ids: Vec<Uuid> = lapsed.iter().map(|r| r.id).collect();
            tx.delete_reservations(&ids).await?;
        }

        let claimed: HashSet<Uuid> = active.iter().map(|r| r.seat_id).collect();
        let taken = seat_numbers(
            seats
                .iter()
                .filter(|s| s.seat.is_reserved || claimed.contains(&s.seat.id)),
        );
        if !taken.is_empty() {
            return Err(AppError::seats_taken(taken));
        }

        let user_priority = membership.priority();
        let mut reasons = BTreeSet::new();
        let denied = seat_numbers(seats.iter().filter(|s| {
            let decision = can_reserve(user_priority, s.tier.priority(), &s.tier.name);
            if let Some(reason) = decision.reason {
                reasons.insert(reason);
            }
            !decision.allowed
        }));
        if !denied.is_empty() {
            let reason = reasons.into_iter().collect::<Vec<_>>().join(" ");
            return Err(AppError::seats_forbidden(denied, reason));
        }

        let hold_id = Uuid::new_v4();
        let mut held = Vec::with_capacity(seats.len());
        for priced in &seats {
            let unit_price = membership.discounted(priced.tier.price);
            let reservation = Reservation {
                id: Uuid::new_v4(),
                hold_id,
                user_id,
                event_id,
                seat_id: priced.seat.id,
                order_id: Some(order.id),
                status: ReservationStatus::Pending,
                unit_price,
                created_at: now,
            };
            tx.insert_reservation(&reservation).await?;
            held.push(HeldSeatSummary {
                seat_id: priced.seat.id,
                seat_number: priced.seat.seat_number.clone(),
                tier: priced.tier.name.clone(),
                unit_price,
            });
        }
        held.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));

        reopen_basket(&mut tx, &mut order).await?;
        let items = tx.order_items(order.id).await?;
        let linked = tx.order_reservations(order.id).await?;
        order.total_amount = order_total(&items, linked.iter().map(|r| r.unit_price));
        tx.update_order(order.id, order.status, order.total_amount, now)
            .await?;

        tx.commit().await?;

        let total_amount = held.iter().map(|s| s.unit_price).sum();
        info!(
            %user_id,
            %event_id,
            %hold_id,
            order_id = %order.id,
            seats = held.len(),
            "Seats held"
        );

        Ok(HoldSummary {
            hold_id,
            order_id: order.id,
            event_id,
            seats: held,
            total_amount,
            expires_at: now + self.hold_ttl,
        })
    }

    /// Every seat of an event with its current availability.
    pub async fn list_seats(&self, event_id: Uuid) -> Result<Vec<SeatListing>, AppError> {
        self.sweep_best_effort(Some(event_id)).await;

        let now = self.now();
        let mut tx = self.store.begin().await?;
        if tx.event(event_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Event '{}' was not found",
                event_id
            )));
        }

        let seats = tx.event_seats(event_id).await?;
        let claims: HashMap<Uuid, Reservation> = tx
            .event_reservations(event_id)
            .await?
            .into_iter()
            .filter(|r| !r.is_expired(self.hold_ttl, now))
            .map(|r| (r.seat_id, r))
            .collect();
        tx.commit().await?;

        Ok(seats
            .into_iter()
            .map(|priced| {
                let status = match claims.get(&priced.seat.id) {
                    _ if priced.seat.is_reserved => SeatAvailability::Sold,
                    Some(r) if r.status == ReservationStatus::Confirmed => SeatAvailability::Sold,
                    Some(_) => SeatAvailability::Held,
                    None => SeatAvailability::Available,
                };
                SeatListing {
                    seat_id: priced.seat.id,
                    seat_number: priced.seat.seat_number,
                    tier: priced.tier.name,
                    tier_priority: priced.tier.priority,
                    price: priced.tier.price,
                    status,
                }
            })
            .collect())
    }
}

fn seat_numbers<'a>(seats: impl Iterator<Item = &'a PricedSeat>) -> Vec<String> {
    let mut numbers: Vec<String> = seats.map(|s| s.seat.seat_number.clone()).collect();
    numbers.sort();
    numbers
}
