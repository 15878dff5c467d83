//! Persistence seam for the reservation engine.
//!
//! Every engine operation runs inside one [`StoreTx`]. Dropping a transaction
//! without calling [`StoreTx::commit`] discards all of its writes, so an early
//! `?` return is always a rollback.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Event, HeldSeat, MembershipTier, Order, OrderItem, OrderStatus, Payment, PricedSeat, Product,
    Reservation,
};
use crate::utils::error::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, AppError>;

#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self) -> StoreResult<()>;

    // Events and seats

    async fn event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>>;

    /// Loads the requested seats of one event and locks them until commit.
    /// Ids that do not belong to the event are silently absent from the result.
    async fn lock_seats(&mut self, event_id: Uuid, seat_ids: &[Uuid])
        -> StoreResult<Vec<PricedSeat>>;

    async fn event_seats(&mut self, event_id: Uuid) -> StoreResult<Vec<PricedSeat>>;

    async fn mark_seat_sold(&mut self, seat_id: Uuid) -> StoreResult<()>;

    // Users

    /// Loads the user's membership tier and locks the user until commit, so
    /// concurrent cart operations of one user run one after another.
    async fn lock_user_membership(&mut self, user_id: Uuid) -> StoreResult<Option<MembershipTier>>;

    // Reservations

    async fn active_reservations_for_seats(
        &mut self,
        seat_ids: &[Uuid],
    ) -> StoreResult<Vec<Reservation>>;

    async fn event_reservations(&mut self, event_id: Uuid) -> StoreResult<Vec<Reservation>>;

    async fn insert_reservation(&mut self, reservation: &Reservation) -> StoreResult<()>;

    /// Deletes pending reservations created before `cutoff`.
    async fn delete_stale_reservations(
        &mut self,
        event_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn delete_reservations(&mut self, ids: &[Uuid]) -> StoreResult<u64>;

    async fn pending_reservations_for_user(&mut self, user_id: Uuid)
        -> StoreResult<Vec<HeldSeat>>;

    async fn order_reservations(&mut self, order_id: Uuid) -> StoreResult<Vec<Reservation>>;

    async fn link_reservations(&mut self, ids: &[Uuid], order_id: Uuid) -> StoreResult<()>;

    async fn confirm_reservation(&mut self, id: Uuid) -> StoreResult<()>;

    // Orders

    /// The user's open order (`cart` or `pending`), locked until commit.
    async fn open_order(&mut self, user_id: Uuid) -> StoreResult<Option<Order>>;

    /// Looks an order up by its payment reference and locks it until commit.
    async fn order_by_reference(&mut self, reference: &str) -> StoreResult<Option<Order>>;

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()>;

    async fn update_order(
        &mut self,
        order_id: Uuid,
        status: OrderStatus,
        total_amount: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Gives the order a fresh payment reference. Webhooks carrying the old
    /// one no longer correlate.
    async fn set_order_reference(&mut self, order_id: Uuid, reference: &str) -> StoreResult<()>;

    async fn order_items(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;

    /// Replaces the order's line items wholesale.
    async fn replace_order_items(&mut self, order_id: Uuid, items: &[OrderItem])
        -> StoreResult<()>;

    // Products

    /// Loads a product and locks its stock row until commit.
    async fn product(&mut self, product_id: Uuid) -> StoreResult<Option<Product>>;

    /// Never drives stock below zero. Returns how many of the requested
    /// units were not covered by stock.
    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<i32>;

    // Payments

    async fn payment_for_order(&mut self, order_id: Uuid) -> StoreResult<Option<Payment>>;

    /// Inserts or replaces the payment keyed by its order id.
    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()>;
}
