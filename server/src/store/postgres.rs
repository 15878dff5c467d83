//! Postgres-backed store.
//!
//! Seat rows are locked with `FOR UPDATE` before any availability check, and
//! the unique index on `reservations(seat_id)` rejects a second active claim
//! even if a caller skipped the lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::{Store, StoreResult, StoreTx};
use crate::models::{
    Event, HeldSeat, MembershipTier, Order, OrderItem, OrderStatus, Payment, PricedSeat, Product,
    Reservation, ReservationStatus, Seat, SeatTier,
};
use crate::utils::error::AppError;

const RESERVATION_COLUMNS: &str =
    "r.id, r.hold_id, r.user_id, r.event_id, r.seat_id, r.order_id, r.status, r.unit_price, r.created_at";

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_amount, external_reference, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx { tx })
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(FromRow)]
struct SeatRow {
    id: Uuid,
    event_id: Uuid,
    tier_id: Uuid,
    seat_number: String,
    is_reserved: bool,
    tier_name: String,
    tier_priority: i32,
    tier_price: Decimal,
}

impl From<SeatRow> for PricedSeat {
    fn from(row: SeatRow) -> Self {
        PricedSeat {
            seat: Seat {
                id: row.id,
                event_id: row.event_id,
                tier_id: row.tier_id,
                seat_number: row.seat_number,
                is_reserved: row.is_reserved,
            },
            tier: SeatTier {
                id: row.tier_id,
                event_id: row.event_id,
                name: row.tier_name,
                priority: row.tier_priority,
                price: row.tier_price,
            },
        }
    }
}

#[derive(FromRow)]
struct HeldSeatRow {
    #[sqlx(flatten)]
    reservation: Reservation,
    seat_number: String,
    tier_name: String,
}

fn seat_query(tail: &str) -> String {
    format!(
        "SELECT s.id, s.event_id, s.tier_id, s.seat_number, s.is_reserved, \
                t.name AS tier_name, t.priority AS tier_priority, t.price AS tier_price \
         FROM seats s JOIN seat_tiers t ON t.id = s.tier_id {tail}"
    )
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn event(&mut self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, title, venue, start_time, created_at FROM events WHERE id = $1",
        )
        .bind(event_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(event)
    }

    async fn lock_seats(
        &mut self,
        event_id: Uuid,
        seat_ids: &[Uuid],
    ) -> StoreResult<Vec<PricedSeat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&seat_query(
            "WHERE s.event_id = $1 AND s.id = ANY($2) ORDER BY s.id FOR UPDATE OF s",
        ))
        .bind(event_id)
        .bind(seat_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(PricedSeat::from).collect())
    }

    async fn event_seats(&mut self, event_id: Uuid) -> StoreResult<Vec<PricedSeat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&seat_query(
            "WHERE s.event_id = $1 ORDER BY s.seat_number",
        ))
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(PricedSeat::from).collect())
    }

    async fn mark_seat_sold(&mut self, seat_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE seats SET is_reserved = TRUE WHERE id = $1")
            .bind(seat_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_user_membership(
        &mut self,
        user_id: Uuid,
    ) -> StoreResult<Option<MembershipTier>> {
        let tier = sqlx::query_as::<_, MembershipTier>(
            "SELECT m.id, m.name, m.priority, m.discount_percent \
             FROM users u JOIN membership_tiers m ON m.id = u.membership_tier_id \
             WHERE u.id = $1 \
             FOR UPDATE OF u",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(tier)
    }

    async fn active_reservations_for_seats(
        &mut self,
        seat_ids: &[Uuid],
    ) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r WHERE r.seat_id = ANY($1)"
        ))
        .bind(seat_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn event_reservations(&mut self, event_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r WHERE r.event_id = $1"
        ))
        .bind(event_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> StoreResult<()> {
        // DO NOTHING leaves the transaction usable for the seat lookup below.
        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO reservations \
                 (id, hold_id, user_id, event_id, seat_id, order_id, status, unit_price, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (seat_id) DO NOTHING \
             RETURNING id",
        )
        .bind(reservation.id)
        .bind(reservation.hold_id)
        .bind(reservation.user_id)
        .bind(reservation.event_id)
        .bind(reservation.seat_id)
        .bind(reservation.order_id)
        .bind(reservation.status)
        .bind(reservation.unit_price)
        .bind(reservation.created_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        if inserted.is_some() {
            return Ok(());
        }
        let number: Option<String> =
            sqlx::query_scalar("SELECT seat_number FROM seats WHERE id = $1")
                .bind(reservation.seat_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Err(AppError::seats_taken(vec![
            number.unwrap_or_else(|| reservation.seat_id.to_string())
        ]))
    }

    async fn delete_stale_reservations(
        &mut self,
        event_id: Option<Uuid>,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM reservations \
             WHERE status = $1 AND created_at < $2 AND ($3::uuid IS NULL OR event_id = $3)",
        )
        .bind(ReservationStatus::Pending)
        .bind(cutoff)
        .bind(event_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_reservations(&mut self, ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pending_reservations_for_user(
        &mut self,
        user_id: Uuid,
    ) -> StoreResult<Vec<HeldSeat>> {
        let rows = sqlx::query_as::<_, HeldSeatRow>(&format!(
            "SELECT {RESERVATION_COLUMNS}, s.seat_number, t.name AS tier_name \
             FROM reservations r \
             JOIN seats s ON s.id = r.seat_id \
             JOIN seat_tiers t ON t.id = s.tier_id \
             WHERE r.user_id = $1 AND r.status = $2 \
             ORDER BY r.created_at, s.seat_number"
        ))
        .bind(user_id)
        .bind(ReservationStatus::Pending)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| HeldSeat {
                reservation: row.reservation,
                seat_number: row.seat_number,
                tier_name: row.tier_name,
            })
            .collect())
    }

    async fn order_reservations(&mut self, order_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations r WHERE r.order_id = $1 ORDER BY r.seat_id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn link_reservations(&mut self, ids: &[Uuid], order_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE reservations SET order_id = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn confirm_reservation(&mut self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE reservations SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(ReservationStatus::Confirmed)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn open_order(&mut self, user_id: Uuid) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = $1 AND status IN ($2, $3) \
             FOR UPDATE"
        ))
        .bind(user_id)
        .bind(OrderStatus::Cart)
        .bind(OrderStatus::Pending)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn order_by_reference(&mut self, reference: &str) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE external_reference = $1 FOR UPDATE"
        ))
        .bind(reference)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(order)
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO orders \
                 (id, user_id, status, total_amount, external_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.total_amount)
        .bind(&order.external_reference)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_order(
        &mut self,
        order_id: Uuid,
        status: OrderStatus,
        total_amount: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, total_amount = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(order_id)
        .bind(status)
        .bind(total_amount)
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Order '{}' was not found",
                order_id
            )));
        }
        Ok(())
    }

    async fn set_order_reference(&mut self, order_id: Uuid, reference: &str) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET external_reference = $2 WHERE id = $1")
            .bind(order_id)
            .bind(reference)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn order_items(&mut self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, product_id, quantity, unit_price \
             FROM order_items WHERE order_id = $1 ORDER BY product_id",
        )
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn replace_order_items(
        &mut self,
        order_id: Uuid,
        items: &[OrderItem],
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;

        for item in items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(item.id)
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn product(&mut self, product_id: Uuid) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<i32> {
        let shortfall: Option<i32> = sqlx::query_scalar(
            "UPDATE products p SET stock = GREATEST(p.stock - $2, 0) \
             FROM (SELECT id, stock FROM products WHERE id = $1 FOR UPDATE) old \
             WHERE p.id = old.id \
             RETURNING GREATEST($2 - old.stock, 0)",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(shortfall.unwrap_or(quantity))
    }

    async fn payment_for_order(&mut self, order_id: Uuid) -> StoreResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, provider_payment_id, provider_status, status, amount, currency, \
                    created_at, updated_at \
             FROM payments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(payment)
    }

    async fn upsert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments \
                 (id, order_id, provider_payment_id, provider_status, status, amount, currency, \
                  created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (order_id) DO UPDATE SET \
                 provider_payment_id = EXCLUDED.provider_payment_id, \
                 provider_status = EXCLUDED.provider_status, \
                 status = EXCLUDED.status, \
                 amount = EXCLUDED.amount, \
                 currency = EXCLUDED.currency, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(&payment.provider_payment_id)
        .bind(&payment.provider_status)
        .bind(payment.status)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
