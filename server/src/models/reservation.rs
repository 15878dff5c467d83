use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row only exists while the claim is active; expired or released holds are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub hold_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_id: Uuid,
    pub order_id: Option<Uuid>,
    pub status: ReservationStatus,
    /// Seat price after membership discount, fixed when the hold was placed.
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    /// Confirmed reservations never expire.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.is_pending() && now > self.expires_at(ttl)
    }
}

/// A pending reservation together with the seat details the cart shows.
#[derive(Debug, Clone)]
pub struct HeldSeat {
    pub reservation: Reservation,
    pub seat_number: String,
    pub tier_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(status: ReservationStatus, created_at: DateTime<Utc>) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            hold_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            order_id: None,
            status,
            unit_price: Decimal::new(5000, 2),
            created_at,
        }
    }

    #[test]
    fn test_pending_reservation_expires_after_ttl() {
        let created = Utc::now();
        let ttl = Duration::minutes(15);
        let r = reservation(ReservationStatus::Pending, created);

        assert!(!r.is_expired(ttl, created + Duration::minutes(14)));
        assert!(!r.is_expired(ttl, created + Duration::minutes(15)));
        assert!(r.is_expired(ttl, created + Duration::minutes(16)));
    }

    #[test]
    fn test_confirmed_reservation_never_expires() {
        let created = Utc::now();
        let r = reservation(ReservationStatus::Confirmed, created);
        assert!(!r.is_expired(Duration::minutes(15), created + Duration::days(30)));
    }
}
