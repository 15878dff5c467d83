use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::tier_policy::TierPriority;

/// Price band of an event's seats. Lower `priority` is the more exclusive tier.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeatTier {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub priority: i32,
    pub price: Decimal,
}

impl SeatTier {
    pub fn priority(&self) -> TierPriority {
        TierPriority::new(self.priority)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub seat_number: String,
    /// Durable "sold" flag, only set once a payment is approved.
    pub is_reserved: bool,
}

/// A seat joined with its tier.
#[derive(Debug, Clone)]
pub struct PricedSeat {
    pub seat: Seat,
    pub tier: SeatTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatAvailability {
    Available,
    Held,
    Sold,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatListing {
    pub seat_id: Uuid,
    pub seat_number: String,
    pub tier: String,
    pub tier_priority: i32,
    pub price: Decimal,
    pub status: SeatAvailability,
}
