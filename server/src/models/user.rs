use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::tier_policy::TierPriority;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub membership_tier_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Membership level of a user. Lower `priority` means higher privilege.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MembershipTier {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    /// Flat percentage taken off every seat this member holds.
    pub discount_percent: Decimal,
}

impl MembershipTier {
    pub fn priority(&self) -> TierPriority {
        TierPriority::new(self.priority)
    }

    /// Applies the member discount to a tier price, rounded to cents.
    pub fn discounted(&self, price: Decimal) -> Decimal {
        let pct = self
            .discount_percent
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        (price * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED).round_dp(2)
    }
}
