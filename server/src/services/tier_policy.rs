//! Membership-tier access rule for seats.
//!
//! Priorities are inverted: `1` is the most privileged tier. All comparisons
//! go through [`TierPriority::may_access`] so that inversion lives in one place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierPriority(i32);

impl TierPriority {
    pub const fn new(priority: i32) -> Self {
        Self(priority)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// A member may hold seats of their own tier or any less exclusive one.
    pub const fn may_access(self, seat_tier: TierPriority) -> bool {
        self.0 <= seat_tier.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

pub fn can_reserve(
    user_priority: TierPriority,
    seat_priority: TierPriority,
    seat_tier_name: &str,
) -> AccessDecision {
    if user_priority.may_access(seat_priority) {
        AccessDecision::allow()
    } else {
        AccessDecision::deny(format!(
            "{seat_tier_name} seats are reserved for higher membership tiers. \
             Upgrade your membership to book them."
        ))
    }
}
