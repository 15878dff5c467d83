use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub venue: String,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Holds can no longer be placed once the event has started.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}
