use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{FinalizationOutcome, PaymentEvent, SeatingService};
use crate::models::{Event, MembershipTier, Product, Seat, SeatTier, User};
use crate::store::MemoryStore;
use crate::utils::clock::{Clock, ManualClock};

const TIERS: [(i32, &str, i64); 3] = [(1, "Platinum", 12000), (2, "Gold", 8000), (3, "Silver", 4000)];

/// One upcoming event with three seat tiers, on a manual clock.
pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub service: SeatingService<MemoryStore>,
    pub event_id: Uuid,
    seat_tiers: Mutex<HashMap<(Uuid, i32), Uuid>>,
}

impl Fixture {
    pub async fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryStore::new();
        let service = SeatingService::new(store.clone(), clock.clone(), Duration::minutes(15));

        let fx = Self {
            store,
            clock,
            service,
            event_id: Uuid::new_v4(),
            seat_tiers: Mutex::new(HashMap::new()),
        };
        fx.add_event(fx.event_id, start + Duration::days(7)).await;
        fx
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn add_event(&self, id: Uuid, start_time: DateTime<Utc>) {
        self.store
            .insert_event(Event {
                id,
                title: format!("Show {}", &id.to_string()[..8]),
                venue: "Main Hall".to_string(),
                start_time,
                created_at: self.clock.now(),
            })
            .await;

        for (priority, name, cents) in TIERS {
            let tier = SeatTier {
                id: Uuid::new_v4(),
                event_id: id,
                name: name.to_string(),
                priority,
                price: Decimal::new(cents, 2),
            };
            self.seat_tiers
                .lock()
                .unwrap()
                .insert((id, priority), tier.id);
            self.store.insert_seat_tier(tier).await;
        }
    }

    pub async fn second_event(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.add_event(id, self.clock.now() + Duration::days(14)).await;
        id
    }

    pub async fn closed_event(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.add_event(id, self.clock.now() - Duration::hours(1)).await;
        id
    }

    pub async fn user(&self, priority: i32) -> Uuid {
        self.user_with_discount(priority, Decimal::ZERO).await
    }

    pub async fn user_with_discount(&self, priority: i32, discount_percent: Decimal) -> Uuid {
        let tier = MembershipTier {
            id: Uuid::new_v4(),
            name: format!("Member {priority}"),
            priority,
            discount_percent,
        };
        let user = User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: format!("{}@example.com", Uuid::new_v4()),
            membership_tier_id: tier.id,
            created_at: self.clock.now(),
        };
        let id = user.id;
        self.store.insert_membership_tier(tier).await;
        self.store.insert_user(user).await;
        id
    }

    pub async fn seat(&self, number: &str, tier_priority: i32) -> Uuid {
        self.seat_in(self.event_id, number, tier_priority).await
    }

    pub async fn seat_in(&self, event_id: Uuid, number: &str, tier_priority: i32) -> Uuid {
        let tier_id = self.seat_tiers.lock().unwrap()[&(event_id, tier_priority)];
        let seat = Seat {
            id: Uuid::new_v4(),
            event_id,
            tier_id,
            seat_number: number.to_string(),
            is_reserved: false,
        };
        let id = seat.id;
        self.store.insert_seat(seat).await;
        id
    }

    pub async fn product(&self, name: &str, price_cents: i64, stock: i32) -> Uuid {
        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: Decimal::new(price_cents, 2),
            stock,
        };
        let id = product.id;
        self.store.insert_product(product).await;
        id
    }

    pub async fn payment_event(&self, order_id: Uuid, status: &str) -> PaymentEvent {
        let order = self.store.order(order_id).await.unwrap();
        PaymentEvent {
            external_reference: order.external_reference,
            status: status.to_string(),
            provider_payment_id: format!("mp-{}", &order_id.to_string()[..8]),
            amount: order.total_amount,
            currency: "USD".to_string(),
        }
    }

    pub async fn approve(&self, order_id: Uuid) -> FinalizationOutcome {
        let event = self.payment_event(order_id, "approved").await;
        self.service.on_payment_event(&event).await.unwrap()
    }

    pub async fn reject(&self, order_id: Uuid) -> FinalizationOutcome {
        let event = self.payment_event(order_id, "rejected").await;
        self.service.on_payment_event(&event).await.unwrap()
    }
}
