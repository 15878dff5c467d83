use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of the canonical cart returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartItem {
    Product {
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
        total: Decimal,
    },
    Seat {
        event_id: Uuid,
        seat_id: Uuid,
        seat_number: String,
        tier: String,
        unit_price: Decimal,
        expires_at: DateTime<Utc>,
    },
}

impl CartItem {
    pub fn total(&self) -> Decimal {
        match self {
            CartItem::Product { total, .. } => *total,
            CartItem::Seat { unit_price, .. } => *unit_price,
        }
    }
}

/// What the client sends back on sync. Prices and expiry times in the
/// client's cached copy are ignored; only the identifiers count.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartItemInput {
    Product { product_id: Uuid, quantity: i32 },
    Seat { event_id: Uuid, seat_id: Uuid },
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSnapshot {
    pub order_id: Option<Uuid>,
    pub items: Vec<CartItem>,
    pub total_amount: Decimal,
    /// Earliest seat-hold expiry, if the cart holds any seats.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    pub fn new(order_id: Option<Uuid>, items: Vec<CartItem>) -> Self {
        let total_amount = items.iter().map(CartItem::total).sum();
        let expires_at = items
            .iter()
            .filter_map(|item| match item {
                CartItem::Seat { expires_at, .. } => Some(*expires_at),
                CartItem::Product { .. } => None,
            })
            .min();

        Self {
            order_id,
            items,
            total_amount,
            expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub order_id: Uuid,
    pub external_reference: String,
    pub total_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_snapshot_totals_and_earliest_expiry() {
        let now = Utc::now();
        let items = vec![
            CartItem::Product {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: Decimal::new(500, 2),
                total: Decimal::new(1000, 2),
            },
            CartItem::Seat {
                event_id: Uuid::new_v4(),
                seat_id: Uuid::new_v4(),
                seat_number: "A1".to_string(),
                tier: "Gold".to_string(),
                unit_price: Decimal::new(4000, 2),
                expires_at: now + Duration::minutes(10),
            },
            CartItem::Seat {
                event_id: Uuid::new_v4(),
                seat_id: Uuid::new_v4(),
                seat_number: "A2".to_string(),
                tier: "Gold".to_string(),
                unit_price: Decimal::new(4000, 2),
                expires_at: now + Duration::minutes(5),
            },
        ];

        let snapshot = CartSnapshot::new(None, items);
        assert_eq!(snapshot.total_amount, Decimal::new(9000, 2));
        assert_eq!(snapshot.expires_at, Some(now + Duration::minutes(5)));
    }

    #[test]
    fn test_input_ignores_cached_prices() {
        let json = serde_json::json!([
            {"type": "product", "product_id": Uuid::nil(), "quantity": 2, "unit_price": "1.00", "total": "2.00"},
            {"type": "seat", "event_id": Uuid::nil(), "seat_id": Uuid::nil(), "tier": "Gold", "expires_at": "2025-01-01T00:00:00Z"}
        ]);

        let items: Vec<CartItemInput> = serde_json::from_value(json).unwrap();
        assert!(matches!(items[0], CartItemInput::Product { quantity: 2, .. }));
        assert!(matches!(items[1], CartItemInput::Seat { .. }));
    }
}
