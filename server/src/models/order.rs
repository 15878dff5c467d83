use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The user's working basket.
    Cart,
    /// Submitted to the payment provider, awaiting its callback.
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    /// Correlation id handed to the payment provider and echoed back by its webhook.
    pub external_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new_reference() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub fn new_cart(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Cart,
            total_amount: Decimal::ZERO,
            external_reference: Self::new_reference(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Catalog price captured when the product first entered the cart.
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Products subtotal plus every ticket price linked to the order.
pub fn order_total<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    seat_prices: impl IntoIterator<Item = Decimal>,
) -> Decimal {
    let products: Decimal = items.into_iter().map(OrderItem::line_total).sum();
    let seats: Decimal = seat_prices.into_iter().sum();
    products + seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_total_sums_lines_and_seats() {
        let order_id = Uuid::new_v4();
        let items = vec![
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                quantity: 3,
                unit_price: Decimal::new(450, 2),
            },
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                quantity: 1,
                unit_price: Decimal::new(1000, 2),
            },
        ];

        let total = order_total(&items, vec![Decimal::new(8000, 2)]);
        assert_eq!(total, Decimal::new(10350, 2));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!OrderStatus::Cart.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }
}
