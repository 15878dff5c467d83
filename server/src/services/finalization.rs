//! Payment-driven order finalization.
//!
//! The payment provider calls back with the order's external reference and a
//! status in its own vocabulary. Callbacks may be replayed or arrive out of
//! order, so the stored [`Payment`] is the idempotency anchor: once it reaches
//! a terminal status, later events for the same order change nothing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::SeatingService;
use crate::models::{Order, OrderStatus, Payment, PaymentStatus, ReservationStatus};
use crate::store::{Store, StoreTx};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub external_reference: String,
    pub status: String,
    pub provider_payment_id: String,
    pub amount: Decimal,
    pub currency: String,
}

impl PaymentEvent {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.external_reference.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "externalReference is required".to_string(),
            ));
        }
        if self.status.trim().is_empty() {
            return Err(AppError::InvalidInput("status is required".to_string()));
        }
        if self.provider_payment_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "providerPaymentId is required".to_string(),
            ));
        }
        if self.amount.is_sign_negative() {
            return Err(AppError::InvalidInput(
                "amount cannot be negative".to_string(),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::InvalidInput(format!(
                "currency '{}' is not a three-letter code",
                self.currency
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationOutcome {
    Completed,
    Cancelled,
    /// The provider has not decided yet; nothing but the payment record moved.
    Pending,
    /// The order was already settled by an earlier event.
    AlreadyFinalized,
}

impl<S: Store> SeatingService<S> {
    #[instrument(
        skip(self, event),
        fields(reference = %event.external_reference, status = %event.status)
    )]
    pub async fn on_payment_event(
        &self,
        event: &PaymentEvent,
    ) -> Result<FinalizationOutcome, AppError> {
        event.validate()?;

        let now = self.now();
        let mut tx = self.store.begin().await?;

        let order = tx
            .order_by_reference(&event.external_reference)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No order matches reference '{}'",
                    event.external_reference
                ))
            })?;

        let existing = tx.payment_for_order(order.id).await?;
        if let Some(payment) = &existing {
            if payment.status.is_terminal() {
                info!(
                    order_id = %order.id,
                    recorded = ?payment.status,
                    "Payment already settled, ignoring replay"
                );
                return Ok(FinalizationOutcome::AlreadyFinalized);
            }
        }

        let status = PaymentStatus::from_provider(&event.status);
        let payment = Payment {
            id: existing.as_ref().map_or_else(Uuid::new_v4, |p| p.id),
            order_id: order.id,
            provider_payment_id: event.provider_payment_id.clone(),
            provider_status: event.status.clone(),
            status,
            amount: event.amount,
            currency: event.currency.to_ascii_uppercase(),
            created_at: existing.as_ref().map_or(now, |p| p.created_at),
            updated_at: now,
        };
        tx.upsert_payment(&payment).await?;

        let outcome = if order.status.is_terminal() {
            warn!(
                order_id = %order.id,
                order_status = ?order.status,
                "Payment event for an order that is already closed"
            );
            FinalizationOutcome::AlreadyFinalized
        } else {
            match status {
                PaymentStatus::Approved => {
                    self.complete_order(&mut tx, &order, event.amount).await?;
                    FinalizationOutcome::Completed
                }
                PaymentStatus::Rejected | PaymentStatus::Cancelled => {
                    self.cancel_order(&mut tx, &order).await?;
                    FinalizationOutcome::Cancelled
                }
                PaymentStatus::Pending => FinalizationOutcome::Pending,
            }
        };

        tx.commit().await?;

        info!(order_id = %order.id, ?outcome, "Payment event processed");
        Ok(outcome)
    }

    async fn complete_order(
        &self,
        tx: &mut S::Tx,
        order: &Order,
        paid: Decimal,
    ) -> Result<(), AppError> {
        if paid != order.total_amount {
            warn!(
                order_id = %order.id,
                expected = %order.total_amount,
                %paid,
                "Paid amount differs from order total"
            );
        }

        for item in tx.order_items(order.id).await? {
            let shortfall = tx.decrement_stock(item.product_id, item.quantity).await?;
            if shortfall > 0 {
                warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    shortfall,
                    "Product oversold, stock clamped at zero"
                );
            }
        }

        let mut confirmed = 0;
        for reservation in tx.order_reservations(order.id).await? {
            if reservation.status != ReservationStatus::Pending {
                continue;
            }
            tx.confirm_reservation(reservation.id).await?;
            tx.mark_seat_sold(reservation.seat_id).await?;
            confirmed += 1;
        }

        tx.update_order(
            order.id,
            OrderStatus::Completed,
            order.total_amount,
            self.now(),
        )
        .await?;

        info!(order_id = %order.id, confirmed, "Order completed");
        Ok(())
    }

    async fn cancel_order(&self, tx: &mut S::Tx, order: &Order) -> Result<(), AppError> {
        let pending: Vec<Uuid> = tx
            .order_reservations(order.id)
            .await?
            .into_iter()
            .filter(|r| r.is_pending())
            .map(|r| r.id)
            .collect();
        let released = tx.delete_reservations(&pending).await?;

        tx.update_order(
            order.id,
            OrderStatus::Cancelled,
            order.total_amount,
            self.now(),
        )
        .await?;

        info!(order_id = %order.id, released, "Order cancelled, seats released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{FinalizationOutcome, PaymentEvent};
    use crate::models::{CartItemInput, OrderStatus, PaymentStatus, ReservationStatus};
    use crate::services::test_support::Fixture;
    use crate::utils::error::AppError;

    #[tokio::test]
    async fn test_approval_completes_order_and_sells_seats() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let popcorn = fx.product("Popcorn", 650, 10).await;
        let seat = fx.seat("A1", 2).await;

        fx.service
            .write_cart(
                user,
                vec![CartItemInput::Product {
                    product_id: popcorn,
                    quantity: 3,
                }],
            )
            .await
            .unwrap();
        let hold = fx
            .service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();
        fx.service.checkout(user).await.unwrap();

        assert_eq!(fx.approve(hold.order_id).await, FinalizationOutcome::Completed);

        let order = fx.store.order(hold.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(fx.store.product(popcorn).await.unwrap().stock, 7);
        assert!(fx.store.seat(seat).await.unwrap().is_reserved);

        let reservations = fx.store.reservations().await;
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].status, ReservationStatus::Confirmed);

        let payment = fx.store.payment(hold.order_id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Approved);
        assert_eq!(payment.amount, order.total_amount);
    }

    #[tokio::test]
    async fn test_replayed_approval_changes_nothing() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let popcorn = fx.product("Popcorn", 650, 10).await;

        let cart = fx
            .service
            .write_cart(
                user,
                vec![CartItemInput::Product {
                    product_id: popcorn,
                    quantity: 2,
                }],
            )
            .await
            .unwrap();
        let order_id = cart.order_id.unwrap();

        assert_eq!(fx.approve(order_id).await, FinalizationOutcome::Completed);
        assert_eq!(
            fx.approve(order_id).await,
            FinalizationOutcome::AlreadyFinalized
        );

        assert_eq!(fx.store.product(popcorn).await.unwrap().stock, 8);
    }

    #[tokio::test]
    async fn test_rejection_releases_seats_immediately() {
        let fx = Fixture::new().await;
        let buyer = fx.user(1).await;
        let next = fx.user(1).await;
        let a = fx.seat("A1", 3).await;
        let b = fx.seat("A2", 3).await;

        let hold = fx
            .service
            .create_hold(buyer, fx.event_id, &[a, b])
            .await
            .unwrap();
        fx.service.checkout(buyer).await.unwrap();

        assert_eq!(fx.reject(hold.order_id).await, FinalizationOutcome::Cancelled);
        assert!(fx.store.reservations().await.is_empty());
        assert_eq!(
            fx.store.order(hold.order_id).await.unwrap().status,
            OrderStatus::Cancelled
        );

        let retry = fx
            .service
            .create_hold(next, fx.event_id, &[a, b])
            .await
            .unwrap();
        assert_eq!(retry.seats.len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_after_approval_is_ignored() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let seat = fx.seat("A1", 3).await;
        let hold = fx
            .service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();

        fx.approve(hold.order_id).await;
        assert_eq!(
            fx.reject(hold.order_id).await,
            FinalizationOutcome::AlreadyFinalized
        );

        let reservations = fx.store.reservations().await;
        assert_eq!(reservations[0].status, ReservationStatus::Confirmed);
        assert_eq!(
            fx.store.order(hold.order_id).await.unwrap().status,
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_pending_status_only_records_payment() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let seat = fx.seat("A1", 3).await;
        let hold = fx
            .service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();
        fx.service.checkout(user).await.unwrap();

        let event = fx.payment_event(hold.order_id, "in_process").await;
        let outcome = fx.service.on_payment_event(&event).await.unwrap();
        assert_eq!(outcome, FinalizationOutcome::Pending);

        assert_eq!(
            fx.store.order(hold.order_id).await.unwrap().status,
            OrderStatus::Pending
        );
        let payment = fx.store.payment(hold.order_id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.provider_status, "in_process");
        assert_eq!(fx.store.reservations().await[0].status, ReservationStatus::Pending);

        // A later approval still lands on the same payment record.
        assert_eq!(fx.approve(hold.order_id).await, FinalizationOutcome::Completed);
        assert_eq!(fx.store.payment(hold.order_id).await.unwrap().id, payment.id);
    }

    #[tokio::test]
    async fn test_voided_checkout_reference_no_longer_completes() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let silver = fx.seat("A1", 3).await;
        let platinum = fx.seat("P1", 1).await;

        let hold = fx
            .service
            .create_hold(user, fx.event_id, &[silver])
            .await
            .unwrap();
        let first = fx.service.checkout(user).await.unwrap();
        assert_eq!(first.total_amount, Decimal::new(4000, 2));

        fx.service
            .create_hold(user, fx.event_id, &[platinum])
            .await
            .unwrap();

        let stale = PaymentEvent {
            external_reference: first.external_reference.clone(),
            status: "approved".to_string(),
            provider_payment_id: "mp-stale".to_string(),
            amount: first.total_amount,
            currency: "USD".to_string(),
        };
        let err = fx.service.on_payment_event(&stale).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let order = fx.store.order(hold.order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cart);
        assert_eq!(order.total_amount, Decimal::new(16000, 2));
        assert!(!fx.store.seat(platinum).await.unwrap().is_reserved);
        assert!(fx
            .store
            .reservations()
            .await
            .iter()
            .all(|r| r.status == ReservationStatus::Pending));

        let second = fx.service.checkout(user).await.unwrap();
        assert_ne!(second.external_reference, first.external_reference);
        assert_eq!(fx.approve(hold.order_id).await, FinalizationOutcome::Completed);
        assert!(fx.store.seat(platinum).await.unwrap().is_reserved);
    }

    #[tokio::test]
    async fn test_oversold_stock_is_clamped_at_zero() {
        let fx = Fixture::new().await;
        let first = fx.user(1).await;
        let second = fx.user(1).await;
        let poster = fx.product("Poster", 1500, 1).await;

        let mut orders = Vec::new();
        for user in [first, second] {
            let cart = fx
                .service
                .write_cart(
                    user,
                    vec![CartItemInput::Product {
                        product_id: poster,
                        quantity: 1,
                    }],
                )
                .await
                .unwrap();
            orders.push(cart.order_id.unwrap());
        }

        for order_id in orders {
            assert_eq!(fx.approve(order_id).await, FinalizationOutcome::Completed);
        }
        assert_eq!(fx.store.product(poster).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let fx = Fixture::new().await;
        let event = PaymentEvent {
            external_reference: "does-not-exist".to_string(),
            status: "approved".to_string(),
            provider_payment_id: "mp-1".to_string(),
            amount: Decimal::new(1000, 2),
            currency: "USD".to_string(),
        };

        let err = fx.service.on_payment_event(&event).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_events_are_rejected() {
        let fx = Fixture::new().await;
        let valid = PaymentEvent {
            external_reference: Uuid::new_v4().simple().to_string(),
            status: "approved".to_string(),
            provider_payment_id: "mp-1".to_string(),
            amount: Decimal::new(1000, 2),
            currency: "USD".to_string(),
        };

        let cases = [
            PaymentEvent {
                external_reference: "  ".to_string(),
                ..valid.clone()
            },
            PaymentEvent {
                provider_payment_id: String::new(),
                ..valid.clone()
            },
            PaymentEvent {
                amount: Decimal::new(-1, 0),
                ..valid.clone()
            },
            PaymentEvent {
                currency: "US".to_string(),
                ..valid.clone()
            },
        ];

        for event in cases {
            let err = fx.service.on_payment_event(&event).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{event:?}");
        }
    }

    #[test]
    fn test_event_parses_provider_payload() {
        let event: PaymentEvent = serde_json::from_value(serde_json::json!({
            "externalReference": "abc123",
            "status": "approved",
            "providerPaymentId": "mp-42",
            "amount": "93.00",
            "currency": "usd"
        }))
        .unwrap();

        assert_eq!(event.amount, Decimal::new(9300, 2));
        assert!(event.validate().is_ok());
    }
}
