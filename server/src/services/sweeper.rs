//! Removal of stale, unconfirmed holds.

use chrono::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SeatingService;
use crate::store::{Store, StoreTx};
use crate::utils::error::AppError;

impl<S: Store> SeatingService<S> {
    /// Deletes pending reservations created more than `ttl` ago, optionally
    /// scoped to one event. Returns how many rows went away; zero is normal.
    pub async fn sweep(&self, event_id: Option<Uuid>, ttl: Duration) -> Result<u64, AppError> {
        let cutoff = self.now() - ttl;

        let mut tx = self.store.begin().await?;
        let removed = tx.delete_stale_reservations(event_id, cutoff).await?;
        tx.commit().await?;

        if removed > 0 {
            info!(?event_id, removed, "Swept expired reservations");
        } else {
            debug!(?event_id, "No expired reservations to sweep");
        }

        Ok(removed)
    }

    /// Sweeps with the configured TTL and never fails the caller.
    pub(crate) async fn sweep_best_effort(&self, event_id: Option<Uuid>) -> u64 {
        match self.sweep(event_id, self.hold_ttl).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(?event_id, error = %e, "Reservation sweep failed, continuing");
                0
            }
        }
    }
}

/// Runs the sweeper over every event on a fixed period.
pub fn spawn_periodic_sweep<S: Store>(
    service: SeatingService<S>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            service.sweep_best_effort(None).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::services::test_support::Fixture;

    #[tokio::test]
    async fn test_hold_is_active_before_ttl_and_gone_after() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let seat = fx.seat("A1", 3).await;

        fx.service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();

        fx.clock.advance(Duration::minutes(14));
        assert_eq!(fx.service.sweep(None, Duration::minutes(15)).await.unwrap(), 0);
        assert_eq!(fx.store.reservations().await.len(), 1);

        fx.clock.advance(Duration::minutes(2));
        assert_eq!(fx.service.sweep(None, Duration::minutes(15)).await.unwrap(), 1);
        assert!(fx.store.reservations().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let seat = fx.seat("A1", 3).await;
        fx.service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();

        fx.clock.advance(Duration::minutes(30));
        assert_eq!(fx.service.sweep(None, Duration::minutes(15)).await.unwrap(), 1);
        assert_eq!(fx.service.sweep(None, Duration::minutes(15)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_respects_event_scope() {
        let fx = Fixture::new().await;
        let other = fx.second_event().await;
        let user = fx.user(1).await;
        let here = fx.seat("A1", 3).await;
        let there = fx.seat_in(other, "B1", 3).await;

        fx.service
            .create_hold(user, fx.event_id, &[here])
            .await
            .unwrap();
        fx.service.create_hold(user, other, &[there]).await.unwrap();

        fx.clock.advance(Duration::minutes(20));
        let removed = fx
            .service
            .sweep(Some(fx.event_id), Duration::minutes(15))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let left = fx.store.reservations().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].seat_id, there);
    }

    #[tokio::test]
    async fn test_confirmed_reservations_are_never_swept() {
        let fx = Fixture::new().await;
        let user = fx.user(1).await;
        let seat = fx.seat("A1", 3).await;
        let hold = fx
            .service
            .create_hold(user, fx.event_id, &[seat])
            .await
            .unwrap();
        fx.approve(hold.order_id).await;

        fx.clock.advance(Duration::hours(2));
        assert_eq!(fx.service.sweep(None, Duration::minutes(15)).await.unwrap(), 0);
        assert_eq!(fx.store.reservations().await.len(), 1);
    }
}
