use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::services::{PaymentEvent, SeatingService};
use crate::store::Store;
use crate::utils::error::AppError;
use crate::utils::response::success;

/// Inbound payment-provider callback. Replays answer 200 so the provider
/// stops retrying.
pub async fn payment_webhook<S: Store>(
    State(service): State<SeatingService<S>>,
    payload: Result<Json<PaymentEvent>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(event) = payload?;
    let outcome = service.on_payment_event(&event).await?;
    Ok(success(outcome, "Payment event processed"))
}
