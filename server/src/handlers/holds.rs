use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::services::SeatingService;
use crate::store::Store;
use crate::utils::error::AppError;
use crate::utils::response::created;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub event_id: Uuid,
    pub seat_ids: Vec<Uuid>,
}

pub async fn create_hold<S: Store>(
    State(service): State<SeatingService<S>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateHoldRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;

    let hold = service
        .create_hold(user_id, request.event_id, &request.seat_ids)
        .await?;

    Ok(created(hold, "Seats held"))
}
