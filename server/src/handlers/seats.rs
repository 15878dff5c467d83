use axum::extract::{Path, State};
use axum::response::Response;
use uuid::Uuid;

use crate::services::SeatingService;
use crate::store::Store;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_seats<S: Store>(
    State(service): State<SeatingService<S>>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let seats = service.list_seats(event_id).await?;
    Ok(success(seats, "Seats retrieved"))
}
