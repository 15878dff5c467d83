use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use super::auth::AuthUser;
use crate::models::CartItemInput;
use crate::services::SeatingService;
use crate::store::Store;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct SyncCartRequest {
    pub items: Vec<CartItemInput>,
}

pub async fn get_cart<S: Store>(
    State(service): State<SeatingService<S>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, AppError> {
    let cart = service.read_cart(user_id).await?;
    Ok(success(cart, "Cart retrieved"))
}

/// The response replaces the client's cached cart wholesale.
pub async fn sync_cart<S: Store>(
    State(service): State<SeatingService<S>>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<SyncCartRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let cart = service.write_cart(user_id, request.items).await?;
    Ok(success(cart, "Cart synchronized"))
}

pub async fn checkout<S: Store>(
    State(service): State<SeatingService<S>>,
    AuthUser(user_id): AuthUser,
) -> Result<Response, AppError> {
    let summary = service.checkout(user_id).await?;
    Ok(success(summary, "Checkout started"))
}
