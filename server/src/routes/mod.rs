use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers, Config};
use crate::handlers::{cart, health_check, holds, seats, webhooks};
use crate::services::SeatingService;
use crate::store::Store;

pub fn create_routes<S: Store>(service: SeatingService<S>, config: &Config) -> Router {
    let api = Router::new()
        .route("/events/:event_id/seats", get(seats::list_seats::<S>))
        .route("/holds", post(holds::create_hold::<S>))
        .route("/cart", get(cart::get_cart::<S>).put(cart::sync_cart::<S>))
        .route("/cart/checkout", post(cart::checkout::<S>))
        .route("/webhooks/payments", post(webhooks::payment_webhook::<S>));

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(service);

    with_security_headers(router, config.production)
        .layer(create_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
