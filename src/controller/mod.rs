use axum::{http, response::IntoResponse};
use tower_http::cors::CorsLayer;

use crate::service::app_state::{StateRouter, create_state_router};
use generation::create_generation_router;

mod error;
mod generation;

pub use error::BaseError;

pub fn create_router() -> StateRouter {
    create_state_router()
        .merge(create_generation_router())
        .layer(CorsLayer::permissive())
        .fallback(handle_404)
}

pub async fn handle_404() -> impl IntoResponse {
    (http::StatusCode::NOT_FOUND, "not found")
}
