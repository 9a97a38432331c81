//! HTTP application wiring (Axum router + backend wiring).
//!
//! - `services.rs`: backend selection and shared state
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppState, build_state, in_memory_state};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(state.clone()))
        .layer(ServiceBuilder::new().layer(from_fn_with_state(state.clone(), middleware::session_middleware)))
        .with_state(state)
}
