//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backends and scheduler startup
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use axum::{
    Extension, Router,
    routing::{get, post},
};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/scheduler/stats", get(routes::system::scheduler_stats))
        .route("/jobs/:id/done", post(routes::jobs::mark_done))
        .layer(Extension(services))
}
