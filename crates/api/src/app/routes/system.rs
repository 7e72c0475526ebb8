use axum::{Json, extract::Extension, http::StatusCode};

use printfarm_infra::scheduler::SchedulerStats;

use crate::app::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn scheduler_stats(Extension(services): Extension<AppServices>) -> Json<SchedulerStats> {
    Json(services.stats.snapshot())
}
