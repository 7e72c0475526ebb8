use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::info;

use printfarm_core::JobId;

use crate::app::AppServices;
use crate::app::dto::JobResponse;
use crate::app::errors::{job_store_error_to_response, json_error};

/// Confirm pickup: AwaitingPickup -> Done.
///
/// The printer becomes free, so a dispatcher tick is requested right away.
pub async fn mark_done(
    Extension(services): Extension<AppServices>,
    Path(id): Path<String>,
) -> Response {
    let id: JobId = match id.parse() {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{e}")),
    };

    match services.jobs.mark_done(id).await {
        Ok(job) => {
            info!(job_id = %id, "pickup confirmed");
            services.dispatch.fire();
            (StatusCode::OK, Json(JobResponse::from(job))).into_response()
        }
        Err(e) => job_store_error_to_response(e),
    }
}
