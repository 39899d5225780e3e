// src/handlers/cron.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{common::error::AppError, config::AppState, models::sync::SchedulerSummary};

// GET /api/cron/sync
#[utoipa::path(
    get,
    path = "/api/cron/sync",
    tag = "Cron",
    responses(
        (status = 200, description = "Resumo da passada por todas as lojas", body = SchedulerSummary),
        (status = 401, description = "Segredo do cron inválido")
    ),
    security(("cron_secret" = []))
)]
pub async fn run_scheduled_sync(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.scheduler_service.run().await?;
    Ok((StatusCode::OK, Json(summary)))
}
