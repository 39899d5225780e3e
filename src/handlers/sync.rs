// src/handlers/sync.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::sync::{SyncRequest, SyncResponse, SyncStatusResponse},
};

// POST /api/sync
#[utoipa::path(
    post,
    path = "/api/sync",
    tag = "Sync",
    request_body = SyncRequest,
    responses(
        (status = 200, description = "Resultado por tipo de entidade", body = SyncResponse),
        (status = 412, description = "Loja sem credencial ativa do POS")
    ),
    security(("api_jwt" = []))
)]
pub async fn trigger_sync(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    payload: Option<Json<SyncRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    payload.validate()?;

    let coordinator = &app_state.sync_coordinator;
    let results = match (&payload.entities, payload.force) {
        (Some(names), force) => coordinator.selective_sync(user.tenant_id, names, force).await?,
        (None, true) => coordinator.force_sync_all(user.tenant_id).await?,
        (None, false) => coordinator.sync_all(user.tenant_id).await?,
    };

    let response = SyncResponse { results, forced: payload.force, synced_at: Utc::now() };
    Ok((StatusCode::OK, Json(response)))
}

// GET /api/sync
#[utoipa::path(
    get,
    path = "/api/sync",
    tag = "Sync",
    responses(
        (status = 200, description = "Última sincronização de cada tipo", body = SyncStatusResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_sync_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let status = app_state.sync_coordinator.status(user.tenant_id).await?;
    Ok((StatusCode::OK, Json(SyncStatusResponse { status })))
}
