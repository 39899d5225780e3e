// src/handlers/webhooks.rs

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    models::webhook::{WebhookAck, WebhookPayload},
};

// POST /api/webhooks/pos
// O corpo é lido cru: JSON inválido também é auditado e ignorado.
#[utoipa::path(
    post,
    path = "/api/webhooks/pos",
    tag = "Webhooks",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Processado ou ignorado", body = WebhookAck),
        (status = 404, description = "Conta sem credencial ativa"),
        (status = 502, description = "Falha do POS durante a ressincronização")
    )
)]
pub async fn receive_pos_webhook(
    State(app_state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let ack = app_state.webhook_service.handle_body(&body).await?;

    Ok((StatusCode::OK, Json(ack)))
}
