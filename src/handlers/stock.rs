// src/handlers/stock.rs

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser};

#[derive(Debug, Serialize, ToSchema)]
pub struct StockResponse {
    /// Saldo somado de todos os estoques, por id externo do ingrediente.
    #[schema(value_type = Object)]
    pub stock: HashMap<String, Decimal>,
}

// GET /api/stock
#[utoipa::path(
    get,
    path = "/api/stock",
    tag = "Stock",
    responses(
        (status = 200, description = "Saldos agregados do POS", body = StockResponse),
        (status = 502, description = "O POS não respondeu")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_stock(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let pos = app_state.sync_coordinator.pos_for_tenant(user.tenant_id).await?;
    let stock = app_state.leftover_service.get_stock(&pos).await?;

    Ok((StatusCode::OK, Json(StockResponse { stock })))
}
