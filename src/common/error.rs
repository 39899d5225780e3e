// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::pos::PosError;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Payload inválido: {0}")]
    InvalidPayload(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Segredo do cron inválido")]
    InvalidCronSecret,

    // O POS está fora do ar, respondeu com erro ou devolveu JSON malformado
    #[error("Falha no serviço externo (POS): {0}")]
    ExternalService(#[from] PosError),

    #[error("Nenhuma credencial ativa para a conta '{0}'")]
    TenantNotResolved(String),

    #[error("Tenant {0} não possui credencial ativa do POS")]
    PosCredentialsMissing(Uuid),

    // Erros dentro da transação de sincronização (o rollback acontece no drop)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Só falhas do POS devem virar 5xx para o remetente de um webhook.
    pub fn is_external(&self) -> bool {
        matches!(self, AppError::ExternalService(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidPayload(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.".to_string()),
            AppError::InvalidCronSecret => (StatusCode::UNAUTHORIZED, "Segredo do cron inválido ou ausente.".to_string()),
            AppError::TenantNotResolved(_) => (StatusCode::NOT_FOUND, "not found".to_string()),
            AppError::PosCredentialsMissing(_) => (
                StatusCode::PRECONDITION_FAILED,
                "A loja não possui integração ativa com o POS.".to_string(),
            ),
            AppError::ExternalService(ref e) => {
                tracing::error!("Falha no POS: {}", e);
                (StatusCode::BAD_GATEWAY, "O POS não respondeu corretamente.".to_string())
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
