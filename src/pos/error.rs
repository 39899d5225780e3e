// src/pos/error.rs

use thiserror::Error;

// Falhas ao conversar com a API do POS.
// Todas viram `AppError::ExternalService` fora do adaptador.
#[derive(Debug, Error)]
pub enum PosError {
    #[error("Falha de rede ao chamar o POS: {0}")]
    Network(#[from] reqwest::Error),

    #[error("POS respondeu com status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("POS retornou erro {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Resposta do POS malformada: {0}")]
    Decode(String),
}
