// src/models/webhook.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Tenant "sentinela" dos eventos cujo `account_id` não casou com nenhuma credencial.
pub const UNMATCHED_TENANT: Uuid = Uuid::nil();

// ---
// 1. Payload recebido do POS
// ---
// Campos como `Option` para que um corpo incompleto ainda seja lido
// e recusado pela validação (e não pelo extrator JSON).
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct WebhookPayload {
    pub account: Option<String>,

    #[validate(required(message = "O campo 'account_id' é obrigatório."))]
    #[serde(default, deserialize_with = "lenient_string")]
    pub account_id: Option<String>,

    #[validate(required(message = "O campo 'object' é obrigatório."))]
    pub object: Option<String>,

    #[validate(required(message = "O campo 'object_id' é obrigatório."))]
    #[serde(default, deserialize_with = "lenient_string")]
    pub object_id: Option<String>,

    #[validate(required(message = "O campo 'action' é obrigatório."))]
    pub action: Option<String>,

    pub time: Option<Value>,

    // Assinatura do POS; guardada no payload auditado, ainda não verificada.
    pub verify: Option<String>,
}

// Aceita número ou texto, descartando strings vazias.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---
// 2. Destino do despacho
// ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTarget {
    Ingredient(String),
    Supplier(i64),
    Storages,
}

impl WebhookTarget {
    /// Traduz `object`/`object_id` para a ressincronização correspondente.
    pub fn from_payload(object: &str, object_id: &str) -> Result<Self, String> {
        match object {
            "product" | "ingredient" => Ok(WebhookTarget::Ingredient(object_id.to_string())),
            "supplier" => object_id
                .parse::<i64>()
                .map(WebhookTarget::Supplier)
                .map_err(|_| format!("object_id '{object_id}' não é numérico")),
            "storage" => Ok(WebhookTarget::Storages),
            other => Err(format!("objeto '{other}' não suportado")),
        }
    }
}

// ---
// 3. Auditoria
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Payload ilegível ou incompleto; registrado sob o tenant sentinela.
    Ignored,
    UnmatchedTenant,
    /// A consulta da credencial falhou antes de o tenant ser conhecido.
    LookupFailed,
    DispatchFailed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::UnmatchedTenant => "unmatched_tenant",
            WebhookOutcome::LookupFailed => "lookup_failed",
            WebhookOutcome::DispatchFailed => "dispatch_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub webhook_type: String,
    pub object_type: String,
    pub object_id: String,
    pub action: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
