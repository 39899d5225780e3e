// src/models/pos.rs

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ---
// Credencial do POS de um tenant
// ---
// `account_id` é a conta externa que chega nos webhooks.
#[derive(Debug, Clone, FromRow)]
pub struct PosCredential {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub account_id: String,
    pub access_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
