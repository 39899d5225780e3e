// src/db/webhook_repo.rs

use serde_json::Value;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::webhook::{WebhookEvent, WebhookOutcome},
};

// Log de auditoria dos webhooks (somente inserção).
#[derive(Clone, Default)]
pub struct WebhookEventRepository;

impl WebhookEventRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn record<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        outcome: WebhookOutcome,
        object_type: &str,
        object_id: &str,
        action: &str,
        payload: &Value,
    ) -> Result<WebhookEvent, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let event = sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (tenant_id, webhook_type, object_type, object_id, action, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(outcome.as_str())
        .bind(object_type)
        .bind(object_id)
        .bind(action)
        .bind(payload)
        .fetch_one(executor)
        .await?;
        Ok(event)
    }
}
