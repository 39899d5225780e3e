// src/db/sync_state_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::sync::{EntityType, SyncState},
};

// Persistência do rastreador de "staleness".
#[derive(Clone, Default)]
pub struct SyncStateRepository;

impl SyncStateRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn list_for_tenant<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<SyncState>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let states = sqlx::query_as::<_, SyncState>(
            "SELECT tenant_id, entity_type, last_synced_at FROM sync_states WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(states)
    }

    /// UPSERT: uma linha por (tenant, tipo de entidade).
    pub async fn mark_synced<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entity_type: EntityType,
        synced_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO sync_states (tenant_id, entity_type, last_synced_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, entity_type)
            DO UPDATE SET last_synced_at = EXCLUDED.last_synced_at
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type.as_str())
        .bind(synced_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}
