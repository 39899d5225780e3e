// src/db/credential_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::pos::PosCredential};

// Credenciais do POS. Estas consultas rodam sem escopo de tenant.
#[derive(Clone, Default)]
pub struct PosCredentialRepository;

impl PosCredentialRepository {
    pub fn new() -> Self {
        Self
    }

    /// Resolve o tenant de um webhook pela conta externa.
    pub async fn find_active_by_account<'e, E>(
        &self,
        executor: E,
        account_id: &str,
    ) -> Result<Option<PosCredential>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let credential = sqlx::query_as::<_, PosCredential>(
            r#"
            SELECT * FROM pos_credentials
            WHERE account_id = $1 AND is_active
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(executor)
        .await?;
        Ok(credential)
    }

    pub async fn find_active_for_tenant<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Option<PosCredential>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let credential = sqlx::query_as::<_, PosCredential>(
            "SELECT * FROM pos_credentials WHERE tenant_id = $1 AND is_active",
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(credential)
    }

    /// Tenants elegíveis para o agendador.
    pub async fn list_active<'e, E>(&self, executor: E) -> Result<Vec<PosCredential>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let credentials = sqlx::query_as::<_, PosCredential>(
            "SELECT * FROM pos_credentials WHERE is_active ORDER BY created_at",
        )
        .fetch_all(executor)
        .await?;
        Ok(credentials)
    }
}
