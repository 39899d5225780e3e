// src/common/db_utils.rs

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Gateway de armazenamento por tenant
// ---
// `begin` abre uma transação já com a "chave" RLS do tenant.
// Se a transação for descartada sem `commit`, o sqlx faz rollback.
#[derive(Clone)]
pub struct TenantGateway {
    pool: PgPool,
}

impl TenantGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// withTenant: transação escopada ao tenant.
    pub async fn begin(&self, tenant_id: Uuid) -> Result<Transaction<'static, Postgres>, AppError> {
        let mut tx = self.pool.begin().await?;

        // `true` => a configuração vale só para esta transação
        sqlx::query("SELECT set_config('app.tenant_id', $1, true)")
            .bind(tenant_id.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    /// withoutTenant: consultas entre tenants (ex.: resolver a conta do webhook).
    pub fn untenanted(&self) -> &PgPool {
        &self.pool
    }
}
