// src/db/catalog_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{
        Category, CategoryDraft, Product, ProductDraft, SectionDraft, StorageSection, Supplier,
        SupplierDraft,
    },
};

// Repositório do catálogo local (categorias, fornecedores, seções, produtos).
// Leituras trazem o conjunto inteiro do tenant numa query só; escritas são
// em lote via UNNEST, para não fazer uma ida ao banco por registro.
#[derive(Clone, Default)]
pub struct CatalogRepository;

impl CatalogRepository {
    pub fn new() -> Self {
        Self
    }

    // =========================================================================
    //  CATEGORIAS
    // =========================================================================

    pub async fn list_categories<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Category>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, tenant_id, name, default_supplier_id, external_category_id
            FROM categories WHERE tenant_id = $1 ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(categories)
    }

    pub async fn insert_categories<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        drafts: &[CategoryDraft],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if drafts.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO categories (tenant_id, name, external_category_id)
            SELECT $1, u.name, u.external_category_id
            FROM UNNEST($2::text[], $3::text[]) AS u(name, external_category_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(drafts.iter().map(|d| d.name.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.external_category_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Nome e id externo mudam; `default_supplier_id` é preservado.
    pub async fn update_categories<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        updates: &[(Uuid, CategoryDraft)],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE categories AS c
            SET name = u.name, external_category_id = u.external_category_id, updated_at = NOW()
            FROM UNNEST($2::uuid[], $3::text[], $4::text[]) AS u(id, name, external_category_id)
            WHERE c.id = u.id AND c.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(updates.iter().map(|(id, _)| *id).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.name.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.external_category_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  FORNECEDORES
    // =========================================================================

    pub async fn list_suppliers<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Supplier>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let suppliers = sqlx::query_as::<_, Supplier>(
            r#"
            SELECT id, tenant_id, name, phone, contact_info, external_id
            FROM suppliers WHERE tenant_id = $1 ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(suppliers)
    }

    pub async fn insert_suppliers<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        drafts: &[SupplierDraft],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if drafts.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO suppliers (tenant_id, name, phone, contact_info, external_id)
            SELECT $1, u.name, u.phone, u.contact_info, u.external_id
            FROM UNNEST($2::text[], $3::text[], $4::text[], $5::text[])
                AS u(name, phone, contact_info, external_id)
            "#,
        )
        .bind(tenant_id)
        .bind(drafts.iter().map(|d| d.name.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.phone.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.contact_info.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.external_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_suppliers<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        updates: &[(Uuid, SupplierDraft)],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE suppliers AS s
            SET name = u.name,
                phone = u.phone,
                contact_info = u.contact_info,
                external_id = u.external_id,
                updated_at = NOW()
            FROM UNNEST($2::uuid[], $3::text[], $4::text[], $5::text[], $6::text[])
                AS u(id, name, phone, contact_info, external_id)
            WHERE s.id = u.id AND s.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(updates.iter().map(|(id, _)| *id).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.name.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.phone.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.contact_info.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.external_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// As categorias que apontavam para eles ficam sem fornecedor padrão (FK SET NULL).
    pub async fn delete_suppliers<'e, E>(&self, executor: E, tenant_id: Uuid, ids: &[Uuid]) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM suppliers WHERE tenant_id = $1 AND id = ANY($2)")
            .bind(tenant_id)
            .bind(ids)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  SEÇÕES DE ESTOQUE
    // =========================================================================

    pub async fn list_sections<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<StorageSection>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sections = sqlx::query_as::<_, StorageSection>(
            r#"
            SELECT id, tenant_id, name, emoji, external_storage_id
            FROM storage_sections WHERE tenant_id = $1 ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(sections)
    }

    pub async fn insert_sections<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        drafts: &[SectionDraft],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if drafts.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO storage_sections (tenant_id, name, emoji, external_storage_id)
            SELECT $1, u.name, u.emoji, u.external_storage_id
            FROM UNNEST($2::text[], $3::text[], $4::text[]) AS u(name, emoji, external_storage_id)
            "#,
        )
        .bind(tenant_id)
        .bind(drafts.iter().map(|d| d.name.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.emoji.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.external_storage_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_sections<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        updates: &[(Uuid, SectionDraft)],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE storage_sections AS s
            SET name = u.name,
                emoji = u.emoji,
                external_storage_id = u.external_storage_id,
                updated_at = NOW()
            FROM UNNEST($2::uuid[], $3::text[], $4::text[], $5::text[])
                AS u(id, name, emoji, external_storage_id)
            WHERE s.id = u.id AND s.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(updates.iter().map(|(id, _)| *id).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.name.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.emoji.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.external_storage_id.clone()).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove apenas as seções sem produtos; retorna os ids realmente removidos.
    pub async fn delete_empty_sections<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let deleted: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            DELETE FROM storage_sections AS s
            WHERE s.tenant_id = $1
              AND s.id = ANY($2)
              AND NOT EXISTS (SELECT 1 FROM products p WHERE p.section_id = s.id)
            RETURNING s.id
            "#,
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(executor)
        .await?;
        Ok(deleted.into_iter().map(|(id,)| id).collect())
    }

    // =========================================================================
    //  PRODUTOS
    // =========================================================================

    pub async fn list_products<'e, E>(&self, executor: E, tenant_id: Uuid) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, tenant_id, section_id, external_ingredient_id, name, unit, category_id, is_active
            FROM products WHERE tenant_id = $1 ORDER BY id
            "#,
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    pub async fn insert_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        drafts: &[ProductDraft],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if drafts.is_empty() {
            return Ok(0);
        }

        // ON CONFLICT protege contra dois webhooks simultâneos do mesmo ingrediente
        let result = sqlx::query(
            r#"
            INSERT INTO products (tenant_id, section_id, external_ingredient_id, name, unit, category_id, is_active)
            SELECT $1, u.section_id, u.external_ingredient_id, u.name, u.unit, u.category_id, u.is_active
            FROM UNNEST($2::uuid[], $3::text[], $4::text[], $5::text[], $6::uuid[], $7::bool[])
                AS u(section_id, external_ingredient_id, name, unit, category_id, is_active)
            ON CONFLICT (section_id, external_ingredient_id) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(drafts.iter().map(|d| d.section_id).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.external_ingredient_id.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.name.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.unit.clone()).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.category_id).collect::<Vec<_>>())
        .bind(drafts.iter().map(|d| d.is_active).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        updates: &[(Uuid, ProductDraft)],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE products AS p
            SET name = u.name,
                unit = u.unit,
                category_id = u.category_id,
                is_active = u.is_active,
                updated_at = NOW()
            FROM UNNEST($2::uuid[], $3::text[], $4::text[], $5::uuid[], $6::bool[])
                AS u(id, name, unit, category_id, is_active)
            WHERE p.id = u.id AND p.tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(updates.iter().map(|(id, _)| *id).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.name.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.unit.clone()).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.category_id).collect::<Vec<_>>())
        .bind(updates.iter().map(|(_, d)| d.is_active).collect::<Vec<_>>())
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Desativa (nunca apaga) os produtos vindos do POS com este id externo.
    /// Produtos "custom" não são tocados.
    pub async fn deactivate_products_by_external_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        external_ingredient_id: &str,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = FALSE, updated_at = NOW()
            WHERE tenant_id = $1
              AND external_ingredient_id = $2
              AND is_active
              AND external_ingredient_id NOT LIKE 'custom\_%'
            "#,
        )
        .bind(tenant_id)
        .bind(external_ingredient_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
