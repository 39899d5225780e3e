// src/services/catalog_sync_service.rs

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    common::{db_utils::TenantGateway, error::AppError},
    db::{CatalogRepository, SyncStateRepository},
    models::{
        catalog::{
            is_custom_ingredient_id, Category, CategoryDraft, Product, ProductDraft, SectionDraft, StorageSection,
            Supplier, SupplierDraft,
        },
        sync::{EntityType, SyncCounts},
    },
    pos::{
        records::{PosCategory, PosIngredient, PosStorage, PosSupplier},
        PosApi,
    },
    services::{
        leftover_service::LeftoverService,
        reconciliation::{merge_external_first, merge_local_first, normalize_name, Resolution, Resolver},
    },
};

const DEFAULT_SECTION_EMOJI: &str = "📦";

/// Resultado de uma ressincronização de um único objeto (webhook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResyncOutcome {
    Created,
    Updated,
    Linked,
    Removed,
    Unchanged,
}

// =========================================================================
//  PLANEJAMENTO (puro)
// =========================================================================

#[derive(Debug, Default, PartialEq)]
pub struct CategoryPlan {
    pub inserts: Vec<CategoryDraft>,
    pub updates: Vec<(Uuid, CategoryDraft)>,
}

#[derive(Debug, Default, PartialEq)]
pub struct SupplierPlan {
    pub inserts: Vec<SupplierDraft>,
    pub updates: Vec<(Uuid, SupplierDraft)>,
    pub deletes: Vec<Uuid>,
    pub linked: u32,
}

#[derive(Debug, Default, PartialEq)]
pub struct SectionPlan {
    pub inserts: Vec<SectionDraft>,
    pub updates: Vec<(Uuid, SectionDraft)>,
    pub delete_candidates: Vec<Uuid>,
    pub linked: u32,
}

#[derive(Debug, Default, PartialEq)]
pub struct ProductPlan {
    pub inserts: Vec<ProductDraft>,
    pub updates: Vec<(Uuid, ProductDraft)>,
}

impl ProductPlan {
    fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Categorias casam pelo nome (sem diferenciar maiúsculas); a grafia do POS vence.
/// O id externo acompanha o nome; uma linha que perdeu o nome para outra perde o id.
pub fn plan_categories(external: &[PosCategory], locals: &[Category]) -> CategoryPlan {
    let mut by_name: HashMap<String, &Category> = HashMap::new();
    for category in locals {
        by_name.entry(normalize_name(&category.name)).or_insert(category);
    }

    let mut plan = CategoryPlan::default();
    let mut seen = HashSet::new();
    let mut matched = HashSet::new();
    let mut claimed = HashSet::new();

    for ext in external {
        let key = normalize_name(&ext.name);
        if !seen.insert(key.clone()) {
            continue;
        }
        claimed.insert(ext.id.as_str());

        let draft = CategoryDraft { name: ext.name.clone(), external_category_id: Some(ext.id.clone()) };
        match by_name.get(&key) {
            Some(local) => {
                matched.insert(local.id);
                if local.name != draft.name || local.external_category_id != draft.external_category_id {
                    plan.updates.push((local.id, draft));
                }
            }
            None => plan.inserts.push(draft),
        }
    }

    for local in locals.iter().filter(|c| !matched.contains(&c.id)) {
        if local.external_category_id.as_deref().is_some_and(|id| claimed.contains(id)) {
            plan.updates.push((
                local.id,
                CategoryDraft { name: local.name.clone(), external_category_id: None },
            ));
        }
    }

    plan
}

// Resolve cada fornecedor externo sem a varredura de removidos.
fn reconcile_suppliers(external: &[PosSupplier], locals: &[Supplier]) -> (SupplierPlan, HashSet<String>) {
    let by_id: HashMap<Uuid, &Supplier> = locals.iter().map(|s| (s.id, s)).collect();
    let mut resolver = Resolver::new(locals);
    let mut plan = SupplierPlan::default();
    let mut seen = HashSet::new();

    for ext in external {
        if !seen.insert(ext.id.clone()) {
            continue;
        }

        match resolver.resolve(&ext.id, &ext.name) {
            Resolution::Update(id) => {
                let local = by_id[&id];
                let draft = SupplierDraft {
                    name: ext.name.clone(),
                    phone: merge_external_first(local.phone.as_deref(), ext.phone.as_deref()),
                    contact_info: merge_external_first(
                        local.contact_info.as_deref(),
                        ext.contact_info.as_deref(),
                    ),
                    external_id: Some(ext.id.clone()),
                };
                if !supplier_matches(local, &draft) {
                    plan.updates.push((id, draft));
                }
            }
            Resolution::Link(id) => {
                let local = by_id[&id];
                plan.updates.push((
                    id,
                    SupplierDraft {
                        name: local.name.clone(),
                        phone: merge_local_first(local.phone.as_deref(), ext.phone.as_deref()),
                        contact_info: merge_local_first(
                            local.contact_info.as_deref(),
                            ext.contact_info.as_deref(),
                        ),
                        external_id: Some(ext.id.clone()),
                    },
                ));
                plan.linked += 1;
            }
            Resolution::Create => plan.inserts.push(SupplierDraft {
                name: ext.name.clone(),
                phone: ext.phone.clone(),
                contact_info: ext.contact_info.clone(),
                external_id: Some(ext.id.clone()),
            }),
        }
    }

    (plan, seen)
}

/// Varredura: só fornecedores ligados cujo id sumiu do POS são removidos.
/// Fornecedores "custom" sem par no POS ficam intocados.
pub fn plan_suppliers(external: &[PosSupplier], locals: &[Supplier]) -> SupplierPlan {
    let (mut plan, seen) = reconcile_suppliers(external, locals);

    plan.deletes = locals
        .iter()
        .filter(|s| s.external_id.as_ref().is_some_and(|ext| !seen.contains(ext)))
        .map(|s| s.id)
        .collect();

    plan
}

fn supplier_matches(local: &Supplier, draft: &SupplierDraft) -> bool {
    local.name == draft.name
        && local.phone == draft.phone
        && local.contact_info == draft.contact_info
        && local.external_id == draft.external_id
}

pub fn plan_sections(external: &[PosStorage], locals: &[StorageSection]) -> SectionPlan {
    let by_id: HashMap<Uuid, &StorageSection> = locals.iter().map(|s| (s.id, s)).collect();
    let mut resolver = Resolver::new(locals);
    let mut plan = SectionPlan::default();
    let mut seen = HashSet::new();

    for ext in external {
        if !seen.insert(ext.id.clone()) {
            continue;
        }

        match resolver.resolve(&ext.id, &ext.name) {
            Resolution::Update(id) => {
                let local = by_id[&id];
                if local.name != ext.name {
                    plan.updates.push((
                        id,
                        SectionDraft {
                            name: ext.name.clone(),
                            emoji: local.emoji.clone(),
                            external_storage_id: Some(ext.id.clone()),
                        },
                    ));
                }
            }
            Resolution::Link(id) => {
                let local = by_id[&id];
                plan.updates.push((
                    id,
                    SectionDraft {
                        name: local.name.clone(),
                        emoji: local.emoji.clone(),
                        external_storage_id: Some(ext.id.clone()),
                    },
                ));
                plan.linked += 1;
            }
            Resolution::Create => plan.inserts.push(SectionDraft {
                name: ext.name.clone(),
                emoji: DEFAULT_SECTION_EMOJI.to_string(),
                external_storage_id: Some(ext.id.clone()),
            }),
        }
    }

    plan.delete_candidates = locals
        .iter()
        .filter(|s| s.external_storage_id.as_ref().is_some_and(|ext| !seen.contains(ext)))
        .map(|s| s.id)
        .collect();

    plan
}

/// Regra de pertencimento: estoque com saldos => só os ingredientes com saldo;
/// estoque sem nenhum saldo (novo/vazio) => todos os ingredientes.
pub fn ingredients_for_section<'a>(
    ingredients: &'a [PosIngredient],
    present: &HashSet<String>,
) -> Vec<&'a PosIngredient> {
    if present.is_empty() {
        return ingredients.iter().collect();
    }
    ingredients.iter().filter(|ing| present.contains(&ing.id)).collect()
}

/// id externo da categoria -> id local, a partir do que a sincronização de categorias gravou.
pub fn index_categories(locals: &[Category]) -> HashMap<String, Uuid> {
    locals
        .iter()
        .filter_map(|c| c.external_category_id.clone().map(|ext| (ext, c.id)))
        .collect()
}

/// Entradas compartilhadas pelo planejamento de ingredientes.
/// `membership`: `None` quando os saldos do estoque não puderam ser lidos.
pub struct IngredientContext<'a> {
    pub sections: &'a [StorageSection],
    pub membership: &'a HashMap<String, Option<HashSet<String>>>,
    pub categories: &'a HashMap<String, Uuid>,
    pub products: &'a [Product],
}

impl IngredientContext<'_> {
    fn draft_for(&self, section_id: Uuid, ing: &PosIngredient, existing: Option<&Product>) -> ProductDraft {
        let category_id = ing
            .category_id
            .as_ref()
            .and_then(|ext| self.categories.get(ext).copied())
            .or_else(|| existing.and_then(|p| p.category_id));

        ProductDraft {
            section_id,
            external_ingredient_id: ing.id.clone(),
            name: ing.name.clone(),
            unit: merge_external_first(existing.and_then(|p| p.unit.as_deref()), ing.unit.as_deref()),
            category_id,
            is_active: true,
        }
    }
}

fn product_matches(local: &Product, draft: &ProductDraft) -> bool {
    local.name == draft.name
        && local.unit == draft.unit
        && local.category_id == draft.category_id
        && local.is_active == draft.is_active
}

/// Cria ou atualiza por (seção, id externo). Linhas não vistas ficam como estão.
/// Seção com saldos desconhecidos não ganha produtos novos; só os existentes são atualizados.
pub fn plan_ingredients(ingredients: &[PosIngredient], ctx: &IngredientContext<'_>) -> ProductPlan {
    let existing: HashMap<(Uuid, &str), &Product> = ctx
        .products
        .iter()
        .map(|p| ((p.section_id, p.external_ingredient_id.as_str()), p))
        .collect();

    let mut plan = ProductPlan::default();

    for section in ctx.sections {
        let Some(storage_id) = section.external_storage_id.as_deref() else {
            continue;
        };

        let candidates = match ctx.membership.get(storage_id) {
            Some(Some(present)) => ingredients_for_section(ingredients, present),
            _ => ingredients
                .iter()
                .filter(|ing| existing.contains_key(&(section.id, ing.id.as_str())))
                .collect(),
        };

        let mut seen = HashSet::new();
        for ing in candidates {
            if is_custom_ingredient_id(&ing.id) || !seen.insert(ing.id.as_str()) {
                continue;
            }

            match existing.get(&(section.id, ing.id.as_str())) {
                Some(product) => {
                    let draft = ctx.draft_for(section.id, ing, Some(product));
                    if !product_matches(product, &draft) {
                        plan.updates.push((product.id, draft));
                    }
                }
                None => plan.inserts.push(ctx.draft_for(section.id, ing, None)),
            }
        }
    }

    plan
}

#[derive(Debug, PartialEq)]
pub enum SupplierResync {
    Upsert(SupplierPlan),
    Delete(Uuid),
    Noop,
}

/// Mesmo resultado para added/changed/removed: o que vale é o estado atual no POS.
pub fn plan_supplier_resync(
    fetched: Option<&PosSupplier>,
    external_id: &str,
    locals: &[Supplier],
) -> SupplierResync {
    match fetched {
        Some(ext) => {
            let (plan, _) = reconcile_suppliers(std::slice::from_ref(ext), locals);
            if plan.inserts.is_empty() && plan.updates.is_empty() {
                SupplierResync::Noop
            } else {
                SupplierResync::Upsert(plan)
            }
        }
        None => locals
            .iter()
            .find(|s| s.external_id.as_deref() == Some(external_id))
            .map(|s| SupplierResync::Delete(s.id))
            .unwrap_or(SupplierResync::Noop),
    }
}

#[derive(Debug, PartialEq)]
pub enum IngredientResync {
    Upsert(ProductPlan),
    Deactivate,
    Noop,
}

pub fn plan_ingredient_resync(
    fetched: Option<&PosIngredient>,
    external_id: &str,
    ctx: &IngredientContext<'_>,
) -> IngredientResync {
    match fetched {
        Some(ing) => {
            let mut plan = plan_ingredients(std::slice::from_ref(ing), ctx);

            // Linhas existentes em seções fora da regra também recebem os dados novos
            let planned: HashSet<Uuid> = plan.updates.iter().map(|(id, _)| *id).collect();

            for product in ctx.products.iter().filter(|p| p.external_ingredient_id == ing.id) {
                if planned.contains(&product.id) {
                    continue;
                }
                let draft = ctx.draft_for(product.section_id, ing, Some(product));
                if !product_matches(product, &draft) {
                    plan.updates.push((product.id, draft));
                }
            }

            if plan.is_empty() {
                IngredientResync::Noop
            } else {
                IngredientResync::Upsert(plan)
            }
        }
        None => {
            let has_active = ctx.products.iter().any(|p| {
                p.external_ingredient_id == external_id && p.is_active && !p.is_custom()
            });
            if has_active {
                IngredientResync::Deactivate
            } else {
                IngredientResync::Noop
            }
        }
    }
}

// =========================================================================
//  SERVIÇO (aplica os planos dentro da transação do tenant)
// =========================================================================

#[derive(Clone)]
pub struct CatalogSyncService {
    gateway: TenantGateway,
    catalog_repo: CatalogRepository,
    sync_state_repo: SyncStateRepository,
    leftover_service: LeftoverService,
}

impl CatalogSyncService {
    pub fn new(
        gateway: TenantGateway,
        catalog_repo: CatalogRepository,
        sync_state_repo: SyncStateRepository,
        leftover_service: LeftoverService,
    ) -> Self {
        Self { gateway, catalog_repo, sync_state_repo, leftover_service }
    }

    pub async fn sync(&self, pos: &dyn PosApi, tenant_id: Uuid, entity: EntityType) -> Result<SyncCounts, AppError> {
        match entity {
            EntityType::Categories => self.sync_categories(pos, tenant_id).await,
            EntityType::Suppliers => self.sync_suppliers(pos, tenant_id).await,
            EntityType::Storages => self.sync_storages(pos, tenant_id).await,
            EntityType::Ingredients => self.sync_ingredients(pos, tenant_id).await,
        }
    }

    // --- CATEGORIAS ---
    pub async fn sync_categories(&self, pos: &dyn PosApi, tenant_id: Uuid) -> Result<SyncCounts, AppError> {
        // 1. Lista externa (falha aqui aborta só esta entidade)
        let external = pos.get_categories().await?;

        // 2. Conjunto local inteiro, numa query
        let mut tx = self.gateway.begin(tenant_id).await?;
        let locals = self.catalog_repo.list_categories(&mut *tx, tenant_id).await?;

        // 3. Diferença em memória + escrita em lote
        let plan = plan_categories(&external, &locals);
        let updated = self.catalog_repo.update_categories(&mut *tx, tenant_id, &plan.updates).await?;
        let created = self.catalog_repo.insert_categories(&mut *tx, tenant_id, &plan.inserts).await?;

        // 4. Marca como sincronizado e confirma
        self.sync_state_repo
            .mark_synced(&mut *tx, tenant_id, EntityType::Categories, Utc::now())
            .await?;
        tx.commit().await?;

        let counts = SyncCounts {
            created: created as u32,
            updated: updated as u32,
            deleted: 0,
            total: external.len() as u32,
        };
        tracing::info!(tenant_id = %tenant_id, entity = "categories", ?counts, "Sincronização concluída");
        Ok(counts)
    }

    // --- FORNECEDORES ---
    pub async fn sync_suppliers(&self, pos: &dyn PosApi, tenant_id: Uuid) -> Result<SyncCounts, AppError> {
        let external = pos.get_suppliers().await?;

        let mut tx = self.gateway.begin(tenant_id).await?;
        let locals = self.catalog_repo.list_suppliers(&mut *tx, tenant_id).await?;

        let plan = plan_suppliers(&external, &locals);
        let updated = self.catalog_repo.update_suppliers(&mut *tx, tenant_id, &plan.updates).await?;
        let created = self.catalog_repo.insert_suppliers(&mut *tx, tenant_id, &plan.inserts).await?;
        let deleted = self.catalog_repo.delete_suppliers(&mut *tx, tenant_id, &plan.deletes).await?;

        self.sync_state_repo
            .mark_synced(&mut *tx, tenant_id, EntityType::Suppliers, Utc::now())
            .await?;
        tx.commit().await?;

        let counts = SyncCounts {
            created: created as u32,
            updated: updated as u32,
            deleted: deleted as u32,
            total: external.len() as u32,
        };
        tracing::info!(
            tenant_id = %tenant_id, entity = "suppliers", linked = plan.linked, ?counts,
            "Sincronização concluída"
        );
        Ok(counts)
    }

    // --- SEÇÕES (ESTOQUES) ---
    pub async fn sync_storages(&self, pos: &dyn PosApi, tenant_id: Uuid) -> Result<SyncCounts, AppError> {
        let external = pos.get_storages().await?;

        let mut tx = self.gateway.begin(tenant_id).await?;
        let locals = self.catalog_repo.list_sections(&mut *tx, tenant_id).await?;

        let plan = plan_sections(&external, &locals);
        let updated = self.catalog_repo.update_sections(&mut *tx, tenant_id, &plan.updates).await?;
        let created = self.catalog_repo.insert_sections(&mut *tx, tenant_id, &plan.inserts).await?;
        let deleted = self
            .catalog_repo
            .delete_empty_sections(&mut *tx, tenant_id, &plan.delete_candidates)
            .await?;

        let kept = plan.delete_candidates.len() - deleted.len();
        if kept > 0 {
            tracing::warn!(
                tenant_id = %tenant_id, kept,
                "Estoques removidos do POS mantidos localmente por ainda terem produtos"
            );
        }

        self.sync_state_repo
            .mark_synced(&mut *tx, tenant_id, EntityType::Storages, Utc::now())
            .await?;
        tx.commit().await?;

        let counts = SyncCounts {
            created: created as u32,
            updated: updated as u32,
            deleted: deleted.len() as u32,
            total: external.len() as u32,
        };
        tracing::info!(
            tenant_id = %tenant_id, entity = "storages", linked = plan.linked, ?counts,
            "Sincronização concluída"
        );
        Ok(counts)
    }

    // --- INGREDIENTES ---
    pub async fn sync_ingredients(&self, pos: &dyn PosApi, tenant_id: Uuid) -> Result<SyncCounts, AppError> {
        let ingredients = pos.get_ingredients().await?;
        let (sections, membership) = self.ingredient_inputs(pos, tenant_id).await?;

        // Fase de escrita: a transação só abre depois de toda a I/O com o POS
        let mut tx = self.gateway.begin(tenant_id).await?;
        let local_categories = self.catalog_repo.list_categories(&mut *tx, tenant_id).await?;
        let products = self.catalog_repo.list_products(&mut *tx, tenant_id).await?;
        let category_map = index_categories(&local_categories);

        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &category_map,
            products: &products,
        };
        let plan = plan_ingredients(&ingredients, &ctx);

        let updated = self.catalog_repo.update_products(&mut *tx, tenant_id, &plan.updates).await?;
        let created = self.catalog_repo.insert_products(&mut *tx, tenant_id, &plan.inserts).await?;

        self.sync_state_repo
            .mark_synced(&mut *tx, tenant_id, EntityType::Ingredients, Utc::now())
            .await?;
        tx.commit().await?;

        let counts = SyncCounts {
            created: created as u32,
            updated: updated as u32,
            deleted: 0,
            total: ingredients.len() as u32,
        };
        tracing::info!(tenant_id = %tenant_id, entity = "ingredients", ?counts, "Sincronização concluída");
        Ok(counts)
    }

    // Seções ligadas e saldos por estoque.
    async fn ingredient_inputs(
        &self,
        pos: &dyn PosApi,
        tenant_id: Uuid,
    ) -> Result<(Vec<StorageSection>, HashMap<String, Option<HashSet<String>>>), AppError> {
        let sections: Vec<StorageSection> = {
            let mut tx = self.gateway.begin(tenant_id).await?;
            let sections = self.catalog_repo.list_sections(&mut *tx, tenant_id).await?;
            tx.commit().await?;
            sections
                .into_iter()
                .filter(|s| s.external_storage_id.is_some())
                .collect()
        };

        let storage_ids: Vec<String> = sections
            .iter()
            .filter_map(|s| s.external_storage_id.clone())
            .collect();
        let membership = self.leftover_service.leftovers_by_storage(pos, &storage_ids).await;

        let unknown = membership.values().filter(|m| m.is_none()).count();
        if unknown > 0 {
            tracing::warn!(
                tenant_id = %tenant_id, unknown,
                "Estoques sem saldos legíveis: nenhum produto novo será criado neles"
            );
        }

        Ok((sections, membership))
    }

    // =========================================================================
    //  RESSINCRONIZAÇÃO DE UM OBJETO (webhooks)
    // =========================================================================

    pub async fn resync_supplier(
        &self,
        pos: &dyn PosApi,
        tenant_id: Uuid,
        supplier_id: i64,
    ) -> Result<ResyncOutcome, AppError> {
        let fetched = pos.get_supplier(supplier_id).await?;
        let external_id = supplier_id.to_string();

        let mut tx = self.gateway.begin(tenant_id).await?;
        let locals = self.catalog_repo.list_suppliers(&mut *tx, tenant_id).await?;

        let outcome = match plan_supplier_resync(fetched.as_ref(), &external_id, &locals) {
            SupplierResync::Upsert(plan) => {
                self.catalog_repo.update_suppliers(&mut *tx, tenant_id, &plan.updates).await?;
                self.catalog_repo.insert_suppliers(&mut *tx, tenant_id, &plan.inserts).await?;
                if !plan.inserts.is_empty() {
                    ResyncOutcome::Created
                } else if plan.linked > 0 {
                    ResyncOutcome::Linked
                } else {
                    ResyncOutcome::Updated
                }
            }
            SupplierResync::Delete(id) => {
                self.catalog_repo.delete_suppliers(&mut *tx, tenant_id, &[id]).await?;
                ResyncOutcome::Removed
            }
            SupplierResync::Noop => ResyncOutcome::Unchanged,
        };

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, supplier_id, ?outcome, "Fornecedor ressincronizado");
        Ok(outcome)
    }

    pub async fn resync_ingredient(
        &self,
        pos: &dyn PosApi,
        tenant_id: Uuid,
        ingredient_id: &str,
    ) -> Result<ResyncOutcome, AppError> {
        let fetched = pos.get_ingredient(ingredient_id.to_string()).await?;

        let (sections, membership) = match fetched {
            Some(_) => self.ingredient_inputs(pos, tenant_id).await?,
            None => (Vec::new(), HashMap::new()),
        };

        let mut tx = self.gateway.begin(tenant_id).await?;
        let local_categories = self.catalog_repo.list_categories(&mut *tx, tenant_id).await?;
        let products = self.catalog_repo.list_products(&mut *tx, tenant_id).await?;
        let category_map = index_categories(&local_categories);

        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &category_map,
            products: &products,
        };

        let outcome = match plan_ingredient_resync(fetched.as_ref(), ingredient_id, &ctx) {
            IngredientResync::Upsert(plan) => {
                self.catalog_repo.update_products(&mut *tx, tenant_id, &plan.updates).await?;
                let created = self.catalog_repo.insert_products(&mut *tx, tenant_id, &plan.inserts).await?;
                if created > 0 {
                    ResyncOutcome::Created
                } else {
                    ResyncOutcome::Updated
                }
            }
            IngredientResync::Deactivate => {
                self.catalog_repo
                    .deactivate_products_by_external_id(&mut *tx, tenant_id, ingredient_id)
                    .await?;
                ResyncOutcome::Removed
            }
            IngredientResync::Noop => ResyncOutcome::Unchanged,
        };

        tx.commit().await?;

        tracing::info!(tenant_id = %tenant_id, ingredient_id, ?outcome, "Ingrediente ressincronizado");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn supplier(id: u128, name: &str, external_id: Option<&str>) -> Supplier {
        Supplier {
            id: uid(id),
            tenant_id: Uuid::nil(),
            name: name.to_string(),
            phone: None,
            contact_info: Some("Rua Local, 10".into()),
            external_id: external_id.map(str::to_string),
        }
    }

    fn pos_supplier(id: &str, name: &str) -> PosSupplier {
        PosSupplier {
            id: id.to_string(),
            name: name.to_string(),
            phone: Some("+55 11 9999".into()),
            contact_info: Some("Rua POS, 1".into()),
        }
    }

    fn section(id: u128, name: &str, storage_id: Option<&str>) -> StorageSection {
        StorageSection {
            id: uid(id),
            tenant_id: Uuid::nil(),
            name: name.to_string(),
            emoji: "🧊".into(),
            external_storage_id: storage_id.map(str::to_string),
        }
    }

    fn ingredient(id: &str, name: &str) -> PosIngredient {
        PosIngredient { id: id.into(), name: name.into(), unit: Some("kg".into()), category_id: None }
    }

    fn product(id: u128, section_id: u128, external_id: &str, name: &str) -> Product {
        Product {
            id: uid(id),
            tenant_id: Uuid::nil(),
            section_id: uid(section_id),
            external_ingredient_id: external_id.into(),
            name: name.into(),
            unit: Some("kg".into()),
            category_id: None,
            is_active: true,
        }
    }

    #[test]
    fn supplier_sync_links_custom_row_instead_of_duplicating() {
        let locals = vec![supplier(1, "Acme", None)];
        let plan = plan_suppliers(&[pos_supplier("42", "Acme")], &locals);

        assert!(plan.inserts.is_empty());
        assert_eq!(plan.linked, 1);
        let (id, draft) = &plan.updates[0];
        assert_eq!(*id, uid(1));
        assert_eq!(draft.external_id.as_deref(), Some("42"));
        // Ligação preenche só o que estava vazio
        assert_eq!(draft.contact_info.as_deref(), Some("Rua Local, 10"));
        assert_eq!(draft.phone.as_deref(), Some("+55 11 9999"));
    }

    #[test]
    fn supplier_update_prefers_external_contact_data() {
        let locals = vec![supplier(1, "Acme antigo", Some("42"))];
        let plan = plan_suppliers(&[pos_supplier("42", "Acme")], &locals);

        let (_, draft) = &plan.updates[0];
        assert_eq!(draft.name, "Acme");
        assert_eq!(draft.contact_info.as_deref(), Some("Rua POS, 1"));
        assert_eq!(plan.linked, 0);
    }

    #[test]
    fn supplier_sweep_only_touches_vanished_linked_rows() {
        let locals = vec![
            supplier(1, "Custom local", None),
            supplier(2, "Sumiu do POS", Some("7")),
            supplier(3, "Continua", Some("8")),
        ];
        let plan = plan_suppliers(&[pos_supplier("8", "Continua")], &locals);

        assert_eq!(plan.deletes, vec![uid(2)]);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn unchanged_supplier_produces_no_update() {
        let mut local = supplier(1, "Acme", Some("42"));
        local.phone = Some("+55 11 9999".into());
        local.contact_info = Some("Rua POS, 1".into());

        let plan = plan_suppliers(&[pos_supplier("42", "Acme")], &[local]);
        assert_eq!(plan, SupplierPlan::default());
    }

    #[test]
    fn removed_supplier_webhook_is_idempotent() {
        let before = vec![supplier(1, "Acme", Some("7"))];

        // 1ª entrega: o POS não devolve mais o fornecedor 7
        assert_eq!(plan_supplier_resync(None, "7", &before), SupplierResync::Delete(uid(1)));

        // 2ª entrega: a linha já não existe
        let after: Vec<Supplier> = Vec::new();
        assert_eq!(plan_supplier_resync(None, "7", &after), SupplierResync::Noop);
    }

    #[test]
    fn changed_supplier_webhook_upserts_once() {
        let locals = vec![supplier(1, "Acme", None)];
        let ext = pos_supplier("7", "acme");

        match plan_supplier_resync(Some(&ext), "7", &locals) {
            SupplierResync::Upsert(plan) => assert_eq!(plan.linked, 1),
            other => panic!("esperava upsert, veio {other:?}"),
        }
    }

    #[test]
    fn section_sync_creates_links_and_marks_vanished() {
        let locals = vec![
            section(1, "Cozinha", None),
            section(2, "Bar antigo", Some("99")),
        ];
        let external = vec![
            PosStorage { id: "1".into(), name: "cozinha".into() },
            PosStorage { id: "2".into(), name: "Depósito".into() },
        ];

        let plan = plan_sections(&external, &locals);

        assert_eq!(plan.linked, 1);
        assert_eq!(plan.updates[0].1.emoji, "🧊");
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].emoji, DEFAULT_SECTION_EMOJI);
        assert_eq!(plan.delete_candidates, vec![uid(2)]);
    }

    fn category(id: u128, name: &str, external_id: Option<&str>) -> Category {
        Category {
            id: uid(id),
            tenant_id: Uuid::nil(),
            name: name.into(),
            default_supplier_id: Some(uid(50)),
            external_category_id: external_id.map(str::to_string),
        }
    }

    // Membership com todos os estoques legíveis
    fn stocked(entries: &[(&str, Vec<&str>)]) -> HashMap<String, Option<HashSet<String>>> {
        entries
            .iter()
            .map(|(storage, ids)| {
                (storage.to_string(), Some(ids.iter().map(|id| id.to_string()).collect()))
            })
            .collect()
    }

    #[test]
    fn categories_match_by_name_and_keep_one_row_per_name() {
        let locals = vec![category(1, "carnes", None)];
        let external = vec![
            PosCategory { id: "1".into(), name: "Carnes".into() },
            PosCategory { id: "2".into(), name: "Bebidas".into() },
            PosCategory { id: "3".into(), name: "BEBIDAS".into() },
        ];

        let plan = plan_categories(&external, &locals);
        assert_eq!(
            plan.updates,
            vec![(uid(1), CategoryDraft { name: "Carnes".into(), external_category_id: Some("1".into()) })]
        );
        assert_eq!(
            plan.inserts,
            vec![CategoryDraft { name: "Bebidas".into(), external_category_id: Some("2".into()) }]
        );
    }

    #[test]
    fn renamed_pos_category_moves_its_external_id() {
        let locals = vec![category(1, "Carnes", Some("5")), category(2, "Bebidas", Some("6"))];
        let external = vec![
            PosCategory { id: "5".into(), name: "Proteínas".into() },
            PosCategory { id: "6".into(), name: "Bebidas".into() },
        ];

        let plan = plan_categories(&external, &locals);

        assert_eq!(plan.inserts[0].external_category_id.as_deref(), Some("5"));
        assert_eq!(
            plan.updates,
            vec![(uid(1), CategoryDraft { name: "Carnes".into(), external_category_id: None })]
        );
    }

    #[test]
    fn ingredient_categories_resolve_from_stored_external_ids() {
        let locals = vec![category(1, "Carnes", Some("5")), category(2, "Custom", None)];
        let index = index_categories(&locals);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("5"), Some(&uid(1)));
    }

    #[test]
    fn empty_storage_bootstraps_all_ingredients() {
        let ingredients = vec![ingredient("1", "Tomate"), ingredient("2", "Cebola")];

        assert_eq!(ingredients_for_section(&ingredients, &HashSet::new()).len(), 2);

        let stocked = HashSet::from(["2".to_string()]);
        let only = ingredients_for_section(&ingredients, &stocked);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].id, "2");
    }

    #[test]
    fn ingredient_plan_applies_membership_per_section() {
        let sections = vec![section(1, "Cozinha", Some("10")), section(2, "Bar", Some("20"))];
        let membership = stocked(&[("10", vec!["1"]), ("20", vec![])]);
        let categories = HashMap::new();
        let products = vec![product(100, 1, "1", "Tomate velho")];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &products,
        };

        let plan = plan_ingredients(&[ingredient("1", "Tomate"), ingredient("2", "Cebola")], &ctx);

        // Cozinha: só o "1" (atualizado); Bar: vazio => ambos criados
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].0, uid(100));
        assert_eq!(plan.inserts.len(), 2);
        assert!(plan.inserts.iter().all(|d| d.section_id == uid(2)));
    }

    #[test]
    fn ingredient_category_falls_back_to_existing_assignment() {
        let sections = vec![section(1, "Cozinha", Some("10"))];
        let membership = stocked(&[("10", vec![])]);
        let categories = HashMap::from([("5".to_string(), uid(500))]);
        let mut existing = product(100, 1, "1", "Tomate");
        existing.category_id = Some(uid(400));
        let products = vec![existing];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &products,
        };

        let unknown_category = PosIngredient { category_id: Some("9".into()), ..ingredient("1", "Tomate") };
        assert!(plan_ingredients(&[unknown_category], &ctx).is_empty());

        let known_category = PosIngredient { category_id: Some("5".into()), ..ingredient("1", "Tomate") };
        let plan = plan_ingredients(&[known_category], &ctx);
        assert_eq!(plan.updates[0].1.category_id, Some(uid(500)));
    }

    #[test]
    fn removed_ingredient_webhook_deactivates_once() {
        let sections = Vec::new();
        let membership = HashMap::new();
        let categories = HashMap::new();

        let active = vec![product(100, 1, "55", "Tomate"), product(101, 2, "55", "Tomate")];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &active,
        };
        assert_eq!(plan_ingredient_resync(None, "55", &ctx), IngredientResync::Deactivate);

        let inactive: Vec<Product> = active
            .iter()
            .cloned()
            .map(|p| Product { is_active: false, ..p })
            .collect();
        let ctx = IngredientContext { products: &inactive, ..ctx };
        assert_eq!(plan_ingredient_resync(None, "55", &ctx), IngredientResync::Noop);
    }

    #[test]
    fn custom_products_are_never_deactivated() {
        let sections = Vec::new();
        let membership = HashMap::new();
        let categories = HashMap::new();
        let products = vec![product(100, 1, "custom_abc", "Molho da casa")];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &products,
        };

        assert_eq!(plan_ingredient_resync(None, "custom_abc", &ctx), IngredientResync::Noop);
    }

    #[test]
    fn ingredient_resync_updates_rows_outside_membership() {
        let sections = vec![section(1, "Cozinha", Some("10"))];
        // O estoque 10 tem saldo só de outro ingrediente
        let membership = stocked(&[("10", vec!["9"])]);
        let categories = HashMap::new();
        let products = vec![product(100, 1, "55", "Nome antigo")];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &products,
        };

        match plan_ingredient_resync(Some(&ingredient("55", "Nome novo")), "55", &ctx) {
            IngredientResync::Upsert(plan) => {
                assert!(plan.inserts.is_empty());
                assert_eq!(plan.updates.len(), 1);
                assert_eq!(plan.updates[0].1.name, "Nome novo");
            }
            other => panic!("esperava upsert, veio {other:?}"),
        }
    }

    #[test]
    fn unreadable_storage_gets_no_new_products() {
        let sections = vec![section(1, "Cozinha", Some("10")), section(2, "Bar", Some("20"))];
        // Estoque 20 falhou na leitura dos saldos
        let mut membership = stocked(&[("10", vec!["1"])]);
        membership.insert("20".to_string(), None);
        let categories = HashMap::new();
        let products = vec![product(100, 2, "3", "Limão velho")];
        let ctx = IngredientContext {
            sections: &sections,
            membership: &membership,
            categories: &categories,
            products: &products,
        };

        let ingredients: Vec<PosIngredient> = (1..=50)
            .map(|n| ingredient(&n.to_string(), &format!("Ingrediente {n}")))
            .collect();
        let plan = plan_ingredients(&ingredients, &ctx);

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].section_id, uid(1));
        // O produto que já existia no Bar continua recebendo os dados do POS
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].0, uid(100));
        assert_eq!(plan.updates[0].1.name, "Ingrediente 3");
    }
}
