// src/models/sync.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. Tipos de entidade sincronizáveis
// ---
// A ordem das variantes é a ordem de execução (ingredientes por último).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Categories,
    Suppliers,
    Storages,
    Ingredients,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Categories,
        EntityType::Suppliers,
        EntityType::Storages,
        EntityType::Ingredients,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Categories => "categories",
            EntityType::Suppliers => "suppliers",
            EntityType::Storages => "storages",
            EntityType::Ingredients => "ingredients",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "categories" | "category" => Ok(EntityType::Categories),
            "suppliers" | "supplier" => Ok(EntityType::Suppliers),
            "storages" | "storage" | "sections" => Ok(EntityType::Storages),
            "ingredients" | "ingredient" | "products" => Ok(EntityType::Ingredients),
            other => Err(other.to_string()),
        }
    }
}

// ---
// 2. Estado de sincronização ("staleness")
// ---
#[derive(Debug, Clone, FromRow)]
pub struct SyncState {
    pub tenant_id: Uuid,
    pub entity_type: String,
    pub last_synced_at: DateTime<Utc>,
}

/// Sem registro => precisa sincronizar. A fronteira é inclusiva:
/// idade igual ao limite já conta como desatualizado.
pub fn needs_sync(
    last_synced_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_minutes: i64,
) -> bool {
    match last_synced_at {
        None => true,
        Some(last) => now - last >= Duration::minutes(threshold_minutes),
    }
}

// ---
// 3. Resultados
// ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncCounts {
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum EntitySyncResult {
    Synced(SyncCounts),
    Skipped { skipped: bool },
    Failed { error: String },
}

impl EntitySyncResult {
    pub fn skipped() -> Self {
        EntitySyncResult::Skipped { skipped: true }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, EntitySyncResult::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, EntitySyncResult::Skipped { .. })
    }
}

pub type SyncResults = BTreeMap<EntityType, EntitySyncResult>;

// ---
// 4. Payloads da API de sincronização
// ---
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[validate(length(max = 10, message = "No máximo 10 entidades por requisição."))]
    pub entities: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    #[schema(value_type = Object)]
    pub results: SyncResults,
    pub forced: bool,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncStatus {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub needs_sync: bool,
    pub age_minutes: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncStatusResponse {
    #[schema(value_type = Object)]
    pub status: BTreeMap<EntityType, EntitySyncStatus>,
}

// ---
// 5. Resumo do agendador
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TenantSyncStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantSyncReport {
    pub tenant_id: Uuid,
    pub status: TenantSyncStatus,
    #[schema(value_type = Option<Object>)]
    pub results: Option<SyncResults>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSummary {
    pub total_restaurants: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub skip_count: usize,
    pub results: Vec<TenantSyncReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes_ago: i64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(now - Duration::minutes(minutes_ago))
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let now = Utc::now();
        assert!(!needs_sync(at(29, now), now, 30));
        assert!(needs_sync(at(30, now), now, 30));
        assert!(needs_sync(at(31, now), now, 30));
    }

    #[test]
    fn missing_state_always_needs_sync() {
        assert!(needs_sync(None, Utc::now(), 30));
    }

    #[test]
    fn entity_names_parse_leniently() {
        assert_eq!("Suppliers".parse::<EntityType>(), Ok(EntityType::Suppliers));
        assert_eq!("storage".parse::<EntityType>(), Ok(EntityType::Storages));
        assert!("orders".parse::<EntityType>().is_err());
    }

    #[test]
    fn results_serialize_as_counts_or_errors() {
        let mut results = SyncResults::new();
        results.insert(
            EntityType::Suppliers,
            EntitySyncResult::Synced(SyncCounts { created: 1, updated: 2, deleted: 0, total: 3 }),
        );
        results.insert(EntityType::Storages, EntitySyncResult::Failed { error: "boom".into() });

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["suppliers"]["created"], 1);
        assert_eq!(json["storages"]["error"], "boom");
    }
}
