// src/services/sync_coordinator.rs

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use crate::{
    common::{db_utils::TenantGateway, error::AppError},
    db::{PosCredentialRepository, SyncStateRepository},
    models::{
        pos::PosCredential,
        sync::{
            needs_sync, EntitySyncResult, EntitySyncStatus, EntityType, SyncCounts, SyncResults,
            SyncState,
        },
    },
    pos::{PosApi, PosClient, PosConnector},
    services::catalog_sync_service::CatalogSyncService,
};

// ---
// Dependências do coordenador
// ---

/// Credencial e estado de sincronização de um tenant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn active_credential(&self, tenant_id: Uuid) -> Result<Option<PosCredential>, AppError>;
    async fn last_synced(&self, tenant_id: Uuid) -> Result<HashMap<EntityType, DateTime<Utc>>, AppError>;
}

/// Sincroniza um tipo de entidade. Cada chamada é atômica: ou grava tudo
/// (inclusive o `sync_state`), ou nada.
#[async_trait]
pub trait EntitySyncer: Send + Sync {
    async fn sync(&self, pos: &dyn PosApi, tenant_id: Uuid, entity: EntityType) -> Result<SyncCounts, AppError>;
}

#[async_trait]
impl EntitySyncer for CatalogSyncService {
    async fn sync(&self, pos: &dyn PosApi, tenant_id: Uuid, entity: EntityType) -> Result<SyncCounts, AppError> {
        CatalogSyncService::sync(self, pos, tenant_id, entity).await
    }
}

#[derive(Clone)]
pub struct PgTenantStore {
    gateway: TenantGateway,
    credential_repo: PosCredentialRepository,
    sync_state_repo: SyncStateRepository,
}

impl PgTenantStore {
    pub fn new(
        gateway: TenantGateway,
        credential_repo: PosCredentialRepository,
        sync_state_repo: SyncStateRepository,
    ) -> Self {
        Self { gateway, credential_repo, sync_state_repo }
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn active_credential(&self, tenant_id: Uuid) -> Result<Option<PosCredential>, AppError> {
        self.credential_repo
            .find_active_for_tenant(self.gateway.untenanted(), tenant_id)
            .await
    }

    async fn last_synced(&self, tenant_id: Uuid) -> Result<HashMap<EntityType, DateTime<Utc>>, AppError> {
        let mut tx = self.gateway.begin(tenant_id).await?;
        let states = self.sync_state_repo.list_for_tenant(&mut *tx, tenant_id).await?;
        tx.commit().await?;
        Ok(index_states(states))
    }
}

// ---
// Coordenador de sincronização por tenant
// ---
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn TenantStore>,
    syncer: Arc<dyn EntitySyncer>,
    connector: PosConnector,
    threshold_minutes: i64,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn TenantStore>,
        syncer: Arc<dyn EntitySyncer>,
        connector: PosConnector,
        threshold_minutes: i64,
    ) -> Self {
        Self { store, syncer, connector, threshold_minutes }
    }

    /// Cliente do POS do tenant; sem credencial ativa, nada roda.
    pub async fn pos_for_tenant(&self, tenant_id: Uuid) -> Result<PosClient, AppError> {
        let credential = self
            .store
            .active_credential(tenant_id)
            .await?
            .ok_or(AppError::PosCredentialsMissing(tenant_id))?;

        Ok(self.connector.client_for(&credential))
    }

    pub async fn needs_sync(
        &self,
        tenant_id: Uuid,
        entity: EntityType,
        threshold_minutes: i64,
    ) -> Result<bool, AppError> {
        let states = self.store.last_synced(tenant_id).await?;
        Ok(needs_sync(states.get(&entity).copied(), Utc::now(), threshold_minutes))
    }

    pub async fn sync_all(&self, tenant_id: Uuid) -> Result<SyncResults, AppError> {
        self.run(tenant_id, &EntityType::ALL, false).await
    }

    pub async fn force_sync_all(&self, tenant_id: Uuid) -> Result<SyncResults, AppError> {
        self.run(tenant_id, &EntityType::ALL, true).await
    }

    pub async fn selective_sync(
        &self,
        tenant_id: Uuid,
        names: &[String],
        force: bool,
    ) -> Result<SyncResults, AppError> {
        let entities = parse_entity_names(names);
        self.run(tenant_id, &entities, force).await
    }

    pub async fn status(&self, tenant_id: Uuid) -> Result<BTreeMap<EntityType, EntitySyncStatus>, AppError> {
        let states = self.store.last_synced(tenant_id).await?;
        Ok(build_status(&states, Utc::now(), self.threshold_minutes))
    }

    async fn run(&self, tenant_id: Uuid, entities: &[EntityType], force: bool) -> Result<SyncResults, AppError> {
        // 1. Pré-condição compartilhada: falha antes de qualquer entidade
        let pos = self.pos_for_tenant(tenant_id).await?;

        // 2. Quais tipos estão desatualizados
        let states = self.store.last_synced(tenant_id).await?;
        let (to_run, skipped) = partition_stale(entities, &states, Utc::now(), self.threshold_minutes, force);

        tracing::info!(
            tenant_id = %tenant_id, force, run = ?to_run, skipped = ?skipped,
            "Iniciando sincronização"
        );

        // 3. Execução
        let mut results = self.execute(&pos, tenant_id, &to_run).await;
        for entity in skipped {
            results.insert(entity, EntitySyncResult::skipped());
        }

        Ok(results)
    }

    /// Categorias, fornecedores e estoques em paralelo; ingredientes depois,
    /// porque leem as seções e categorias recém-sincronizadas.
    pub async fn execute(&self, pos: &dyn PosApi, tenant_id: Uuid, entities: &[EntityType]) -> SyncResults {
        let (phase_two, phase_one): (Vec<EntityType>, Vec<EntityType>) = entities
            .iter()
            .copied()
            .partition(|e| *e == EntityType::Ingredients);

        let first = phase_one.into_iter().map(|entity| async move {
            (entity, self.sync_entity(pos, tenant_id, entity).await)
        });
        let mut results: SyncResults = join_all(first).await.into_iter().collect();

        for entity in phase_two {
            results.insert(entity, self.sync_entity(pos, tenant_id, entity).await);
        }

        results
    }

    // A falha de um tipo vira resultado, nunca erro do coordenador.
    async fn sync_entity(&self, pos: &dyn PosApi, tenant_id: Uuid, entity: EntityType) -> EntitySyncResult {
        match self.syncer.sync(pos, tenant_id, entity).await {
            Ok(counts) => EntitySyncResult::Synced(counts),
            Err(e) => {
                tracing::error!(tenant_id = %tenant_id, entity = %entity, "Falha na sincronização: {}", e);
                EntitySyncResult::Failed { error: e.to_string() }
            }
        }
    }
}

// ---
// Funções puras
// ---

fn index_states(states: Vec<SyncState>) -> HashMap<EntityType, DateTime<Utc>> {
    states
        .into_iter()
        .filter_map(|s| match s.entity_type.parse::<EntityType>() {
            Ok(entity) => Some((entity, s.last_synced_at)),
            Err(other) => {
                tracing::warn!(entity_type = %other, "Estado de sincronização com tipo desconhecido");
                None
            }
        })
        .collect()
}

/// Nomes desconhecidos são registrados e ignorados. Saída sem repetição e na ordem de execução.
pub fn parse_entity_names(names: &[String]) -> Vec<EntityType> {
    let mut entities = BTreeSet::new();

    for name in names {
        match name.parse::<EntityType>() {
            Ok(entity) => {
                entities.insert(entity);
            }
            Err(unknown) => tracing::warn!(entity = %unknown, "Tipo de entidade desconhecido ignorado"),
        }
    }

    entities.into_iter().collect()
}

/// (a executar, pulados)
pub fn partition_stale(
    entities: &[EntityType],
    states: &HashMap<EntityType, DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_minutes: i64,
    force: bool,
) -> (Vec<EntityType>, Vec<EntityType>) {
    entities
        .iter()
        .copied()
        .partition(|entity| force || needs_sync(states.get(entity).copied(), now, threshold_minutes))
}

pub fn build_status(
    states: &HashMap<EntityType, DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_minutes: i64,
) -> BTreeMap<EntityType, EntitySyncStatus> {
    EntityType::ALL
        .into_iter()
        .map(|entity| {
            let last = states.get(&entity).copied();
            let status = EntitySyncStatus {
                last_sync_at: last,
                needs_sync: needs_sync(last, now, threshold_minutes),
                age_minutes: last.map(|at| (now - at).num_minutes()),
            };
            (entity, status)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::{client::MockPosApi, records::PosCategory, PosError};
    use chrono::Duration;
    use std::sync::Mutex;

    // Registra a ordem das chamadas; o tipo em `failing` devolve erro do POS.
    #[derive(Default)]
    struct RecordingSyncer {
        calls: Mutex<Vec<EntityType>>,
        failing: Option<EntityType>,
    }

    impl RecordingSyncer {
        fn calls(&self) -> Vec<EntityType> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EntitySyncer for RecordingSyncer {
        async fn sync(&self, _pos: &dyn PosApi, _tenant_id: Uuid, entity: EntityType) -> Result<SyncCounts, AppError> {
            self.calls.lock().unwrap().push(entity);
            if self.failing == Some(entity) {
                return Err(AppError::from(PosError::Status { status: 500, body: String::new() }));
            }
            Ok(SyncCounts::default())
        }
    }

    // Busca a lista do tipo no POS e devolve só o total.
    struct FetchingSyncer;

    #[async_trait]
    impl EntitySyncer for FetchingSyncer {
        async fn sync(&self, pos: &dyn PosApi, _tenant_id: Uuid, entity: EntityType) -> Result<SyncCounts, AppError> {
            let total = match entity {
                EntityType::Categories => pos.get_categories().await?.len(),
                EntityType::Suppliers => pos.get_suppliers().await?.len(),
                EntityType::Storages => pos.get_storages().await?.len(),
                EntityType::Ingredients => pos.get_ingredients().await?.len(),
            };
            Ok(SyncCounts { total: total as u32, ..SyncCounts::default() })
        }
    }

    fn tenant() -> Uuid {
        Uuid::from_u128(7)
    }

    fn credential() -> PosCredential {
        let now = Utc::now();
        PosCredential {
            id: Uuid::from_u128(1),
            tenant_id: tenant(),
            account_id: "991".into(),
            access_token: "token".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn coordinator(store: MockTenantStore, syncer: Arc<dyn EntitySyncer>) -> SyncCoordinator {
        let connector = PosConnector::new(reqwest::Client::new(), "http://pos.invalid");
        SyncCoordinator::new(Arc::new(store), syncer, connector, 30)
    }

    #[test]
    fn unknown_names_are_ignored_and_duplicates_collapse() {
        let names: Vec<String> = ["ingredients", "orders", "Suppliers", "supplier"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            parse_entity_names(&names),
            vec![EntityType::Suppliers, EntityType::Ingredients]
        );
    }

    #[test]
    fn fresh_entities_are_skipped_unless_forced() {
        let now = Utc::now();
        let states = HashMap::from([
            (EntityType::Categories, now - Duration::minutes(5)),
            (EntityType::Suppliers, now - Duration::minutes(30)),
        ]);

        let (run, skipped) = partition_stale(&EntityType::ALL, &states, now, 30, false);
        assert_eq!(run, vec![EntityType::Suppliers, EntityType::Storages, EntityType::Ingredients]);
        assert_eq!(skipped, vec![EntityType::Categories]);

        let (run, skipped) = partition_stale(&EntityType::ALL, &states, now, 30, true);
        assert_eq!(run.len(), 4);
        assert!(skipped.is_empty());
    }

    #[test]
    fn status_reports_every_entity_type() {
        let now = Utc::now();
        let states = HashMap::from([(EntityType::Storages, now - Duration::minutes(12))]);

        let status = build_status(&states, now, 30);

        assert_eq!(status.len(), 4);
        let storages = &status[&EntityType::Storages];
        assert_eq!(storages.age_minutes, Some(12));
        assert!(!storages.needs_sync);
        let categories = &status[&EntityType::Categories];
        assert!(categories.needs_sync);
        assert_eq!(categories.last_sync_at, None);
    }

    #[test]
    fn unknown_stored_entity_types_are_dropped() {
        let states = vec![
            SyncState { tenant_id: Uuid::nil(), entity_type: "suppliers".into(), last_synced_at: Utc::now() },
            SyncState { tenant_id: Uuid::nil(), entity_type: "orders".into(), last_synced_at: Utc::now() },
        ];

        let indexed = index_states(states);
        assert_eq!(indexed.len(), 1);
        assert!(indexed.contains_key(&EntityType::Suppliers));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_entity_runs() {
        let mut store = MockTenantStore::new();
        store.expect_active_credential().times(1).returning(|_| Ok(None));
        store.expect_last_synced().never();
        let syncer = Arc::new(RecordingSyncer::default());

        let result = coordinator(store, syncer.clone()).force_sync_all(tenant()).await;

        assert!(matches!(result, Err(AppError::PosCredentialsMissing(id)) if id == tenant()));
        assert!(syncer.calls().is_empty());
    }

    #[tokio::test]
    async fn one_failing_entity_does_not_stop_its_siblings() {
        let mut store = MockTenantStore::new();
        store.expect_active_credential().returning(|_| Ok(Some(credential())));
        store
            .expect_last_synced()
            .returning(|_| Ok(HashMap::from([(EntityType::Categories, Utc::now() - Duration::minutes(5))])));
        let syncer = Arc::new(RecordingSyncer { failing: Some(EntityType::Suppliers), ..Default::default() });

        let results = coordinator(store, syncer.clone()).sync_all(tenant()).await.unwrap();

        assert_eq!(results[&EntityType::Categories], EntitySyncResult::skipped());
        assert!(matches!(results[&EntityType::Suppliers], EntitySyncResult::Failed { .. }));
        assert_eq!(results[&EntityType::Storages], EntitySyncResult::Synced(SyncCounts::default()));
        assert_eq!(results[&EntityType::Ingredients], EntitySyncResult::Synced(SyncCounts::default()));

        // Ingredientes só depois da primeira fase
        let calls = syncer.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last(), Some(&EntityType::Ingredients));
        assert!(!calls.contains(&EntityType::Categories));
    }

    #[tokio::test]
    async fn pos_failure_on_suppliers_is_captured_per_entity() {
        let mut pos = MockPosApi::new();
        pos.expect_get_categories()
            .times(1)
            .returning(|| Ok(vec![PosCategory { id: "1".into(), name: "Carnes".into() }]));
        pos.expect_get_suppliers()
            .times(1)
            .returning(|| Err(PosError::Status { status: 503, body: "fora do ar".into() }));
        pos.expect_get_storages().times(1).returning(|| Ok(Vec::new()));
        pos.expect_get_ingredients().times(1).returning(|| Ok(Vec::new()));

        let results = coordinator(MockTenantStore::new(), Arc::new(FetchingSyncer))
            .execute(&pos, tenant(), &EntityType::ALL)
            .await;

        assert_eq!(results.len(), 4);
        assert!(matches!(results[&EntityType::Suppliers], EntitySyncResult::Failed { .. }));
        assert_eq!(
            results[&EntityType::Categories],
            EntitySyncResult::Synced(SyncCounts { total: 1, ..SyncCounts::default() })
        );
        assert!(matches!(results[&EntityType::Ingredients], EntitySyncResult::Synced(_)));
    }
}
