// src/services/scheduler_service.rs

use std::{collections::HashSet, future::Future, time::Duration};

use uuid::Uuid;

use crate::{
    common::{db_utils::TenantGateway, error::AppError},
    db::PosCredentialRepository,
    models::sync::{SchedulerSummary, SyncResults, TenantSyncReport, TenantSyncStatus},
    services::sync_coordinator::SyncCoordinator,
};

// ---
// Agendador: percorre todos os tenants com credencial ativa
// ---
#[derive(Clone)]
pub struct SchedulerService {
    gateway: TenantGateway,
    credential_repo: PosCredentialRepository,
    coordinator: SyncCoordinator,
}

impl SchedulerService {
    pub fn new(gateway: TenantGateway, credential_repo: PosCredentialRepository, coordinator: SyncCoordinator) -> Self {
        Self { gateway, credential_repo, coordinator }
    }

    /// Uma passada completa. Cada tenant confirma as próprias transações,
    /// então uma interrupção no meio só perde o tenant em andamento.
    pub async fn run(&self) -> Result<SchedulerSummary, AppError> {
        let credentials = self.credential_repo.list_active(self.gateway.untenanted()).await?;

        let mut seen = HashSet::new();
        let tenants: Vec<Uuid> = credentials
            .into_iter()
            .map(|c| c.tenant_id)
            .filter(|tenant_id| seen.insert(*tenant_id))
            .collect();

        tracing::info!(tenants = tenants.len(), "Agendador iniciado");

        let reports = run_isolated(&tenants, |tenant_id| self.coordinator.sync_all(tenant_id)).await;
        let summary = summarize(reports);

        tracing::info!(
            total = summary.total_restaurants,
            success = summary.success_count,
            failed = summary.fail_count,
            skipped = summary.skip_count,
            "Agendador concluído"
        );
        Ok(summary)
    }

    /// Laço em segundo plano. O primeiro disparo acontece após um intervalo completo.
    pub fn spawn_interval(self, every_minutes: u64) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(every_minutes * 60);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run().await {
                    tracing::error!("Passada do agendador falhou: {}", e);
                }
            }
        })
    }
}

/// Processa os tenants um a um; o erro de um é registrado e o laço segue.
pub async fn run_isolated<F, Fut>(tenants: &[Uuid], mut sync: F) -> Vec<TenantSyncReport>
where
    F: FnMut(Uuid) -> Fut,
    Fut: Future<Output = Result<SyncResults, AppError>>,
{
    let mut reports = Vec::with_capacity(tenants.len());

    for &tenant_id in tenants {
        let report = match sync(tenant_id).await {
            Ok(results) => TenantSyncReport {
                tenant_id,
                status: classify(&results),
                results: Some(results),
                error: None,
            },
            Err(e) => {
                tracing::error!(tenant_id = %tenant_id, "Falha ao sincronizar tenant: {}", e);
                TenantSyncReport {
                    tenant_id,
                    status: TenantSyncStatus::Failed,
                    results: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }

    reports
}

/// Tudo pulado => skipped; tudo que rodou falhou => failed; senão success.
pub fn classify(results: &SyncResults) -> TenantSyncStatus {
    let attempted: Vec<_> = results.values().filter(|r| !r.is_skipped()).collect();

    if attempted.is_empty() {
        TenantSyncStatus::Skipped
    } else if attempted.iter().all(|r| r.is_failed()) {
        TenantSyncStatus::Failed
    } else {
        TenantSyncStatus::Success
    }
}

pub fn summarize(results: Vec<TenantSyncReport>) -> SchedulerSummary {
    let count = |status: TenantSyncStatus| results.iter().filter(|r| r.status == status).count();

    SchedulerSummary {
        total_restaurants: results.len(),
        success_count: count(TenantSyncStatus::Success),
        fail_count: count(TenantSyncStatus::Failed),
        skip_count: count(TenantSyncStatus::Skipped),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sync::{EntitySyncResult, EntityType, SyncCounts};

    fn synced() -> EntitySyncResult {
        EntitySyncResult::Synced(SyncCounts { created: 1, updated: 0, deleted: 0, total: 1 })
    }

    #[tokio::test]
    async fn one_failing_tenant_does_not_stop_the_others() {
        let (a, b, c) = (Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3));
        let mut visited = Vec::new();

        let reports = run_isolated(&[a, b, c], |tenant_id| {
            visited.push(tenant_id);
            async move {
                if tenant_id == b {
                    Err(AppError::PosCredentialsMissing(tenant_id))
                } else {
                    Ok(SyncResults::from([(EntityType::Suppliers, synced())]))
                }
            }
        })
        .await;

        assert_eq!(visited, vec![a, b, c]);
        let summary = summarize(reports);
        assert_eq!(summary.total_restaurants, 3);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.results[1].tenant_id, b);
        assert!(summary.results[1].error.is_some());
    }

    #[test]
    fn classification_of_tenant_results() {
        let all_skipped = SyncResults::from([
            (EntityType::Categories, EntitySyncResult::skipped()),
            (EntityType::Suppliers, EntitySyncResult::skipped()),
        ]);
        assert_eq!(classify(&all_skipped), TenantSyncStatus::Skipped);

        let all_failed = SyncResults::from([
            (EntityType::Categories, EntitySyncResult::skipped()),
            (EntityType::Suppliers, EntitySyncResult::Failed { error: "502".into() }),
        ]);
        assert_eq!(classify(&all_failed), TenantSyncStatus::Failed);

        let partial = SyncResults::from([
            (EntityType::Suppliers, EntitySyncResult::Failed { error: "502".into() }),
            (EntityType::Storages, synced()),
        ]);
        assert_eq!(classify(&partial), TenantSyncStatus::Success);
    }

    #[test]
    fn summary_serializes_in_camel_case() {
        let json = serde_json::to_value(summarize(Vec::new())).unwrap();
        assert_eq!(json["totalRestaurants"], 0);
        assert_eq!(json["skipCount"], 0);
    }
}
