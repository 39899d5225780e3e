// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::db_utils::TenantGateway,
    db::{CatalogRepository, PosCredentialRepository, SyncStateRepository, WebhookEventRepository},
    pos::PosConnector,
    services::{
        catalog_sync_service::CatalogSyncService, leftover_service::LeftoverService,
        scheduler_service::SchedulerService,
        sync_coordinator::{PgTenantStore, SyncCoordinator},
        webhook_service::WebhookService,
    },
};

const DEFAULT_POS_API_URL: &str = "https://joinposter.com/api";

// ---
// Configuração lida do ambiente (.env)
// ---
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub cron_secret: String,
    pub pos_api_url: String,
    pub pos_timeout_secs: u64,
    pub sync_threshold_minutes: i64,
    pub sync_interval_minutes: Option<u64>,
    pub db_max_connections: u32,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            cron_secret: required("CRON_SECRET")?,
            pos_api_url: env::var("POS_API_URL").unwrap_or_else(|_| DEFAULT_POS_API_URL.to_string()),
            pos_timeout_secs: parse_or("POS_TIMEOUT_SECS", 20)?,
            sync_threshold_minutes: parse_or("SYNC_THRESHOLD_MINUTES", 30)?,
            sync_interval_minutes: optional("SYNC_INTERVAL_MINUTES")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} deve ser definida"))
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(optional(key)?.unwrap_or(default))
}

fn optional<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{key} inválida: '{raw}'")),
        _ => Ok(None),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Config,
    pub leftover_service: LeftoverService,
    pub sync_coordinator: SyncCoordinator,
    pub scheduler_service: SchedulerService,
    pub webhook_service: WebhookService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Config::from_env()?;

        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.pos_timeout_secs))
            .build()?;

        Ok(Self::assemble(db_pool, http, config))
    }

    // --- Monta o grafo de dependências ---
    fn assemble(db_pool: PgPool, http: reqwest::Client, config: Config) -> Self {
        let gateway = TenantGateway::new(db_pool.clone());
        let connector = PosConnector::new(http, config.pos_api_url.clone());

        let credential_repo = PosCredentialRepository::new();
        let sync_state_repo = SyncStateRepository::new();
        let leftover_service = LeftoverService::new();

        let catalog_sync = CatalogSyncService::new(
            gateway.clone(),
            CatalogRepository::new(),
            sync_state_repo.clone(),
            leftover_service.clone(),
        );

        let tenant_store = PgTenantStore::new(gateway.clone(), credential_repo.clone(), sync_state_repo);
        let sync_coordinator = SyncCoordinator::new(
            Arc::new(tenant_store),
            Arc::new(catalog_sync.clone()),
            connector.clone(),
            config.sync_threshold_minutes,
        );

        let scheduler_service =
            SchedulerService::new(gateway.clone(), credential_repo.clone(), sync_coordinator.clone());

        let webhook_service = WebhookService::new(
            gateway,
            credential_repo,
            WebhookEventRepository::new(),
            catalog_sync,
            connector,
        );

        Self {
            db_pool,
            config,
            leftover_service,
            sync_coordinator,
            scheduler_service,
            webhook_service,
        }
    }
}
