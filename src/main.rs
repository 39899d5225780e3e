//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod pos;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;
use crate::middleware::auth::{auth_guard, cron_guard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger: RUST_LOG ou "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Laço em segundo plano, além do disparo via /api/cron/sync
    if let Some(minutes) = app_state.config.sync_interval_minutes {
        tracing::info!("⏱️ Sincronização automática a cada {} minutos", minutes);
        app_state.scheduler_service.clone().spawn_interval(minutes);
    }

    // Rotas da sessão (JWT com o tenant)
    let sync_routes = Router::new()
        .route("/sync"
               ,post(handlers::sync::trigger_sync)
               .get(handlers::sync::get_sync_status)
        )
        .route("/stock", get(handlers::stock::get_stock))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Rotas chamadas pelo POS (sem sessão)
    let webhook_routes = Router::new()
        .route("/pos", post(handlers::webhooks::receive_pos_webhook));

    let cron_routes = Router::new()
        .route("/sync", get(handlers::cron::run_scheduled_sync))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            cron_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", sync_routes)
        .nest("/api/webhooks", webhook_routes)
        .nest("/api/cron", cron_routes)
        .with_state(app_state.clone());

    // Inicia o servidor
    let listener = TcpListener::bind(&app_state.config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
