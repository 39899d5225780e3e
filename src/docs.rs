// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Sync ---
        handlers::sync::trigger_sync,
        handlers::sync::get_sync_status,

        // --- Stock ---
        handlers::stock::get_stock,

        // --- Webhooks ---
        handlers::webhooks::receive_pos_webhook,

        // --- Cron ---
        handlers::cron::run_scheduled_sync,
    ),
    components(
        schemas(
            // --- Sync ---
            models::sync::EntityType,
            models::sync::SyncCounts,
            models::sync::EntitySyncResult,
            models::sync::SyncRequest,
            models::sync::SyncResponse,
            models::sync::EntitySyncStatus,
            models::sync::SyncStatusResponse,

            // --- Scheduler ---
            models::sync::TenantSyncStatus,
            models::sync::TenantSyncReport,
            models::sync::SchedulerSummary,

            // --- Webhooks ---
            models::webhook::WebhookPayload,
            models::webhook::WebhookAck,

            // --- Stock ---
            handlers::stock::StockResponse,
        )
    ),
    tags(
        (name = "Sync", description = "Sincronização com o POS"),
        (name = "Stock", description = "Saldos agregados do POS"),
        (name = "Webhooks", description = "Eventos enviados pelo POS"),
        (name = "Cron", description = "Disparo do agendador")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        components.add_security_scheme(
            "cron_secret",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/api/sync", "/api/stock", "/api/webhooks/pos", "/api/cron/sync"] {
            assert!(doc.paths.paths.contains_key(path), "{path} sem documentação");
        }
    }
}
