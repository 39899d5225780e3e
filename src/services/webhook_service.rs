// src/services/webhook_service.rs

use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{db_utils::TenantGateway, error::AppError},
    db::{PosCredentialRepository, WebhookEventRepository},
    models::{
        pos::PosCredential,
        webhook::{WebhookAck, WebhookOutcome, WebhookPayload, WebhookTarget, UNMATCHED_TENANT},
    },
    pos::{PosApi, PosConnector},
    services::catalog_sync_service::CatalogSyncService,
};

/// Campos já validados de um webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedWebhook {
    pub account_id: String,
    pub object: String,
    pub object_id: String,
    pub action: String,
    pub target: WebhookTarget,
}

// ---
// Roteador de webhooks do POS
// ---
#[derive(Clone)]
pub struct WebhookService {
    gateway: TenantGateway,
    credential_repo: PosCredentialRepository,
    event_repo: WebhookEventRepository,
    catalog_sync: CatalogSyncService,
    connector: PosConnector,
}

impl WebhookService {
    pub fn new(
        gateway: TenantGateway,
        credential_repo: PosCredentialRepository,
        event_repo: WebhookEventRepository,
        catalog_sync: CatalogSyncService,
        connector: PosConnector,
    ) -> Self {
        Self { gateway, credential_repo, event_repo, catalog_sync, connector }
    }

    /// Ponto de entrada do corpo cru: JSON inválido também é auditado e ignorado.
    pub async fn handle_body(&self, body: &[u8]) -> Result<WebhookAck, AppError> {
        match decode_body(body) {
            Ok(raw) => self.handle(raw).await,
            Err(reason) => {
                let raw = Value::String(String::from_utf8_lossy(body).into_owned());
                Ok(self.ignore(reason, &raw).await)
            }
        }
    }

    pub async fn handle(&self, raw: Value) -> Result<WebhookAck, AppError> {
        // 1. Payload malformado: registra e ignora
        let webhook = match parse_webhook(&raw) {
            Ok(webhook) => webhook,
            Err(reason) => return Ok(self.ignore(reason, &raw).await),
        };
        let fields = AuditFields::from(&webhook);

        // 2. Tenant pela conta externa
        let lookup = self
            .credential_repo
            .find_active_by_account(self.gateway.untenanted(), &webhook.account_id)
            .await;

        let credential = match resolve_credential(lookup, &webhook.account_id) {
            Ok(credential) => credential,
            Err((outcome, e)) => {
                tracing::warn!(
                    account_id = %webhook.account_id,
                    outcome = outcome.as_str(),
                    "Webhook sem tenant resolvido: {}", e
                );
                self.audit(UNMATCHED_TENANT, outcome, &fields, &raw).await;
                return Err(e);
            }
        };

        // 3. Despacho
        let pos = self.connector.client_for(&credential);
        let dispatched = self.dispatch(&pos, credential.tenant_id, &webhook.target).await;

        // 4. Auditoria sempre, depois do despacho
        let (outcome, response) = settle(dispatched);
        self.audit(credential.tenant_id, outcome, &fields, &raw).await;

        tracing::info!(
            tenant_id = %credential.tenant_id,
            object = %webhook.object,
            object_id = %webhook.object_id,
            action = %webhook.action,
            outcome = outcome.as_str(),
            "Webhook processado"
        );
        response
    }

    async fn ignore(&self, reason: String, raw: &Value) -> WebhookAck {
        tracing::warn!(reason = %reason, "Webhook ignorado");
        self.audit(UNMATCHED_TENANT, WebhookOutcome::Ignored, &AuditFields::best_effort(raw), raw)
            .await;
        WebhookAck { status: "ignored", detail: Some(reason) }
    }

    async fn dispatch(&self, pos: &dyn PosApi, tenant_id: Uuid, target: &WebhookTarget) -> Result<String, AppError> {
        match target {
            WebhookTarget::Ingredient(id) => {
                let outcome = self.catalog_sync.resync_ingredient(pos, tenant_id, id).await?;
                Ok(format!("ingredient {id}: {outcome:?}"))
            }
            WebhookTarget::Supplier(id) => {
                let outcome = self.catalog_sync.resync_supplier(pos, tenant_id, *id).await?;
                Ok(format!("supplier {id}: {outcome:?}"))
            }
            // Estoques mudam pouco: ressincroniza todos
            WebhookTarget::Storages => {
                let counts = self.catalog_sync.sync_storages(pos, tenant_id).await?;
                Ok(format!("storages: {} criados, {} atualizados", counts.created, counts.updated))
            }
        }
    }

    // Falha ao auditar não derruba a resposta ao POS.
    async fn audit(&self, tenant_id: Uuid, outcome: WebhookOutcome, fields: &AuditFields, raw: &Value) {
        let recorded = self
            .event_repo
            .record(
                self.gateway.untenanted(),
                tenant_id,
                outcome,
                &fields.object,
                &fields.object_id,
                &fields.action,
                raw,
            )
            .await;

        if let Err(e) = recorded {
            tracing::error!(tenant_id = %tenant_id, "Falha ao gravar auditoria do webhook: {}", e);
        }
    }
}

/// Colunas da auditoria. Vazias quando o payload não as traz.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFields {
    pub object: String,
    pub object_id: String,
    pub action: String,
}

impl AuditFields {
    /// Lê o que der do payload cru, sem validar.
    pub fn best_effort(raw: &Value) -> Self {
        Self {
            object: raw_field(raw, "object"),
            object_id: raw_field(raw, "object_id"),
            action: raw_field(raw, "action"),
        }
    }
}

impl From<&ParsedWebhook> for AuditFields {
    fn from(webhook: &ParsedWebhook) -> Self {
        Self {
            object: webhook.object.clone(),
            object_id: webhook.object_id.clone(),
            action: webhook.action.clone(),
        }
    }
}

fn raw_field(raw: &Value, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub fn decode_body(body: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, bytes = body.len(), "Corpo do webhook não é JSON");
        format!("corpo não é JSON: {e}")
    })
}

/// Sem credencial ativa => 404; falha na consulta => o próprio erro.
/// Nos dois casos o evento é auditado sob o tenant sentinela.
pub fn resolve_credential(
    lookup: Result<Option<PosCredential>, AppError>,
    account_id: &str,
) -> Result<PosCredential, (WebhookOutcome, AppError)> {
    match lookup {
        Ok(Some(credential)) => Ok(credential),
        Ok(None) => Err((
            WebhookOutcome::UnmatchedTenant,
            AppError::TenantNotResolved(account_id.to_string()),
        )),
        Err(e) => Err((WebhookOutcome::LookupFailed, e)),
    }
}

pub fn parse_webhook(raw: &Value) -> Result<ParsedWebhook, String> {
    let payload: WebhookPayload =
        serde_json::from_value(raw.clone()).map_err(|e| format!("payload ilegível: {e}"))?;

    payload.validate().map_err(|e| format!("payload inválido: {e}"))?;

    // `validate` garante os campos obrigatórios
    let (Some(account_id), Some(object), Some(object_id), Some(action)) =
        (payload.account_id, payload.object, payload.object_id, payload.action)
    else {
        return Err("payload incompleto".to_string());
    };

    let target = WebhookTarget::from_payload(&object, &object_id)?;

    Ok(ParsedWebhook { account_id, object, object_id, action, target })
}

/// Só falhas do POS voltam como 5xx; o resto é registrado e respondido com sucesso.
pub fn settle(dispatched: Result<String, AppError>) -> (WebhookOutcome, Result<WebhookAck, AppError>) {
    match dispatched {
        Ok(detail) => (WebhookOutcome::Processed, Ok(WebhookAck { status: "ok", detail: Some(detail) })),
        Err(e) if e.is_external() => (WebhookOutcome::DispatchFailed, Err(e)),
        Err(e) => {
            tracing::error!("Falha ao despachar webhook: {}", e);
            (
                WebhookOutcome::DispatchFailed,
                Ok(WebhookAck { status: "ok", detail: Some("erro registrado".to_string()) }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::PosError;
    use serde_json::json;

    #[test]
    fn parses_supplier_webhook() {
        let raw = json!({
            "account": "bistro", "account_id": "991", "object": "supplier",
            "object_id": "7", "action": "removed", "time": 1700000000, "verify": "x"
        });

        let parsed = parse_webhook(&raw).unwrap();
        assert_eq!(parsed.target, WebhookTarget::Supplier(7));
        assert_eq!(parsed.account_id, "991");
        assert_eq!(parsed.action, "removed");
    }

    #[test]
    fn malformed_payloads_are_rejected_without_panicking() {
        assert!(parse_webhook(&json!({ "object": "product", "object_id": "1", "action": "added" })).is_err());
        assert!(parse_webhook(&json!({ "account_id": "1", "object": "order", "object_id": "1", "action": "added" })).is_err());
        assert!(parse_webhook(&json!("texto solto")).is_err());
    }

    #[test]
    fn only_pos_failures_surface_as_errors() {
        let (outcome, response) = settle(Err(AppError::from(PosError::Status { status: 503, body: String::new() })));
        assert_eq!(outcome, WebhookOutcome::DispatchFailed);
        assert!(response.is_err());

        let (outcome, response) = settle(Err(AppError::InvalidPayload("bug".into())));
        assert_eq!(outcome, WebhookOutcome::DispatchFailed);
        assert_eq!(response.unwrap().status, "ok");

        let (outcome, response) = settle(Ok("supplier 7: Removed".into()));
        assert_eq!(outcome, WebhookOutcome::Processed);
        assert!(response.is_ok());
    }

    fn credential() -> PosCredential {
        let now = chrono::Utc::now();
        PosCredential {
            id: Uuid::from_u128(1),
            tenant_id: Uuid::from_u128(2),
            account_id: "991".into(),
            access_token: "token".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn credential_lookup_failures_are_audited_as_their_own_outcome() {
        let found = resolve_credential(Ok(Some(credential())), "991").unwrap();
        assert_eq!(found.tenant_id, Uuid::from_u128(2));

        let (outcome, error) = resolve_credential(Ok(None), "991").unwrap_err();
        assert_eq!(outcome, WebhookOutcome::UnmatchedTenant);
        assert!(matches!(error, AppError::TenantNotResolved(account) if account == "991"));

        let (outcome, error) = resolve_credential(Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut)), "991")
            .unwrap_err();
        assert_eq!(outcome, WebhookOutcome::LookupFailed);
        assert!(matches!(error, AppError::DatabaseError(_)));
    }

    #[test]
    fn malformed_payload_keeps_whatever_fields_it_has() {
        let raw = json!({ "object": "order", "object_id": 15, "action": "added" });
        assert!(parse_webhook(&raw).is_err());

        let fields = AuditFields::best_effort(&raw);
        assert_eq!(fields.object, "order");
        assert_eq!(fields.object_id, "15");
        assert_eq!(fields.action, "added");

        assert_eq!(AuditFields::best_effort(&json!("texto solto")), AuditFields::default());
        assert_eq!(WebhookOutcome::Ignored.as_str(), "ignored");
    }

    #[test]
    fn invalid_json_body_is_reported_with_the_parse_error() {
        let reason = decode_body(b"account_id=991&object=supplier").unwrap_err();
        assert!(reason.starts_with("corpo não é JSON"));

        let raw = decode_body(br#"{"object":"storage"}"#).unwrap();
        assert_eq!(raw["object"], "storage");
    }
}
