// src/pos/client.rs

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    models::pos::PosCredential,
    pos::{
        error::PosError,
        records::{
            PosCategory, PosIngredient, PosLeftover, PosStorage, PosSupplier, RawCategory,
            RawIngredient, RawLeftover, RawStorage, RawSupplier,
        },
    },
};

// ---
// O contrato que o núcleo consome
// ---
// Um valor por tenant, passado explicitamente para cada sincronização.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PosApi: Send + Sync {
    async fn get_categories(&self) -> Result<Vec<PosCategory>, PosError>;
    async fn get_suppliers(&self) -> Result<Vec<PosSupplier>, PosError>;
    async fn get_supplier(&self, supplier_id: i64) -> Result<Option<PosSupplier>, PosError>;
    async fn get_ingredients(&self) -> Result<Vec<PosIngredient>, PosError>;
    async fn get_ingredient(&self, ingredient_id: String) -> Result<Option<PosIngredient>, PosError>;
    async fn get_storages(&self) -> Result<Vec<PosStorage>, PosError>;

    /// Sem `storage_id`, o POS devolve os saldos de todos os estoques.
    async fn get_storage_leftovers(
        &self,
        storage_id: Option<String>,
    ) -> Result<Vec<PosLeftover>, PosError>;
}

// ---
// Implementação HTTP
// ---
/// Fábrica de clientes por tenant sobre um único `reqwest::Client`.
#[derive(Clone)]
pub struct PosConnector {
    http: reqwest::Client,
    base_url: String,
}

impl PosConnector {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    pub fn client_for(&self, credential: &PosCredential) -> PosClient {
        PosClient::for_credential(&self.http, &self.base_url, credential)
    }
}

#[derive(Clone)]
pub struct PosClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PosClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Monta o cliente a partir da credencial guardada do tenant.
    pub fn for_credential(http: &reqwest::Client, base_url: &str, credential: &PosCredential) -> Self {
        Self::new(http.clone(), base_url, credential.access_token.clone())
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value, PosError> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .http
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(PosError::Status {
                status: status.as_u16(),
                body: body.chars().take(300).collect(),
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| PosError::Decode(format!("{method}: {e}")))?;

        unwrap_envelope(method, json)
    }

    async fn fetch_list<R, T>(
        &self,
        method: &str,
        params: &[(&str, String)],
        normalize: fn(R) -> Option<T>,
    ) -> Result<Vec<T>, PosError>
    where
        R: DeserializeOwned,
    {
        let payload = self.call(method, params).await?;
        decode_list(method, payload, normalize)
    }

    async fn fetch_one<R, T>(
        &self,
        method: &str,
        params: &[(&str, String)],
        normalize: fn(R) -> Option<T>,
    ) -> Result<Option<T>, PosError>
    where
        R: DeserializeOwned,
    {
        let payload = self.call(method, params).await?;
        decode_one(method, payload, normalize)
    }
}

#[async_trait]
impl PosApi for PosClient {
    async fn get_categories(&self) -> Result<Vec<PosCategory>, PosError> {
        self.fetch_list("menu.getCategoriesIngredients", &[], RawCategory::normalize)
            .await
    }

    async fn get_suppliers(&self) -> Result<Vec<PosSupplier>, PosError> {
        self.fetch_list("storage.getSuppliers", &[], RawSupplier::normalize)
            .await
    }

    async fn get_supplier(&self, supplier_id: i64) -> Result<Option<PosSupplier>, PosError> {
        self.fetch_one(
            "storage.getSupplier",
            &[("supplier_id", supplier_id.to_string())],
            RawSupplier::normalize,
        )
        .await
    }

    async fn get_ingredients(&self) -> Result<Vec<PosIngredient>, PosError> {
        self.fetch_list("menu.getIngredients", &[], RawIngredient::normalize)
            .await
    }

    async fn get_ingredient(&self, ingredient_id: String) -> Result<Option<PosIngredient>, PosError> {
        self.fetch_one(
            "menu.getIngredient",
            &[("ingredient_id", ingredient_id)],
            RawIngredient::normalize,
        )
        .await
    }

    async fn get_storages(&self) -> Result<Vec<PosStorage>, PosError> {
        self.fetch_list("storage.getStorages", &[], RawStorage::normalize)
            .await
    }

    async fn get_storage_leftovers(
        &self,
        storage_id: Option<String>,
    ) -> Result<Vec<PosLeftover>, PosError> {
        let params: Vec<(&str, String)> = storage_id
            .map(|id| vec![("storage_id", id)])
            .unwrap_or_default();

        self.fetch_list("storage.getStorageLeftovers", &params, RawLeftover::normalize)
            .await
    }
}

// ---
// Envelope { "response": ... } / { "error": ... }
// ---

fn unwrap_envelope(method: &str, json: Value) -> Result<Value, PosError> {
    let Value::Object(mut map) = json else {
        return Err(PosError::Decode(format!("{method}: resposta não é um objeto")));
    };

    if let Some(error) = map.remove("error") {
        // O POS usa tanto {"error": 30, "message": ".."} quanto {"error": {"code": 30, ...}}
        let (code, message) = match error {
            Value::Object(inner) => (
                inner
                    .get("code")
                    .or_else(|| inner.get("error"))
                    .and_then(Value::as_i64)
                    .unwrap_or_default(),
                inner
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            other => (
                other.as_i64().unwrap_or_default(),
                map.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        };
        return Err(PosError::Api { code, message });
    }

    map.remove("response")
        .ok_or_else(|| PosError::Decode(format!("{method}: campo 'response' ausente")))
}

fn decode_list<R, T>(method: &str, payload: Value, normalize: fn(R) -> Option<T>) -> Result<Vec<T>, PosError>
where
    R: DeserializeOwned,
{
    let items = match payload {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(PosError::Decode(format!(
                "{method}: esperava uma lista, recebeu {other}"
            )));
        }
    };

    let total = items.len();
    let mut unreadable = 0usize;
    let records: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<R>(item) {
            Ok(raw) => Some(raw),
            Err(e) => {
                unreadable += 1;
                tracing::warn!(method, error = %e, "Registro do POS ilegível");
                None
            }
        })
        .filter_map(normalize)
        .collect();

    if records.len() < total {
        tracing::warn!(
            method,
            dropped = total - records.len(),
            unreadable,
            "Registros do POS ignorados (ilegíveis ou sem id/nome)"
        );
    }

    Ok(records)
}

fn decode_one<R, T>(method: &str, payload: Value, normalize: fn(R) -> Option<T>) -> Result<Option<T>, PosError>
where
    R: DeserializeOwned,
{
    match payload {
        // Objeto removido: o POS responde vazio em vez de erro.
        Value::Null | Value::Bool(false) => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::Array(mut items) => decode_one(method, items.remove(0), normalize),
        object @ Value::Object(_) => serde_json::from_value::<R>(object)
            .map(normalize)
            .map_err(|e| PosError::Decode(format!("{method}: {e}"))),
        other => Err(PosError::Decode(format!(
            "{method}: esperava um objeto, recebeu {other}"
        ))),
    }
}
