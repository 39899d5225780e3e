// src/services/leftover_service.rs

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    pos::{records::PosLeftover, PosApi},
};

// ---
// Agregador de saldos (leftovers) do POS
// ---
#[derive(Clone, Default)]
pub struct LeftoverService;

impl LeftoverService {
    pub fn new() -> Self {
        Self
    }

    /// Saldo total por ingrediente (id externo).
    pub async fn get_stock(&self, pos: &dyn PosApi) -> Result<HashMap<String, Decimal>, AppError> {
        // 1. Tenta a chamada global
        match pos.get_storage_leftovers(None).await {
            Ok(entries) if !entries.is_empty() => return Ok(merge_leftovers(entries)),
            Ok(_) => tracing::debug!("Chamada global de saldos vazia, consultando por estoque"),
            Err(e) => tracing::warn!("Chamada global de saldos falhou ({}), consultando por estoque", e),
        }

        // 2. Um pedido por estoque, todos concorrentes
        let storages = pos.get_storages().await?;
        let storage_ids: Vec<String> = storages.into_iter().map(|s| s.id).collect();

        let per_storage = fetch_all_settled(pos, &storage_ids).await;

        // 3. Soma comutativa (estoques que falharam não contribuem)
        Ok(merge_leftovers(per_storage.into_values().flatten().flatten()))
    }

    /// Conjunto de ingredientes com saldo em cada estoque.
    /// `None` marca o estoque cuja leitura falhou: vazio e desconhecido não se confundem.
    pub async fn leftovers_by_storage(
        &self,
        pos: &dyn PosApi,
        storage_ids: &[String],
    ) -> HashMap<String, Option<HashSet<String>>> {
        fetch_all_settled(pos, storage_ids)
            .await
            .into_iter()
            .map(|(storage_id, entries)| {
                let ingredients =
                    entries.map(|entries| entries.into_iter().map(|e| e.ingredient_id).collect());
                (storage_id, ingredients)
            })
            .collect()
    }
}

// Dispara todos, espera todos; nunca interrompe na primeira falha.
async fn fetch_all_settled(
    pos: &dyn PosApi,
    storage_ids: &[String],
) -> HashMap<String, Option<Vec<PosLeftover>>> {
    let requests = storage_ids.iter().map(|storage_id| async move {
        let entries = match pos.get_storage_leftovers(Some(storage_id.clone())).await {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(storage_id = %storage_id, "Falha ao buscar saldos do estoque: {}", e);
                None
            }
        };
        (storage_id.clone(), entries)
    });

    join_all(requests).await.into_iter().collect()
}

/// Agrupa por ingrediente somando as quantidades.
/// Quantidades não numéricas contam como zero.
pub fn merge_leftovers(entries: impl IntoIterator<Item = PosLeftover>) -> HashMap<String, Decimal> {
    let mut stock: HashMap<String, Decimal> = HashMap::new();

    for entry in entries {
        let total = stock.entry(entry.ingredient_id).or_insert(Decimal::ZERO);
        if let Some(quantity) = entry.quantity {
            *total += quantity;
        }
    }

    stock
}
