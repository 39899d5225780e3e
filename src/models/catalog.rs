// src/models/catalog.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Prefixo dos `external_ingredient_id` sintéticos (produtos criados no app).
pub const CUSTOM_INGREDIENT_PREFIX: &str = "custom_";

pub fn is_custom_ingredient_id(external_ingredient_id: &str) -> bool {
    external_ingredient_id.starts_with(CUSTOM_INGREDIENT_PREFIX)
}

// --- 1. Categorias ---
// O nome é único por tenant e serve de chave de casamento com o POS.
// `external_category_id` guarda o último id do POS visto para o nome.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub default_supplier_id: Option<Uuid>,
    pub external_category_id: Option<String>,
}

// --- 2. Fornecedores ---
// `external_id` nulo => fornecedor "custom" (criado localmente).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub contact_info: Option<String>,
    pub external_id: Option<String>,
}

// --- 3. Seções de estoque ---
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StorageSection {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub emoji: String,
    pub external_storage_id: Option<String>,
}

// --- 4. Produtos / Ingredientes ---
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub section_id: Uuid,
    pub external_ingredient_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_active: bool,
}

impl Product {
    pub fn is_custom(&self) -> bool {
        is_custom_ingredient_id(&self.external_ingredient_id)
    }
}

// ---
// Rascunhos de escrita (saída do planejamento, entrada dos repositórios)
// ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub external_category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierDraft {
    pub name: String,
    pub phone: Option<String>,
    pub contact_info: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDraft {
    pub name: String,
    pub emoji: String,
    pub external_storage_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub section_id: Uuid,
    pub external_ingredient_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_active: bool,
}
