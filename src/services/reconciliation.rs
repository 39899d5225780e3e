// src/services/reconciliation.rs

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::catalog::{StorageSection, Supplier};

// ---
// Resolvedor de reconciliação
// ---
// Decide, para um registro externo, se ele atualiza uma linha já ligada,
// liga uma linha "custom" de mesmo nome ou exige uma criação.
// Lógica pura: nenhuma I/O aqui.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Update(Uuid),
    Link(Uuid),
    Create,
}

/// O que o resolvedor precisa saber de uma linha local.
pub trait Reconcilable {
    fn row_id(&self) -> Uuid;
    fn external_ref(&self) -> Option<&str>;
    fn display_name(&self) -> &str;
}

impl Reconcilable for Supplier {
    fn row_id(&self) -> Uuid {
        self.id
    }
    fn external_ref(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
    fn display_name(&self) -> &str {
        &self.name
    }
}

impl Reconcilable for StorageSection {
    fn row_id(&self) -> Uuid {
        self.id
    }
    fn external_ref(&self) -> Option<&str> {
        self.external_storage_id.as_deref()
    }
    fn display_name(&self) -> &str {
        &self.name
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Índices sobre o conjunto local de um tenant, montados uma vez por sincronização.
/// Uma linha "custom" ligada durante a passada não é ligada de novo.
pub struct Resolver {
    by_external: HashMap<String, Uuid>,
    unlinked_by_name: HashMap<String, Vec<Uuid>>,
    claimed: HashSet<Uuid>,
}

impl Resolver {
    pub fn new<R: Reconcilable>(locals: &[R]) -> Self {
        let mut by_external = HashMap::new();
        let mut unlinked_by_name: HashMap<String, Vec<Uuid>> = HashMap::new();

        for row in locals {
            match row.external_ref() {
                Some(external_id) => {
                    by_external.insert(external_id.to_string(), row.row_id());
                }
                None => unlinked_by_name
                    .entry(normalize_name(row.display_name()))
                    .or_default()
                    .push(row.row_id()),
            }
        }

        // Empate entre homônimos: menor id local primeiro
        for ids in unlinked_by_name.values_mut() {
            ids.sort();
        }

        Self { by_external, unlinked_by_name, claimed: HashSet::new() }
    }

    pub fn resolve(&mut self, external_id: &str, external_name: &str) -> Resolution {
        // 1. Identidade sempre vence o nome
        if let Some(id) = self.by_external.get(external_id) {
            return Resolution::Update(*id);
        }

        // 2. Nome exato (sem diferenciar maiúsculas) entre as linhas "custom"
        let claimed = &self.claimed;
        let candidate = self
            .unlinked_by_name
            .get(&normalize_name(external_name))
            .and_then(|ids| ids.iter().copied().find(|id| !claimed.contains(id)));

        if let Some(id) = candidate {
            self.claimed.insert(id);
            self.by_external.insert(external_id.to_string(), id);
            return Resolution::Link(id);
        }

        // 3. Nada casou
        Resolution::Create
    }
}

/// Atualização: o valor externo vence quando não é vazio.
pub fn merge_external_first(local: Option<&str>, external: Option<&str>) -> Option<String> {
    non_blank(external).or_else(|| non_blank(local)).map(str::to_string)
}

/// Ligação: só preenche o que está vazio localmente.
pub fn merge_local_first(local: Option<&str>, external: Option<&str>) -> Option<String> {
    non_blank(local).or_else(|| non_blank(external)).map(str::to_string)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(id: u128, name: &str, external_id: Option<&str>) -> Supplier {
        Supplier {
            id: Uuid::from_u128(id),
            tenant_id: Uuid::nil(),
            name: name.to_string(),
            phone: None,
            contact_info: None,
            external_id: external_id.map(str::to_string),
        }
    }

    #[test]
    fn identity_wins_over_name() {
        let locals = vec![
            supplier(1, "Acme", None),
            supplier(2, "Outro nome", Some("42")),
        ];
        let mut resolver = Resolver::new(&locals);

        assert_eq!(resolver.resolve("42", "Acme"), Resolution::Update(Uuid::from_u128(2)));
    }

    #[test]
    fn links_custom_row_before_creating() {
        let locals = vec![supplier(1, "Acme", None)];
        let mut resolver = Resolver::new(&locals);

        assert_eq!(resolver.resolve("42", "acme "), Resolution::Link(Uuid::from_u128(1)));
        // Reentrega do mesmo id na mesma passada vira atualização
        assert_eq!(resolver.resolve("42", "Acme"), Resolution::Update(Uuid::from_u128(1)));
    }

    #[test]
    fn name_match_is_exact_not_fuzzy() {
        let locals = vec![supplier(1, "Acme Ltda", None)];
        let mut resolver = Resolver::new(&locals);

        assert_eq!(resolver.resolve("42", "Acme"), Resolution::Create);
    }

    #[test]
    fn linked_rows_are_not_name_matched() {
        let locals = vec![supplier(1, "Acme", Some("7"))];
        let mut resolver = Resolver::new(&locals);

        assert_eq!(resolver.resolve("42", "Acme"), Resolution::Create);
    }

    #[test]
    fn duplicate_names_pick_lowest_id_and_are_claimed_once() {
        let locals = vec![
            supplier(9, "Acme", None),
            supplier(3, "ACME", None),
        ];
        let mut resolver = Resolver::new(&locals);

        assert_eq!(resolver.resolve("1", "Acme"), Resolution::Link(Uuid::from_u128(3)));
        assert_eq!(resolver.resolve("2", "Acme"), Resolution::Link(Uuid::from_u128(9)));
        assert_eq!(resolver.resolve("3", "Acme"), Resolution::Create);
    }

    #[test]
    fn merge_policies() {
        assert_eq!(merge_external_first(Some("local"), Some("pos")), Some("pos".into()));
        assert_eq!(merge_external_first(Some("local"), Some("  ")), Some("local".into()));
        assert_eq!(merge_local_first(Some("local"), Some("pos")), Some("local".into()));
        assert_eq!(merge_local_first(None, Some("pos")), Some("pos".into()));
        assert_eq!(merge_local_first(Some(""), None), None);
    }
}
