// src/pos/records.rs

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

// ---
// Registros canônicos
// ---
// Tudo que sai do adaptador já está neste formato. O núcleo nunca
// olha para as variações de nomes de campos da API.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosCategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosSupplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosIngredient {
    pub id: String,
    pub name: String,
    pub unit: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosStorage {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosLeftover {
    pub ingredient_id: String,
    pub storage_id: Option<String>,
    /// `None` quando o valor bruto não é numérico.
    pub quantity: Option<Decimal>,
}

// ---
// Escalares "frouxos"
// ---
// O POS devolve ids e quantidades ora como número, ora como texto.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawScalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawScalar {
    fn into_id(self) -> Option<String> {
        match self {
            RawScalar::Int(v) => Some(v.to_string()),
            RawScalar::Float(v) if v.fract() == 0.0 => Some(format!("{}", v as i64)),
            RawScalar::Float(v) => Some(v.to_string()),
            RawScalar::Text(s) => non_empty(Some(s)),
        }
    }
}

/// Converte uma quantidade de estoque. Aceita vírgula como separador decimal
/// ("2,5" -> 2.5). Valores não numéricos retornam `None`.
pub(crate) fn parse_quantity(raw: &RawScalar) -> Option<Decimal> {
    match raw {
        RawScalar::Int(v) => Some(Decimal::from(*v)),
        RawScalar::Float(v) => Decimal::try_from(*v).ok(),
        RawScalar::Text(s) => {
            let normalized = s.trim().replace(',', ".");
            Decimal::from_str(&normalized)
                .or_else(|_| Decimal::from_scientific(&normalized))
                .ok()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_non_empty(values: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    values.into_iter().find_map(non_empty)
}

// ---
// Formatos brutos (com todas as grafias conhecidas)
// ---
// Cada grafia é um campo próprio: o POS às vezes manda duas ao mesmo tempo,
// e `alias` recusaria o registro inteiro como campo duplicado.

#[derive(Debug, Deserialize)]
pub(crate) struct RawCategory {
    category_id: Option<RawScalar>,
    id: Option<RawScalar>,
    name: Option<String>,
    category_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSupplier {
    supplier_id: Option<RawScalar>,
    id: Option<RawScalar>,
    supplier_name: Option<String>,
    name: Option<String>,
    supplier_phone: Option<String>,
    phone: Option<String>,
    supplier_address: Option<String>,
    supplier_adress: Option<String>,
    supplier_comment: Option<String>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIngredient {
    ingredient_id: Option<RawScalar>,
    id: Option<RawScalar>,
    ingredient_name: Option<String>,
    name: Option<String>,
    ingredient_unit: Option<String>,
    unit: Option<String>,
    category_id: Option<RawScalar>,
    ingredients_category_id: Option<RawScalar>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStorage {
    storage_id: Option<RawScalar>,
    id: Option<RawScalar>,
    storage_name: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLeftover {
    ingredient_id: Option<RawScalar>,
    id: Option<RawScalar>,
    storage_id: Option<RawScalar>,
    storage_ingredient_left: Option<RawScalar>,
    ingredient_left: Option<RawScalar>,
    leftover: Option<RawScalar>,
    quantity: Option<RawScalar>,
}

fn first_id(values: impl IntoIterator<Item = Option<RawScalar>>) -> Option<String> {
    values.into_iter().flatten().find_map(RawScalar::into_id)
}

// ---
// Normalização (bruto -> canônico)
// ---
// Registros sem id ou nome são descartados pelo chamador.

impl RawCategory {
    pub(crate) fn normalize(self) -> Option<PosCategory> {
        Some(PosCategory {
            id: first_id([self.category_id, self.id])?,
            name: first_non_empty([self.name, self.category_name])?,
        })
    }
}

impl RawSupplier {
    pub(crate) fn normalize(self) -> Option<PosSupplier> {
        Some(PosSupplier {
            id: first_id([self.supplier_id, self.id])?,
            name: first_non_empty([self.supplier_name, self.name])?,
            phone: first_non_empty([self.supplier_phone, self.phone]),
            contact_info: first_non_empty([
                self.supplier_address,
                self.supplier_adress,
                self.supplier_comment,
                self.comment,
            ]),
        })
    }
}

impl RawIngredient {
    pub(crate) fn normalize(self) -> Option<PosIngredient> {
        Some(PosIngredient {
            id: first_id([self.ingredient_id, self.id])?,
            name: first_non_empty([self.ingredient_name, self.name])?,
            unit: first_non_empty([self.ingredient_unit, self.unit]),
            // "0" = sem categoria
            category_id: [self.category_id, self.ingredients_category_id]
                .into_iter()
                .flatten()
                .filter_map(RawScalar::into_id)
                .find(|id| id != "0"),
        })
    }
}

impl RawStorage {
    pub(crate) fn normalize(self) -> Option<PosStorage> {
        Some(PosStorage {
            id: first_id([self.storage_id, self.id])?,
            name: first_non_empty([self.storage_name, self.name])?,
        })
    }
}

impl RawLeftover {
    pub(crate) fn normalize(self) -> Option<PosLeftover> {
        let quantity = [self.storage_ingredient_left, self.ingredient_left, self.leftover, self.quantity]
            .iter()
            .flatten()
            .find_map(parse_quantity);

        Some(PosLeftover {
            ingredient_id: first_id([self.ingredient_id, self.id])?,
            storage_id: first_id([self.storage_id]),
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn supplier(value: serde_json::Value) -> Option<PosSupplier> {
        serde_json::from_value::<RawSupplier>(value).unwrap().normalize()
    }

    #[test]
    fn supplier_address_is_read_from_either_spelling() {
        let misspelled = supplier(json!({
            "supplier_id": "7", "supplier_name": "Acme", "supplier_adress": "Rua A, 1"
        }))
        .unwrap();
        let correct = supplier(json!({
            "supplier_id": 7, "supplier_name": "Acme", "supplier_address": "Rua A, 1"
        }))
        .unwrap();

        assert_eq!(misspelled.contact_info.as_deref(), Some("Rua A, 1"));
        assert_eq!(misspelled, correct);
    }

    #[test]
    fn supplier_without_name_is_dropped() {
        assert!(supplier(json!({ "supplier_id": "7", "supplier_name": "  " })).is_none());
        assert!(supplier(json!({ "supplier_name": "Acme" })).is_none());
    }

    #[test]
    fn quantity_accepts_comma_decimal_separator() {
        let raw = RawScalar::Text("2,5".into());
        assert_eq!(parse_quantity(&raw), Some(Decimal::new(25, 1)));
    }

    #[test]
    fn quantity_rejects_non_numeric_text() {
        assert_eq!(parse_quantity(&RawScalar::Text("n/a".into())), None);
    }

    #[test]
    fn leftover_normalizes_numeric_ids_and_quantities() {
        let raw: RawLeftover = serde_json::from_value(json!({
            "ingredient_id": 12, "storage_id": "3", "storage_ingredient_left": 1.5
        }))
        .unwrap();

        let leftover = raw.normalize().unwrap();
        assert_eq!(leftover.ingredient_id, "12");
        assert_eq!(leftover.storage_id.as_deref(), Some("3"));
        assert_eq!(leftover.quantity, Some(Decimal::new(15, 1)));
    }

    #[test]
    fn ingredient_zero_category_means_uncategorized() {
        let raw: RawIngredient = serde_json::from_value(json!({
            "ingredient_id": "5", "ingredient_name": "Tomate", "ingredient_unit": "kg", "category_id": "0"
        }))
        .unwrap();

        let ingredient = raw.normalize().unwrap();
        assert_eq!(ingredient.category_id, None);
        assert_eq!(ingredient.unit.as_deref(), Some("kg"));
    }

    #[test]
    fn records_with_both_spellings_are_kept() {
        let leftover: RawLeftover = serde_json::from_value(json!({
            "ingredient_id": "10", "ingredient_left": "2,5", "storage_ingredient_left": "2,5"
        }))
        .unwrap();
        let leftover = leftover.normalize().unwrap();
        assert_eq!(leftover.ingredient_id, "10");
        assert_eq!(leftover.quantity, Some(Decimal::new(25, 1)));

        let ingredient: RawIngredient = serde_json::from_value(json!({
            "ingredient_id": "5", "id": "5", "ingredient_name": "Tomate", "name": "Tomate"
        }))
        .unwrap();
        assert_eq!(ingredient.normalize().map(|i| i.id), Some("5".to_string()));

        let found = supplier(json!({
            "supplier_id": 7, "id": 7, "supplier_name": "Acme", "name": "Acme",
            "supplier_adress": "", "supplier_address": "Rua A, 1"
        }))
        .unwrap();
        assert_eq!(found.contact_info.as_deref(), Some("Rua A, 1"));
    }

    #[test]
    fn leftover_skips_non_numeric_spelling_for_a_numeric_one() {
        let raw: RawLeftover = serde_json::from_value(json!({
            "ingredient_id": 3, "storage_ingredient_left": "n/a", "ingredient_left": 4
        }))
        .unwrap();
        assert_eq!(raw.normalize().unwrap().quantity, Some(Decimal::from(4)));
    }
}
