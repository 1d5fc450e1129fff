// src/models/institution.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// ---
// 1. Institution (O nó da árvore)
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    #[schema(example = 2)]
    pub id: i64,

    #[schema(example = 1)]
    pub parent_id: Option<i64>,

    // Raiz = 1. Sempre nível do pai + 1.
    #[schema(example = 2)]
    pub level: i32,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    #[schema(example = "sector")]
    pub institution_type: String,

    #[schema(example = "Xətai rayon təhsil sektoru")]
    pub name: String,

    pub short_name: Option<String>,
    pub region_code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Soft delete
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Institution {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// ---
// 2. Tipos aceitos na criação
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionType {
    Ministry,
    Region,
    Sector,
    School,
    Other,
}

impl InstitutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionType::Ministry => "ministry",
            InstitutionType::Region => "region",
            InstitutionType::Sector => "sector",
            InstitutionType::School => "school",
            InstitutionType::Other => "other",
        }
    }
}

// ---
// 3. Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstitutionPayload {
    #[validate(length(min = 1, max = 255, message = "O nome da instituição é obrigatório."))]
    pub name: String,

    #[validate(length(max = 100, message = "O nome curto pode ter no máximo 100 caracteres."))]
    pub short_name: Option<String>,

    #[serde(rename = "type")]
    pub institution_type: InstitutionType,

    // Sem pai = nova raiz (apenas superadmin)
    pub parent_id: Option<i64>,

    #[validate(length(max = 10, message = "O código de região pode ter no máximo 10 caracteres."))]
    pub region_code: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MoveInstitutionPayload {
    /// Obrigatório. `null` move a instituição para a raiz.
    #[serde(deserialize_with = "present_or_null")]
    #[schema(required = true, example = 1)]
    pub new_parent_id: Option<i64>,
}

// Sem `default`: a chave precisa vir no corpo, mesmo que seja `null`
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer)
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "snake_case")]
#[into_params(parameter_in = Query)]
pub struct HierarchyQuery {
    #[serde(default)]
    pub include_inactive: bool,

    #[validate(range(min = 1, max = 10, message = "max_depth deve estar entre 1 e 10."))]
    pub max_depth: Option<u32>,

    #[serde(default)]
    pub expand_all: bool,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "snake_case")]
#[into_params(parameter_in = Query)]
pub struct SubtreeQuery {
    #[serde(default)]
    pub include_inactive: bool,

    #[validate(range(min = 1, max = 5, message = "depth deve estar entre 1 e 5."))]
    pub depth: Option<u32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "snake_case")]
#[into_params(parameter_in = Query)]
pub struct LevelQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

// ---
// 4. Visões da árvore
// ---
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub institution_type: String,
    pub level: i32,
    pub is_active: bool,
    pub has_children: bool,
    pub children_count: usize,
    #[schema(no_recursion)]
    pub children: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathEntry {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub institution_type: String,
    pub level: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyStats {
    pub total_institutions: usize,
    pub active_institutions: usize,
    pub root_institutions: usize,
    pub max_level: Option<i32>,
    pub by_level: BTreeMap<i32, usize>,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyResponse {
    pub data: Vec<HierarchyNode>,
    pub hierarchy_stats: HierarchyStats,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelListing {
    pub level: i32,
    pub count: usize,
    pub types: Vec<String>,
    pub data: Vec<Institution>,
}

// ---
// 5. Auditoria da árvore
// ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrphanedInstitution {
    pub id: i64,
    pub name: String,
    pub missing_parent_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelInconsistency {
    pub id: i64,
    pub name: String,
    pub level: i32,
    pub expected_level: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyAudit {
    pub orphaned: Vec<OrphanedInstitution>,
    pub level_inconsistencies: Vec<LevelInconsistency>,
    /// Cada ciclo começa pelo menor id envolvido
    pub cycles: Vec<Vec<i64>>,
}

impl HierarchyAudit {
    pub fn is_valid(&self) -> bool {
        self.orphaned.is_empty() && self.level_inconsistencies.is_empty() && self.cycles.is_empty()
    }

    pub fn total_issues(&self) -> usize {
        self.orphaned.len() + self.level_inconsistencies.len() + self.cycles.len()
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyValidationReport {
    pub is_valid: bool,
    pub total_issues: usize,
    #[serde(flatten)]
    pub audit: HierarchyAudit,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_payload_requires_the_parent_key() {
        let payload: MoveInstitutionPayload = serde_json::from_str(r#"{"newParentId": 4}"#).unwrap();
        assert_eq!(payload.new_parent_id, Some(4));

        // `null` explícito continua significando "raiz"
        let payload: MoveInstitutionPayload = serde_json::from_str(r#"{"newParentId": null}"#).unwrap();
        assert_eq!(payload.new_parent_id, None);

        assert!(serde_json::from_str::<MoveInstitutionPayload>("{}").is_err());
        assert!(serde_json::from_str::<MoveInstitutionPayload>(r#"{"parent_id": 4}"#).is_err());
        assert!(serde_json::from_str::<MoveInstitutionPayload>(r#"{"newParentId": 4, "extra": 1}"#).is_err());
    }
}
