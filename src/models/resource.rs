// src/models/resource.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// Tipos de registro que "pertencem" a uma instituição
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Document,
    Task,
    Student,
    Survey,
    Report,
    Schedule,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Document => "document",
            ResourceKind::Task => "task",
            ResourceKind::Student => "student",
            ResourceKind::Survey => "survey",
            ResourceKind::Report => "report",
            ResourceKind::Schedule => "schedule",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopedResource {
    pub id: i64,
    pub institution_id: i64,
    #[schema(example = "document")]
    pub kind: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResourcePayload {
    pub institution_id: i64,
    pub kind: ResourceKind,

    #[validate(length(min = 1, max = 255, message = "O título é obrigatório."))]
    pub title: String,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[serde(rename_all = "snake_case")]
#[into_params(parameter_in = Query)]
pub struct ResourceListQuery {
    pub kind: Option<ResourceKind>,

    #[validate(range(min = 1, max = 100_000, message = "page deve estar entre 1 e 100000."))]
    pub page: Option<i64>,

    #[validate(range(min = 1, max = 100, message = "per_page deve estar entre 1 e 100."))]
    pub per_page: Option<i64>,
}

impl ResourceListQuery {
    pub const DEFAULT_PER_PAGE: i64 = 20;

    pub fn limit(&self) -> i64 {
        self.per_page.unwrap_or(Self::DEFAULT_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page.unwrap_or(1).max(1) - 1).saturating_mul(self.limit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let query = ResourceListQuery { kind: None, page: None, per_page: None };
        assert_eq!(query.limit(), 20);
        assert_eq!(query.offset(), 0);

        let query = ResourceListQuery { kind: Some(ResourceKind::Task), page: Some(3), per_page: Some(50) };
        assert_eq!(query.offset(), 100);
        assert!(query.validate().is_ok());

        let query = ResourceListQuery { kind: None, page: Some(0), per_page: Some(500) };
        let errors = query.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("page"));
        assert!(errors.field_errors().contains_key("per_page"));
    }

    #[test]
    fn huge_page_is_rejected_and_offset_never_overflows() {
        let query = ResourceListQuery { kind: None, page: Some(i64::MAX), per_page: Some(100) };
        let errors = query.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("page"));
        assert_eq!(query.offset(), i64::MAX);

        let query = ResourceListQuery { kind: None, page: Some(100_000), per_page: Some(100) };
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), 9_999_900);
    }
}
