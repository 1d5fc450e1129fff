// src/db/resource_repo.rs

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::common::error::AppError;
use crate::common::scope::{push_scope_filter, AccessScope};
use crate::models::resource::ScopedResource;

const RESOURCE_COLUMNS: &str = "id, institution_id, kind, title, payload, created_at, updated_at";

#[derive(Clone)]
pub struct ResourceRepository {
    pool: PgPool,
}

impl ResourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Monta o SELECT da listagem já filtrado pelo escopo.
    pub(crate) fn list_query<'a>(
        scope: &AccessScope,
        kind: Option<&'a str>,
        limit: i64,
        offset: i64,
    ) -> QueryBuilder<'a, Postgres> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM scoped_resources WHERE 1 = 1",
            RESOURCE_COLUMNS
        ));

        if let Some(kind) = kind {
            builder.push(" AND kind = ").push_bind(kind);
        }
        push_scope_filter(&mut builder, scope, "institution_id");
        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        builder
    }

    pub async fn list(
        &self,
        scope: &AccessScope,
        kind: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ScopedResource>, AppError> {
        let mut builder = Self::list_query(scope, kind, limit, offset);

        let rows = builder
            .build_query_as::<ScopedResource>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<ScopedResource>, AppError> {
        let row = sqlx::query_as::<_, ScopedResource>(&format!(
            "SELECT {} FROM scoped_resources WHERE id = $1",
            RESOURCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn create(
        &self,
        institution_id: i64,
        kind: &str,
        title: &str,
        payload: &serde_json::Value,
    ) -> Result<ScopedResource, AppError> {
        let row = sqlx::query_as::<_, ScopedResource>(&format!(
            r#"
            INSERT INTO scoped_resources (institution_id, kind, title, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            RESOURCE_COLUMNS
        ))
        .bind(institution_id)
        .bind(kind)
        .bind(title)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn list_query_is_scoped_and_paginated() {
        let scope = AccessScope::Institutions(BTreeSet::from([2, 3]));
        let builder = ResourceRepository::list_query(&scope, Some("task"), 20, 40);
        assert_eq!(
            builder.sql(),
            "SELECT id, institution_id, kind, title, payload, created_at, updated_at \
             FROM scoped_resources WHERE 1 = 1 AND kind = $1 AND institution_id = ANY($2) \
             ORDER BY id DESC LIMIT $3 OFFSET $4"
        );

        let builder = ResourceRepository::list_query(&AccessScope::All, None, 20, 0);
        assert!(!builder.sql().contains("ANY"));
    }
}
