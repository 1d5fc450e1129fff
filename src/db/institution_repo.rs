// src/db/institution_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};

use crate::common::error::AppError;
use crate::common::hierarchy::LevelUpdate;
use crate::common::scope::{push_scope_filter, AccessScope};
use crate::models::institution::Institution;

const INSTITUTION_COLUMNS: &str = "id, parent_id, level, type, name, short_name, region_code, \
     is_active, created_at, updated_at, deleted_at";

// Campos de uma nova instituição, já validados pelo serviço
pub struct NewInstitution<'a> {
    pub name: &'a str,
    pub short_name: Option<&'a str>,
    pub institution_type: &'a str,
    pub parent_id: Option<i64>,
    pub level: i32,
    pub region_code: Option<&'a str>,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct InstitutionRepository {
    pool: PgPool,
}

impl InstitutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fotografia da tabela inteira (inclusive excluídas), para montar a árvore.
    pub async fn load_tree<'e, E>(&self, executor: E) -> Result<Vec<Institution>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, Institution>(&format!(
            "SELECT {} FROM institutions ORDER BY id",
            INSTITUTION_COLUMNS
        ))
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Institution>, AppError> {
        let row = sqlx::query_as::<_, Institution>(&format!(
            "SELECT {} FROM institutions WHERE id = $1",
            INSTITUTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        new: &NewInstitution<'_>,
    ) -> Result<Institution, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Institution>(&format!(
            r#"
            INSERT INTO institutions (name, short_name, type, parent_id, level, region_code, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            INSTITUTION_COLUMNS
        ))
        .bind(new.name)
        .bind(new.short_name)
        .bind(new.institution_type)
        .bind(new.parent_id)
        .bind(new.level)
        .bind(new.region_code)
        .bind(new.is_active)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Troca o pai de um nó e grava o novo nível dele.
    pub async fn update_parent<'e, E>(
        &self,
        executor: E,
        id: i64,
        parent_id: Option<i64>,
        level: i32,
    ) -> Result<Institution, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Institution>(&format!(
            r#"
            UPDATE institutions
            SET parent_id = $2, level = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INSTITUTION_COLUMNS
        ))
        .bind(id)
        .bind(parent_id)
        .bind(level)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::InstitutionNotFound(id))?;

        Ok(row)
    }

    /// Atualização em massa de níveis usando UNNEST. Só toca nas linhas que mudam.
    pub async fn update_levels<'e, E>(
        &self,
        executor: E,
        updates: &[LevelUpdate],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = updates.iter().map(|u| u.id).collect();
        let levels: Vec<i32> = updates.iter().map(|u| u.level).collect();

        let result = sqlx::query(
            r#"
            UPDATE institutions AS i
            SET level = u.level, updated_at = NOW()
            FROM UNNEST($1::bigint[], $2::int[]) AS u(id, level)
            WHERE i.id = u.id AND i.level <> u.level
            "#,
        )
        .bind(ids)
        .bind(levels)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn set_deleted<'e, E>(
        &self,
        executor: E,
        id: i64,
        deleted: bool,
    ) -> Result<Institution, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Institution>(&format!(
            r#"
            UPDATE institutions
            SET deleted_at = CASE WHEN $2 THEN NOW() ELSE NULL END, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            INSTITUTION_COLUMNS
        ))
        .bind(id)
        .bind(deleted)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::InstitutionNotFound(id))?;

        Ok(row)
    }

    /// Instituições (não excluídas) dentro do escopo, por nível e nome.
    pub async fn list_in_scope(
        &self,
        scope: &AccessScope,
        level: Option<i32>,
        include_inactive: bool,
    ) -> Result<Vec<Institution>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM institutions WHERE deleted_at IS NULL",
            INSTITUTION_COLUMNS
        ));

        if let Some(level) = level {
            builder.push(" AND level = ").push_bind(level);
        }
        if !include_inactive {
            builder.push(" AND is_active = TRUE");
        }
        push_scope_filter(&mut builder, scope, "id");
        builder.push(" ORDER BY level, name, id");

        let rows = builder
            .build_query_as::<Institution>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
