// src/services/scope_service.rs

use sqlx::PgPool;

use crate::common::error::AppError;
use crate::common::hierarchy::InstitutionTree;
use crate::common::scope::{expansion_for, resolve_scope, AccessScope, ScopeExpansion};
use crate::db::InstitutionRepository;
use crate::models::auth::User;

#[derive(Clone)]
pub struct ScopeService {
    institution_repo: InstitutionRepository,
    pool: PgPool,
}

impl ScopeService {
    pub fn new(institution_repo: InstitutionRepository, pool: PgPool) -> Self {
        Self { institution_repo, pool }
    }

    /// Fotografia da árvore lida de uma vez só (leitura consistente).
    pub async fn load_tree(&self) -> Result<InstitutionTree, AppError> {
        let rows = self.institution_repo.load_tree(&self.pool).await?;
        Ok(InstitutionTree::from_rows(rows))
    }

    /// Escopo sobre uma árvore já lida (ex.: dentro da transação de um move).
    pub fn resolve_within(&self, user: &User, tree: &InstitutionTree) -> AccessScope {
        resolve_scope(user, tree)
    }

    /// Árvore e escopo lidos juntos, para quem também precisa navegar na árvore.
    pub async fn snapshot(&self, user: &User) -> Result<(AccessScope, InstitutionTree), AppError> {
        let tree = self.load_tree().await?;
        let scope = resolve_scope(user, &tree);
        Ok((scope, tree))
    }

    /// Escopo do usuário. O superadmin nem chega a carregar a árvore.
    pub async fn resolve_scope(&self, user: &User) -> Result<AccessScope, AppError> {
        let needs_tree = matches!(
            user.role().map(expansion_for),
            Some(ScopeExpansion::Subtree { .. })
        ) && user.institution_id.is_some();

        if !needs_tree {
            // Sem árvore, o resultado só depende do cargo
            return Ok(resolve_scope(user, &InstitutionTree::default()));
        }

        let tree = self.load_tree().await?;
        let scope = resolve_scope(user, &tree);

        tracing::debug!(
            user_id = user.id,
            role = %user.role,
            visible = scope.summary().institution_ids.len(),
            "escopo resolvido"
        );

        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;

    // Pool que nunca conecta: qualquer leitura da árvore viraria erro
    fn service() -> ScopeService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        ScopeService::new(InstitutionRepository::new(pool.clone()), pool)
    }

    fn user(role: &str, institution_id: Option<i64>) -> User {
        let now = Utc::now();
        User {
            id: 7,
            email: "someone@edu.az".into(),
            password_hash: String::new(),
            role: role.into(),
            institution_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn role_alone_decides_without_reading_the_tree() {
        let scopes = service();

        assert_eq!(scopes.resolve_scope(&user("superadmin", None)).await.unwrap(), AccessScope::All);
        assert!(scopes.resolve_scope(&user("testadmin", Some(3))).await.unwrap().is_empty());
        assert!(scopes.resolve_scope(&user("sektoradmin", None)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolves_within_a_given_snapshot() {
        let tree = crate::common::hierarchy::tests::sample_tree();
        let scope = service().resolve_within(&user("sektoradmin", Some(4)), &tree);
        assert_eq!(scope, AccessScope::Institutions([4, 7].into_iter().collect()));
    }
}
