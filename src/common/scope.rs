// src/common/scope.rs

use std::collections::BTreeSet;

use sqlx::{Postgres, QueryBuilder};

use crate::common::hierarchy::InstitutionTree;
use crate::models::auth::{Role, ScopeSummary, User};

/// Região enxerga setores e escolas: dois níveis abaixo dela.
pub const REGION_EXPANSION_DEPTH: u32 = 2;
/// Setor enxerga as suas escolas.
pub const SECTOR_EXPANSION_DEPTH: u32 = 1;

// NOTE: a expansão é fixa por cargo. Numa árvore com 4-5 níveis abaixo da
// região, os nós mais fundos ficam fora do escopo do regionadmin.

/// O conjunto de instituições que um usuário pode ver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Sem filtro (superadmin)
    All,
    Institutions(BTreeSet<i64>),
}

impl AccessScope {
    pub fn none() -> Self {
        AccessScope::Institutions(BTreeSet::new())
    }

    pub fn allows(&self, institution_id: i64) -> bool {
        match self {
            AccessScope::All => true,
            AccessScope::Institutions(ids) => ids.contains(&institution_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AccessScope::Institutions(ids) if ids.is_empty())
    }

    pub fn summary(&self) -> ScopeSummary {
        match self {
            AccessScope::All => ScopeSummary {
                all: true,
                institution_ids: Vec::new(),
            },
            AccessScope::Institutions(ids) => ScopeSummary {
                all: false,
                institution_ids: ids.iter().copied().collect(),
            },
        }
    }
}

/// Quanto da árvore cada cargo enxerga a partir da própria instituição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExpansion {
    Everything,
    Subtree { depth: u32 },
}

/// A tabela única de despacho cargo -> expansão.
pub fn expansion_for(role: Role) -> ScopeExpansion {
    match role {
        Role::SuperAdmin => ScopeExpansion::Everything,
        Role::RegionAdmin | Role::RegionOperator => ScopeExpansion::Subtree {
            depth: REGION_EXPANSION_DEPTH,
        },
        Role::SektorAdmin | Role::SektorOperator => ScopeExpansion::Subtree {
            depth: SECTOR_EXPANSION_DEPTH,
        },
        Role::SchoolAdmin | Role::DeputyDirector | Role::Teacher => {
            ScopeExpansion::Subtree { depth: 0 }
        }
    }
}

/// Resolve o escopo do usuário sobre uma fotografia da árvore.
///
/// Falha fechado: cargo desconhecido, usuário sem instituição ou instituição
/// inexistente resultam em escopo vazio, nunca em erro.
pub fn resolve_scope(user: &User, tree: &InstitutionTree) -> AccessScope {
    let Some(role) = user.role() else {
        tracing::debug!(user_id = user.id, role = %user.role, "cargo desconhecido, escopo vazio");
        return AccessScope::none();
    };

    match expansion_for(role) {
        ScopeExpansion::Everything => AccessScope::All,
        ScopeExpansion::Subtree { depth } => {
            let Some(institution_id) = user.institution_id else {
                return AccessScope::none();
            };
            if !tree.contains(institution_id) {
                tracing::debug!(user_id = user.id, role = role.name(), institution_id, "instituição inexistente, escopo vazio");
                return AccessScope::none();
            }
            AccessScope::Institutions(tree.expand(institution_id, depth))
        }
    }
}

/// Acrescenta ` AND <column> = ANY($n)` à consulta. `All` não acrescenta nada
/// e um escopo vazio vira um predicado que nunca casa.
///
/// A consulta já precisa ter um `WHERE` aberto.
pub fn push_scope_filter(builder: &mut QueryBuilder<'_, Postgres>, scope: &AccessScope, column: &str) {
    match scope {
        AccessScope::All => {}
        AccessScope::Institutions(ids) if ids.is_empty() => {
            builder.push(" AND FALSE");
        }
        AccessScope::Institutions(ids) => {
            builder.push(" AND ");
            builder.push(column);
            builder.push(" = ANY(");
            builder.push_bind(ids.iter().copied().collect::<Vec<i64>>());
            builder.push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::hierarchy::tests::{institution, sample_tree};
    use chrono::Utc;

    fn user(role: &str, institution_id: Option<i64>) -> User {
        let now = Utc::now();
        User {
            id: 10,
            email: "someone@edu.az".into(),
            password_hash: String::new(),
            role: role.into(),
            institution_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(values: &[i64]) -> AccessScope {
        AccessScope::Institutions(values.iter().copied().collect())
    }

    #[test]
    fn superadmin_sees_everything_with_or_without_institution() {
        let tree = sample_tree();
        assert_eq!(resolve_scope(&user("superadmin", None), &tree), AccessScope::All);
        assert_eq!(resolve_scope(&user("superadmin", Some(999)), &tree), AccessScope::All);
    }

    #[test]
    fn region_roles_expand_two_levels() {
        let tree = sample_tree();
        for role in ["regionadmin", "regionoperator"] {
            let scope = resolve_scope(&user(role, Some(2)), &tree);
            // 8 está três níveis abaixo da região e fica de fora
            assert_eq!(scope, ids(&[2, 3, 4, 5, 6, 7]));
            assert!(!scope.allows(8));
            assert!(!scope.allows(1));
        }
    }

    #[test]
    fn sector_roles_expand_one_level() {
        let tree = sample_tree();
        for role in ["sektoradmin", "sektoroperator"] {
            assert_eq!(resolve_scope(&user(role, Some(3)), &tree), ids(&[3, 5, 6]));
        }
    }

    #[test]
    fn sector_scenario_excludes_the_region() {
        let tree = InstitutionTree::from_rows(vec![
            institution(1, None, 1, "region"),
            institution(2, Some(1), 2, "sector"),
            institution(3, Some(2), 3, "school"),
        ]);
        assert_eq!(resolve_scope(&user("sektoradmin", Some(2)), &tree), ids(&[2, 3]));
    }

    #[test]
    fn leaf_roles_see_only_their_institution() {
        let tree = sample_tree();
        for role in ["schooladmin", "məktəbadmin", "müəllim", "teacher", "müavin"] {
            assert_eq!(resolve_scope(&user(role, Some(5)), &tree), ids(&[5]));
        }
        // Mesmo com filhos abaixo
        assert_eq!(resolve_scope(&user("schooladmin", Some(3)), &tree), ids(&[3]));
    }

    #[test]
    fn fails_closed() {
        let tree = sample_tree();
        assert!(resolve_scope(&user("testadmin", Some(2)), &tree).is_empty());
        assert!(resolve_scope(&user("regionadmin", None), &tree).is_empty());
        assert!(resolve_scope(&user("regionadmin", Some(404)), &tree).is_empty());
        assert!(!AccessScope::All.is_empty());
    }

    #[test]
    fn inactive_and_deleted_institutions_stay_in_scope() {
        let mut rows = vec![institution(1, None, 1, "sector")];
        let mut inactive = institution(2, Some(1), 2, "school");
        inactive.is_active = false;
        let mut deleted = institution(3, Some(1), 2, "school");
        deleted.deleted_at = Some(Utc::now());
        rows.extend([inactive, deleted]);

        let tree = InstitutionTree::from_rows(rows);
        assert_eq!(resolve_scope(&user("sektoradmin", Some(1)), &tree), ids(&[1, 2, 3]));
    }

    #[test]
    fn resolution_is_idempotent() {
        let tree = sample_tree();
        let admin = user("regionadmin", Some(2));
        assert_eq!(resolve_scope(&admin, &tree), resolve_scope(&admin, &tree));
    }

    #[test]
    fn every_known_role_has_an_expansion() {
        for role in Role::ALL {
            let expansion = expansion_for(role);
            if role == Role::SuperAdmin {
                assert_eq!(expansion, ScopeExpansion::Everything);
            } else {
                assert!(matches!(expansion, ScopeExpansion::Subtree { .. }));
            }
        }
    }

    #[test]
    fn filter_renders_sql_per_scope() {
        let mut all = QueryBuilder::<Postgres>::new("SELECT id FROM scoped_resources WHERE 1 = 1");
        push_scope_filter(&mut all, &AccessScope::All, "institution_id");
        assert_eq!(all.sql(), "SELECT id FROM scoped_resources WHERE 1 = 1");

        let mut none = QueryBuilder::<Postgres>::new("SELECT id FROM scoped_resources WHERE 1 = 1");
        push_scope_filter(&mut none, &AccessScope::none(), "institution_id");
        assert_eq!(none.sql(), "SELECT id FROM scoped_resources WHERE 1 = 1 AND FALSE");

        let mut some = QueryBuilder::<Postgres>::new("SELECT id FROM scoped_resources WHERE 1 = 1");
        push_scope_filter(&mut some, &ids(&[2, 3]), "institution_id");
        assert_eq!(
            some.sql(),
            "SELECT id FROM scoped_resources WHERE 1 = 1 AND institution_id = ANY($1)"
        );
    }

    #[test]
    fn summary_lists_ids_in_order() {
        let summary = ids(&[7, 2, 5]).summary();
        assert!(!summary.all);
        assert_eq!(summary.institution_ids, vec![2, 5, 7]);
        assert!(AccessScope::All.summary().all);
    }
}
