// src/services/institution_service.rs

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::PgPool;

use crate::common::db_utils::lock_institution_tree;
use crate::common::error::AppError;
use crate::common::hierarchy::{HierarchyViolation, InstitutionTree, TreeViewOptions};
use crate::common::scope::AccessScope;
use crate::db::institution_repo::NewInstitution;
use crate::db::InstitutionRepository;
use crate::models::auth::User;
use crate::models::institution::{
    CreateInstitutionPayload, HierarchyNode, HierarchyResponse, HierarchyValidationReport,
    Institution, LevelListing, PathEntry,
};
use crate::services::scope_service::ScopeService;

#[derive(Clone)]
pub struct InstitutionService {
    repo: InstitutionRepository,
    scope_service: ScopeService,
    pool: PgPool, // Usamos a pool para iniciar transações
}

// Nó existe, não foi excluído e está no escopo do usuário?
fn ensure_visible(tree: &InstitutionTree, scope: &AccessScope, id: i64) -> Result<(), AppError> {
    match tree.get(id) {
        Some(node) if !node.is_deleted() => {
            if scope.allows(id) {
                Ok(())
            } else {
                Err(AppError::OutOfScope(id))
            }
        }
        _ => Err(AppError::InstitutionNotFound(id)),
    }
}

impl InstitutionService {
    pub fn new(repo: InstitutionRepository, scope_service: ScopeService, pool: PgPool) -> Self {
        Self { repo, scope_service, pool }
    }

    /// Instituições visíveis para o usuário (sem as excluídas).
    pub async fn list_visible(
        &self,
        actor: &User,
        include_inactive: bool,
    ) -> Result<Vec<Institution>, AppError> {
        let scope = self.scope_service.resolve_scope(actor).await?;
        self.repo.list_in_scope(&scope, None, include_inactive).await
    }

    pub async fn get(&self, actor: &User, id: i64) -> Result<Institution, AppError> {
        let (scope, tree) = self.scope_service.snapshot(actor).await?;
        ensure_visible(&tree, &scope, id)?;

        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::InstitutionNotFound(id))
    }

    /// Cria uma instituição com o nível derivado do pai.
    /// Só o superadmin cria raízes; os demais só abaixo de algo no seu escopo.
    pub async fn create(
        &self,
        actor: &User,
        payload: &CreateInstitutionPayload,
    ) -> Result<Institution, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_institution_tree(&mut tx).await?;

        let tree = InstitutionTree::from_rows(self.repo.load_tree(&mut *tx).await?);
        let scope = self.scope_service.resolve_within(actor, &tree);

        match payload.parent_id {
            None if !actor.is_superadmin() => {
                return Err(AppError::RoleForbidden(actor.role.clone()));
            }
            Some(parent_id) if tree.contains(parent_id) && !scope.allows(parent_id) => {
                return Err(AppError::OutOfScope(parent_id));
            }
            _ => {}
        }

        let level = tree
            .level_under(payload.parent_id)
            .map_err(AppError::InvalidPlacement)?;

        let institution = self
            .repo
            .create(
                &mut *tx,
                &NewInstitution {
                    name: &payload.name,
                    short_name: payload.short_name.as_deref(),
                    institution_type: payload.institution_type.as_str(),
                    parent_id: payload.parent_id,
                    level,
                    region_code: payload.region_code.as_deref(),
                    is_active: payload.is_active,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            institution_id = institution.id,
            parent_id = ?institution.parent_id,
            level = institution.level,
            actor = actor.id,
            "🏫 Instituição criada"
        );

        Ok(institution)
    }

    /// Move a instituição para baixo de `new_parent_id` (ou para a raiz) e
    /// recalcula o nível de toda a subárvore, tudo numa transação só.
    pub async fn move_institution(
        &self,
        actor: &User,
        id: i64,
        new_parent_id: Option<i64>,
    ) -> Result<Institution, AppError> {
        // 1. Inicia a transação e trava a árvore contra outros moves
        let mut tx = self.pool.begin().await?;
        lock_institution_tree(&mut tx).await?;

        // 2. Fotografia da árvore dentro da própria transação
        let tree = InstitutionTree::from_rows(self.repo.load_tree(&mut *tx).await?);
        let scope = self.scope_service.resolve_within(actor, &tree);

        if tree.get(id).is_none_or(|node| node.is_deleted()) {
            return Err(AppError::InvalidMove(HierarchyViolation::InstitutionNotFound(id)));
        }
        if !scope.allows(id) {
            return Err(AppError::OutOfScope(id));
        }
        match new_parent_id {
            // Virar raiz é exclusividade do superadmin
            None if !actor.is_superadmin() => {
                return Err(AppError::RoleForbidden(actor.role.clone()));
            }
            Some(parent_id) if tree.contains(parent_id) && !scope.allows(parent_id) => {
                return Err(AppError::OutOfScope(parent_id));
            }
            _ => {}
        }

        // 3. Valida e calcula os níveis (nada foi escrito ainda)
        let plan = tree.plan_move(id, new_parent_id).map_err(|violation| {
            tracing::warn!(institution_id = id, ?new_parent_id, %violation, "Move rejeitado");
            AppError::InvalidMove(violation)
        })?;

        // 4. Grava o novo pai e depois os níveis dos descendentes
        let moved = self
            .repo
            .update_parent(&mut *tx, id, plan.new_parent_id, plan.new_level())
            .await?;
        let relevelled = self
            .repo
            .update_levels(&mut *tx, &plan.levels[1..])
            .await?;

        // 5. Commit
        tx.commit().await?;

        tracing::info!(
            institution_id = id,
            new_parent_id = ?new_parent_id,
            level = moved.level,
            descendants = plan.levels.len() - 1,
            relevelled,
            actor = actor.id,
            "🔀 Instituição movida"
        );

        Ok(moved)
    }

    pub async fn soft_delete(&self, actor: &User, id: i64) -> Result<Institution, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_institution_tree(&mut tx).await?;

        let tree = InstitutionTree::from_rows(self.repo.load_tree(&mut *tx).await?);
        let scope = self.scope_service.resolve_within(actor, &tree);
        ensure_visible(&tree, &scope, id)?;

        let has_live_descendants = tree
            .descendants(id)
            .into_iter()
            .any(|child| tree.get(child).is_some_and(|node| !node.is_deleted()));
        if has_live_descendants {
            return Err(AppError::InstitutionHasChildren(id));
        }

        let institution = self.repo.set_deleted(&mut *tx, id, true).await?;
        tx.commit().await?;

        tracing::info!(institution_id = id, actor = actor.id, "🗑️ Instituição excluída (soft delete)");
        Ok(institution)
    }

    pub async fn restore(&self, actor: &User, id: i64) -> Result<Institution, AppError> {
        let mut tx = self.pool.begin().await?;
        lock_institution_tree(&mut tx).await?;

        let tree = InstitutionTree::from_rows(self.repo.load_tree(&mut *tx).await?);
        let scope = self.scope_service.resolve_within(actor, &tree);

        let node = tree.get(id).ok_or(AppError::InstitutionNotFound(id))?;
        if !node.is_deleted() {
            return Err(AppError::InstitutionNotDeleted(id));
        }
        if !scope.allows(id) {
            return Err(AppError::OutOfScope(id));
        }

        // O pai precisa continuar existindo
        tree.level_under(node.parent_id)
            .map_err(AppError::InvalidPlacement)?;

        let institution = self.repo.set_deleted(&mut *tx, id, false).await?;
        tx.commit().await?;

        tracing::info!(institution_id = id, actor = actor.id, "♻️ Instituição restaurada");
        Ok(institution)
    }

    /// Árvore completa a partir das raízes visíveis.
    pub async fn hierarchy(
        &self,
        actor: &User,
        options: TreeViewOptions,
    ) -> Result<HierarchyResponse, AppError> {
        let (scope, tree) = self.scope_service.snapshot(actor).await?;

        let data = tree
            .visible_roots(&scope, options.include_inactive)
            .into_iter()
            .filter_map(|root| tree.build_node(root, &scope, &options))
            .collect();

        Ok(HierarchyResponse {
            data,
            hierarchy_stats: tree.statistics(&scope),
        })
    }

    /// Subárvore de `id`, descendo `depth` níveis.
    pub async fn subtree(
        &self,
        actor: &User,
        id: i64,
        depth: u32,
        include_inactive: bool,
    ) -> Result<HierarchyNode, AppError> {
        let (scope, tree) = self.scope_service.snapshot(actor).await?;
        ensure_visible(&tree, &scope, id)?;

        let options = TreeViewOptions {
            max_depth: depth + 1,
            include_inactive,
            expand_all: true,
        };

        tree.build_node(id, &scope, &options)
            .ok_or(AppError::InstitutionNotFound(id))
    }

    /// Breadcrumb da raiz até `id`, cortado no que o usuário pode ver.
    pub async fn path(&self, actor: &User, id: i64) -> Result<Vec<PathEntry>, AppError> {
        let (scope, tree) = self.scope_service.snapshot(actor).await?;
        ensure_visible(&tree, &scope, id)?;

        Ok(tree
            .path_to_root(id)
            .into_iter()
            .filter(|entry| scope.allows(entry.id))
            .collect())
    }

    pub async fn by_level(
        &self,
        actor: &User,
        level: i32,
        include_inactive: bool,
    ) -> Result<LevelListing, AppError> {
        let scope = self.scope_service.resolve_scope(actor).await?;
        let data = self.repo.list_in_scope(&scope, Some(level), include_inactive).await?;

        let types: BTreeSet<String> = data.iter().map(|i| i.institution_type.clone()).collect();

        Ok(LevelListing {
            level,
            count: data.len(),
            types: types.into_iter().collect(),
            data,
        })
    }

    /// Auditoria da árvore inteira: órfãos, níveis errados e ciclos.
    pub async fn validate_hierarchy(&self) -> Result<HierarchyValidationReport, AppError> {
        let tree = self.scope_service.load_tree().await?;
        let audit = tree.audit();

        if !audit.is_valid() {
            tracing::warn!(
                institutions = tree.len(),
                issues = audit.total_issues(),
                "⚠️ Hierarquia com problemas"
            );
        }

        Ok(HierarchyValidationReport {
            is_valid: audit.is_valid(),
            total_issues: audit.total_issues(),
            audit,
            checked_at: Utc::now(),
        })
    }
}


// Rodam contra um Postgres de verdade; o #[sqlx::test] cria um banco novo
// por teste e aplica as migrações.
#[cfg(all(test, feature = "db-tests"))]
mod db_tests {
    use super::*;
    use std::collections::HashMap;

    use chrono::{DateTime, Utc};

    use crate::models::institution::InstitutionType;

    struct Fixture {
        repo: InstitutionRepository,
        service: InstitutionService,
        ids: HashMap<&'static str, i64>,
    }

    fn actor(role: &str, institution_id: Option<i64>) -> User {
        let now = Utc::now();
        User {
            id: 1,
            email: "actor@edu.az".into(),
            password_hash: String::new(),
            role: role.into(),
            institution_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn insert(
        repo: &InstitutionRepository,
        pool: &PgPool,
        parent: Option<&Institution>,
        name: &str,
        kind: InstitutionType,
    ) -> Institution {
        repo.create(
            pool,
            &NewInstitution {
                name,
                short_name: None,
                institution_type: kind.as_str(),
                parent_id: parent.map(|p| p.id),
                level: parent.map_or(1, |p| p.level + 1),
                region_code: None,
                is_active: true,
            },
        )
        .await
        .unwrap()
    }

    // ministério > região > setores A, B > escolas A1, A2 (em A), B1 (em B) > filial (em A1)
    async fn fixture(pool: PgPool) -> Fixture {
        let repo = InstitutionRepository::new(pool.clone());
        let scope_service = ScopeService::new(repo.clone(), pool.clone());
        let service = InstitutionService::new(repo.clone(), scope_service, pool.clone());

        let ministry = insert(&repo, &pool, None, "Ministério", InstitutionType::Ministry).await;
        let region = insert(&repo, &pool, Some(&ministry), "Região", InstitutionType::Region).await;
        let sector_a = insert(&repo, &pool, Some(&region), "Setor A", InstitutionType::Sector).await;
        let sector_b = insert(&repo, &pool, Some(&region), "Setor B", InstitutionType::Sector).await;
        let school_a1 = insert(&repo, &pool, Some(&sector_a), "Escola A1", InstitutionType::School).await;
        let school_a2 = insert(&repo, &pool, Some(&sector_a), "Escola A2", InstitutionType::School).await;
        let school_b1 = insert(&repo, &pool, Some(&sector_b), "Escola B1", InstitutionType::School).await;
        let branch = insert(&repo, &pool, Some(&school_a1), "Filial A1", InstitutionType::Other).await;

        let ids = HashMap::from([
            ("ministry", ministry.id),
            ("region", region.id),
            ("sector_a", sector_a.id),
            ("sector_b", sector_b.id),
            ("school_a1", school_a1.id),
            ("school_a2", school_a2.id),
            ("school_b1", school_b1.id),
            ("branch", branch.id),
        ]);

        Fixture { repo, service, ids }
    }

    type Row = (i64, Option<i64>, i32, DateTime<Utc>);

    async fn persisted(repo: &InstitutionRepository, pool: &PgPool) -> Vec<Row> {
        repo.load_tree(pool)
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.id, i.parent_id, i.level, i.updated_at))
            .collect()
    }

    fn assert_levels_consistent(rows: &[Row]) {
        let levels: HashMap<i64, i32> = rows.iter().map(|(id, _, level, _)| (*id, *level)).collect();
        for (id, parent_id, level, _) in rows {
            let expected = parent_id.map_or(1, |p| levels[&p] + 1);
            assert_eq!(*level, expected, "nível gravado errado no nó {}", id);
        }
    }

    fn level_of(rows: &[Row], id: i64) -> i32 {
        rows.iter().find(|row| row.0 == id).map(|row| row.2).unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn move_persists_levels_of_the_whole_subtree(pool: PgPool) {
        let f = fixture(pool.clone()).await;
        let superadmin = actor("superadmin", None);

        // Setor A sobe para debaixo do ministério: A1, A2 e a filial sobem junto
        let moved = f
            .service
            .move_institution(&superadmin, f.ids["sector_a"], Some(f.ids["ministry"]))
            .await
            .unwrap();
        assert_eq!(moved.level, 2);
        assert_eq!(moved.parent_id, Some(f.ids["ministry"]));

        let rows = persisted(&f.repo, &pool).await;
        assert_levels_consistent(&rows);
        assert_eq!(level_of(&rows, f.ids["school_a1"]), 3);
        assert_eq!(level_of(&rows, f.ids["school_a2"]), 3);
        assert_eq!(level_of(&rows, f.ids["branch"]), 4);
        // Fora da subárvore nada muda
        assert_eq!(level_of(&rows, f.ids["school_b1"]), 4);

        // E para a raiz
        f.service
            .move_institution(&superadmin, f.ids["sector_a"], None)
            .await
            .unwrap();
        let rows = persisted(&f.repo, &pool).await;
        assert_levels_consistent(&rows);
        assert_eq!(level_of(&rows, f.ids["branch"]), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejected_moves_leave_every_row_untouched(pool: PgPool) {
        let f = fixture(pool.clone()).await;
        let superadmin = actor("superadmin", None);
        let before = persisted(&f.repo, &pool).await;

        let cyclic = f
            .service
            .move_institution(&superadmin, f.ids["region"], Some(f.ids["school_a1"]))
            .await;
        assert!(matches!(
            cyclic,
            Err(AppError::InvalidMove(HierarchyViolation::CyclicParent { .. }))
        ));

        // Setor A abaixo da escola B1: a filial iria para o nível 7
        let too_deep = f
            .service
            .move_institution(&superadmin, f.ids["sector_a"], Some(f.ids["school_b1"]))
            .await;
        assert!(matches!(
            too_deep,
            Err(AppError::InvalidMove(HierarchyViolation::DepthExceeded { .. }))
        ));

        let self_parent = f
            .service
            .move_institution(&superadmin, f.ids["sector_b"], Some(f.ids["sector_b"]))
            .await;
        assert!(matches!(
            self_parent,
            Err(AppError::InvalidMove(HierarchyViolation::SelfParent))
        ));

        assert_eq!(persisted(&f.repo, &pool).await, before);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bulk_relevel_only_touches_rows_that_change(pool: PgPool) {
        let f = fixture(pool.clone()).await;

        let written = f
            .repo
            .update_levels(
                &pool,
                &[
                    crate::common::hierarchy::LevelUpdate { id: f.ids["school_a1"], level: 4 },
                    crate::common::hierarchy::LevelUpdate { id: f.ids["branch"], level: 9 },
                ],
            )
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(f.repo.update_levels(&pool, &[]).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_moves_are_serialized(pool: PgPool) {
        let f = fixture(pool.clone()).await;
        let superadmin = actor("superadmin", None);

        let (first, second) = tokio::join!(
            f.service
                .move_institution(&superadmin, f.ids["sector_a"], Some(f.ids["ministry"])),
            f.service
                .move_institution(&superadmin, f.ids["school_b1"], Some(f.ids["school_a2"])),
        );
        first.unwrap();
        second.unwrap();

        let rows = persisted(&f.repo, &pool).await;
        assert_levels_consistent(&rows);
        assert_eq!(level_of(&rows, f.ids["school_b1"]), 4);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn sector_admin_lists_only_its_scope(pool: PgPool) {
        let f = fixture(pool.clone()).await;
        let sector_admin = actor("sektoradmin", Some(f.ids["sector_a"]));

        let ids = |list: Vec<Institution>| -> BTreeSet<i64> { list.into_iter().map(|i| i.id).collect() };

        // Um nível abaixo do setor: a filial (dois níveis) fica de fora
        let visible = f.service.list_visible(&sector_admin, false).await.unwrap();
        assert_eq!(
            ids(visible),
            BTreeSet::from([f.ids["sector_a"], f.ids["school_a1"], f.ids["school_a2"]])
        );

        let schools = f.service.by_level(&sector_admin, 4, false).await.unwrap();
        assert_eq!(schools.count, 2);
        assert_eq!(schools.types, vec!["school".to_string()]);

        // Excluída some da listagem, mas continua no escopo para ser restaurada
        f.service
            .soft_delete(&sector_admin, f.ids["school_a2"])
            .await
            .unwrap();
        let visible = f.service.list_visible(&sector_admin, false).await.unwrap();
        assert_eq!(ids(visible), BTreeSet::from([f.ids["sector_a"], f.ids["school_a1"]]));

        let restored = f
            .service
            .restore(&sector_admin, f.ids["school_a2"])
            .await
            .unwrap();
        assert!(!restored.is_deleted());

        // Outro setor e o pai ficam fora
        let outside = f.service.get(&sector_admin, f.ids["school_b1"]).await;
        assert!(matches!(outside, Err(AppError::OutOfScope(_))));
        let deleting_parent = f.service.soft_delete(&sector_admin, f.ids["school_a1"]).await;
        assert!(matches!(deleting_parent, Err(AppError::InstitutionHasChildren(_))));
    }
}
