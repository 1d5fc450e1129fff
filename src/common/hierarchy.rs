// src/common/hierarchy.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use thiserror::Error;

use crate::common::scope::AccessScope;
use crate::models::institution::{
    HierarchyAudit, HierarchyNode, HierarchyStats, Institution, LevelInconsistency,
    OrphanedInstitution, PathEntry,
};

/// Profundidade máxima da árvore (ministério > região > setor > escola > ...).
pub const MAX_TREE_DEPTH: i32 = 5;

/// Por que uma instituição não pode ficar onde pediram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyViolation {
    #[error("institution {0} not found")]
    InstitutionNotFound(i64),

    #[error("institution cannot be its own parent")]
    SelfParent,

    #[error("parent institution {0} does not exist")]
    ParentNotFound(i64),

    #[error("parent {parent_id} is a descendant of {institution_id}")]
    CyclicParent { institution_id: i64, parent_id: i64 },

    #[error("resulting depth {resulting} exceeds maximum {max}")]
    DepthExceeded { resulting: i32, max: i32 },
}

/// Um nó que muda de nível por causa de um move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    pub id: i64,
    pub level: i32,
}

/// Resultado validado de um move: o novo pai e o nível de cada nó da subárvore,
/// em ordem de profundidade (o próprio nó primeiro).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub institution_id: i64,
    pub new_parent_id: Option<i64>,
    pub levels: Vec<LevelUpdate>,
}

impl MovePlan {
    pub fn new_level(&self) -> i32 {
        self.levels.first().map(|u| u.level).unwrap_or(1)
    }
}

/// Opções de montagem da árvore para exibição.
#[derive(Debug, Clone, Copy)]
pub struct TreeViewOptions {
    pub max_depth: u32,
    pub include_inactive: bool,
    pub expand_all: bool,
}

impl Default for TreeViewOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_TREE_DEPTH as u32,
            include_inactive: false,
            expand_all: false,
        }
    }
}

// Sem expand_all, só os dois primeiros níveis são abertos
const COLLAPSED_VIEW_DEPTH: u32 = 2;

/// Fotografia consistente da tabela `institutions`, com o índice pai -> filhos.
///
/// Toda travessia segue `parent_id`; a coluna `level` nunca é usada para
/// descobrir descendentes, porque pode estar desatualizada.
#[derive(Debug, Clone, Default)]
pub struct InstitutionTree {
    nodes: HashMap<i64, Institution>,
    children: HashMap<i64, Vec<i64>>,
}

impl InstitutionTree {
    pub fn from_rows(rows: Vec<Institution>) -> Self {
        let mut nodes = HashMap::with_capacity(rows.len());
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();

        for row in rows {
            if let Some(parent_id) = row.parent_id {
                children.entry(parent_id).or_default().push(row.id);
            }
            nodes.insert(row.id, row);
        }

        // Ordem estável: nome, depois id
        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let (na, nb) = (&nodes[a], &nodes[b]);
                na.name.cmp(&nb.name).then(a.cmp(b))
            });
        }

        Self { nodes, children }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: i64) -> Option<&Institution> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn children_of(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// BFS a partir de `root`, descendo no máximo `depth` níveis.
    /// Inclui o próprio `root`; nós inativos e excluídos entram também.
    pub fn expand(&self, root: i64, depth: u32) -> BTreeSet<i64> {
        let mut found = BTreeSet::new();
        if !self.contains(root) {
            return found;
        }

        let mut queue = VecDeque::from([(root, 0u32)]);
        found.insert(root);

        while let Some((id, distance)) = queue.pop_front() {
            if distance == depth {
                continue;
            }
            for &child in self.children_of(id) {
                if found.insert(child) {
                    queue.push_back((child, distance + 1));
                }
            }
        }

        found
    }

    /// Todos os descendentes (sem limite), sem incluir o próprio nó.
    pub fn descendants(&self, id: i64) -> BTreeSet<i64> {
        let mut found = self.expand(id, u32::MAX);
        found.remove(&id);
        found
    }

    /// `candidate` está abaixo de `ancestor`? Sobe pela cadeia de pais.
    pub fn is_descendant(&self, ancestor: i64, candidate: i64) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.get(candidate).and_then(|node| node.parent_id);

        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.get(id).and_then(|node| node.parent_id);
        }

        false
    }

    /// Maior distância de `id` até uma folha da sua subárvore (0 para folha).
    pub fn subtree_height(&self, id: i64) -> i32 {
        let mut height = 0;
        let mut seen = HashSet::from([id]);
        let mut stack = vec![(id, 0i32)];

        while let Some((node, distance)) = stack.pop() {
            height = height.max(distance);
            for &child in self.children_of(node) {
                if seen.insert(child) {
                    stack.push((child, distance + 1));
                }
            }
        }

        height
    }

    /// Caminho da raiz até `id` (breadcrumb). Vazio se o nó não existe.
    pub fn path_to_root(&self, id: i64) -> Vec<PathEntry> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.get(id);

        while let Some(node) = current {
            if !seen.insert(node.id) {
                break;
            }
            path.push(PathEntry {
                id: node.id,
                name: node.name.clone(),
                institution_type: node.institution_type.clone(),
                level: node.level,
            });
            current = node.parent_id.and_then(|parent_id| self.get(parent_id));
        }

        path.reverse();
        path
    }

    /// Nível que um nó novo teria abaixo de `parent_id`.
    pub fn level_under(&self, parent_id: Option<i64>) -> Result<i32, HierarchyViolation> {
        let Some(parent_id) = parent_id else {
            return Ok(1);
        };

        let parent = self
            .get(parent_id)
            .filter(|parent| !parent.is_deleted())
            .ok_or(HierarchyViolation::ParentNotFound(parent_id))?;

        let level = parent.level + 1;
        if level > MAX_TREE_DEPTH {
            return Err(HierarchyViolation::DepthExceeded {
                resulting: level,
                max: MAX_TREE_DEPTH,
            });
        }

        Ok(level)
    }

    /// Valida o move de `id` para debaixo de `new_parent_id` e calcula o novo
    /// nível de toda a subárvore. Nada é alterado aqui.
    pub fn plan_move(
        &self,
        id: i64,
        new_parent_id: Option<i64>,
    ) -> Result<MovePlan, HierarchyViolation> {
        if !self.contains(id) {
            return Err(HierarchyViolation::InstitutionNotFound(id));
        }

        let new_level = match new_parent_id {
            None => 1,
            Some(parent_id) => {
                if parent_id == id {
                    return Err(HierarchyViolation::SelfParent);
                }
                let parent = self
                    .get(parent_id)
                    .filter(|parent| !parent.is_deleted())
                    .ok_or(HierarchyViolation::ParentNotFound(parent_id))?;
                if self.is_descendant(id, parent_id) {
                    return Err(HierarchyViolation::CyclicParent {
                        institution_id: id,
                        parent_id,
                    });
                }
                parent.level + 1
            }
        };

        let deepest = new_level + self.subtree_height(id);
        if deepest > MAX_TREE_DEPTH {
            return Err(HierarchyViolation::DepthExceeded {
                resulting: deepest,
                max: MAX_TREE_DEPTH,
            });
        }

        // DFS em pré-ordem: pai sempre antes dos filhos
        let mut levels = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack = vec![(id, new_level)];

        while let Some((node, level)) = stack.pop() {
            levels.push(LevelUpdate { id: node, level });
            for &child in self.children_of(node).iter().rev() {
                if seen.insert(child) {
                    stack.push((child, level + 1));
                }
            }
        }

        Ok(MovePlan {
            institution_id: id,
            new_parent_id,
            levels,
        })
    }

    /// Procura nós órfãos, níveis inconsistentes e ciclos de `parent_id`.
    pub fn audit(&self) -> HierarchyAudit {
        let mut audit = HierarchyAudit::default();

        let mut ids: Vec<i64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();

        for &id in &ids {
            let node = &self.nodes[&id];
            if node.is_deleted() {
                continue;
            }

            let expected_level = match node.parent_id {
                None => Some(1),
                Some(parent_id) => match self.get(parent_id).filter(|p| !p.is_deleted()) {
                    Some(parent) => Some(parent.level + 1),
                    None => {
                        audit.orphaned.push(OrphanedInstitution {
                            id,
                            name: node.name.clone(),
                            missing_parent_id: parent_id,
                        });
                        None
                    }
                },
            };

            if let Some(expected_level) = expected_level {
                if node.level != expected_level {
                    audit.level_inconsistencies.push(LevelInconsistency {
                        id,
                        name: node.name.clone(),
                        level: node.level,
                        expected_level,
                    });
                }
            }
        }

        audit.cycles = self.find_cycles(&ids);
        audit
    }

    // Cada nó tem no máximo um pai, então basta seguir a cadeia e marcar
    // por onde já passou (0 = não visto, 1 = na cadeia atual, 2 = resolvido).
    fn find_cycles(&self, ids: &[i64]) -> Vec<Vec<i64>> {
        let mut state: HashMap<i64, u8> = HashMap::with_capacity(ids.len());
        let mut cycles = Vec::new();

        for &start in ids {
            if state.get(&start).copied().unwrap_or(0) != 0 {
                continue;
            }

            let mut chain = Vec::new();
            let mut current = Some(start);

            while let Some(id) = current {
                match state.get(&id).copied().unwrap_or(0) {
                    0 => {
                        state.insert(id, 1);
                        chain.push(id);
                        current = self.get(id).and_then(|node| node.parent_id);
                    }
                    1 => {
                        if let Some(pos) = chain.iter().position(|&c| c == id) {
                            let mut cycle = chain[pos..].to_vec();
                            if let Some(min_pos) = cycle
                                .iter()
                                .enumerate()
                                .min_by_key(|(_, c)| **c)
                                .map(|(i, _)| i)
                            {
                                cycle.rotate_left(min_pos);
                            }
                            cycles.push(cycle);
                        }
                        break;
                    }
                    _ => break,
                }
            }

            for id in chain {
                state.insert(id, 2);
            }
        }

        cycles
    }

    fn visible(&self, node: &Institution, scope: &AccessScope, include_inactive: bool) -> bool {
        !node.is_deleted() && (include_inactive || node.is_active) && scope.allows(node.id)
    }

    /// Raízes visíveis: nós sem pai ou cujo pai está fora do que o usuário enxerga.
    pub fn visible_roots(&self, scope: &AccessScope, include_inactive: bool) -> Vec<i64> {
        let mut roots: Vec<&Institution> = self
            .nodes
            .values()
            .filter(|node| self.visible(node, scope, include_inactive))
            .filter(|node| match node.parent_id.and_then(|p| self.get(p)) {
                None => true,
                Some(parent) => !self.visible(parent, scope, include_inactive),
            })
            .collect();

        roots.sort_by(|a, b| a.level.cmp(&b.level).then(a.name.cmp(&b.name)).then(a.id.cmp(&b.id)));
        roots.into_iter().map(|node| node.id).collect()
    }

    /// Monta o nó `id` com os filhos aninhados, respeitando as opções.
    pub fn build_node(
        &self,
        id: i64,
        scope: &AccessScope,
        options: &TreeViewOptions,
    ) -> Option<HierarchyNode> {
        self.build_node_at(id, scope, options, 1)
    }

    fn build_node_at(
        &self,
        id: i64,
        scope: &AccessScope,
        options: &TreeViewOptions,
        depth: u32,
    ) -> Option<HierarchyNode> {
        let node = self.get(id)?;

        let visible_children: Vec<i64> = self
            .children_of(id)
            .iter()
            .copied()
            .filter(|child| {
                self.get(*child)
                    .is_some_and(|c| self.visible(c, scope, options.include_inactive))
            })
            .collect();

        let expand = depth < options.max_depth && (options.expand_all || depth <= COLLAPSED_VIEW_DEPTH);
        let children = if expand {
            visible_children
                .iter()
                .filter_map(|child| self.build_node_at(*child, scope, options, depth + 1))
                .collect()
        } else {
            Vec::new()
        };

        Some(HierarchyNode {
            id: node.id,
            name: node.name.clone(),
            institution_type: node.institution_type.clone(),
            level: node.level,
            is_active: node.is_active,
            has_children: !visible_children.is_empty(),
            children_count: visible_children.len(),
            children,
        })
    }

    /// Contagens gerais (ignora excluídos).
    pub fn statistics(&self, scope: &AccessScope) -> HierarchyStats {
        let mut stats = HierarchyStats::default();

        for node in self.nodes.values() {
            if node.is_deleted() || !scope.allows(node.id) {
                continue;
            }
            stats.total_institutions += 1;
            if node.is_active {
                stats.active_institutions += 1;
            }
            if node.parent_id.is_none() {
                stats.root_institutions += 1;
            }
            stats.max_level = Some(stats.max_level.map_or(node.level, |max| max.max(node.level)));
            *stats.by_level.entry(node.level).or_default() += 1;
            *stats
                .by_type
                .entry(node.institution_type.clone())
                .or_default() += 1;
        }

        stats
    }
}
