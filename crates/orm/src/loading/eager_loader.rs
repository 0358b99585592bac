//! Eager Loader - compiles relation names into a single load plan
//!
//! Every requested relation name is resolved to its shortest path from the
//! root entity. The paths are then walked hop by hop, choosing a strategy per
//! hop:
//!
//! - to-one: left outer join
//! - to-many without a limit: batched secondary statement keyed by parent keys
//! - to-many with a limit: ordered, limited lateral sub-select
//! - to-many back to the root type with a self key: aliased self join
//!
//! Target types already loaded in the same compilation are never joined twice;
//! the walk continues from the node that loaded them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use once_cell::sync::Lazy;

use crate::config::{PlannerConfig, DEFAULT_RELATIONSHIP_LOAD_LIMIT};
use crate::error::{ModelError, ModelResult, QueryError};
use crate::query::{ColumnRef, Condition, JoinClause, JoinSource, JoinType, OrderDirection, OrderSpec, SelectStatement};
use crate::relationships::{self, Cardinality, EntityDef, EntityId, JoinCondition, RelationshipDescriptor, SchemaGraph};
use super::alias::AliasAllocator;
use super::cache::{CacheKey, PlanCache};
use super::plan::{BatchedLoad, LoadPlan, LoadStrategy, LoaderNode, NodeId, RowSource};

static PLAN_CACHE: Lazy<PlanCache> = Lazy::new(PlanCache::new);

/// Process-wide plan cache used by [`select_with_relationships`]
pub fn global_cache() -> &'static PlanCache {
    &PLAN_CACHE
}

/// Compile (or fetch from the global cache) the plan for `request` against
/// the installed schema graph
pub fn select_with_relationships(request: &LoadRequest) -> ModelResult<Arc<LoadPlan>> {
    let graph = relationships::global()?;
    plan_for(graph, global_cache(), request)
}

/// Compile (or fetch from `cache`) the plan for `request`
pub fn plan_for(graph: &SchemaGraph, cache: &PlanCache, request: &LoadRequest) -> ModelResult<Arc<LoadPlan>> {
    let key = request.cache_key(graph)?;
    cache.get_or_compile(key, || PlanCompiler::new(graph).compile(request))
}

/// Shape of an eager-load request
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub(crate) model: String,
    pub(crate) relations: Vec<String>,
    pub(crate) ordering: Vec<OrderSpec>,
    pub(crate) limit: Option<u32>,
    pub(crate) self_key: Option<String>,
    pub(crate) adjustments: BTreeMap<String, Condition>,
}

impl LoadRequest {
    /// Request for `model` with the default per-parent collection bound
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            relations: Vec::new(),
            ordering: Vec::new(),
            limit: Some(DEFAULT_RELATIONSHIP_LOAD_LIMIT),
            self_key: None,
            adjustments: BTreeMap::new(),
        }
    }

    /// Request using the configured collection bound
    pub fn with_config(model: impl Into<String>, config: &PlannerConfig) -> Self {
        Self::new(model).limit(Some(config.relationship_load_limit))
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.push(name.into());
        self
    }

    pub fn relations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relations.extend(names.into_iter().map(Into::into));
        self
    }

    /// Ordering of bounded collections; a bare column name orders descending
    pub fn order_by(mut self, spec: impl Into<OrderSpec>) -> Self {
        self.ordering.push(spec.into());
        self
    }

    /// Per-parent bound for to-many relations; `None` loads full collections
    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Column of the root type a self-referential collection joins on
    pub fn self_key(mut self, column: impl Into<String>) -> Self {
        self.self_key = Some(column.into());
        self
    }

    /// Narrow which children of `relation` qualify.
    ///
    /// Unqualified columns refer to the relation's target entity.
    pub fn adjust(mut self, relation: impl Into<String>, condition: Condition) -> Self {
        let relation = relation.into();
        let merged = match self.adjustments.remove(&relation) {
            Some(existing) => existing.and(condition),
            None => condition,
        };
        self.adjustments.insert(relation, merged);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Relation names in compile order: sorted, duplicates removed
    pub fn relation_names(&self) -> Vec<String> {
        let mut names = self.relations.clone();
        names.sort();
        names.dedup();
        names
    }

    pub fn cache_key(&self, graph: &SchemaGraph) -> ModelResult<CacheKey> {
        Ok(CacheKey {
            root: graph.entity_id(&self.model)?,
            relations: self.relation_names(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            self_key: self.self_key.clone(),
            adjustments: if self.adjustments.is_empty() {
                None
            } else {
                Some(format!("{:?}", self.adjustments))
            },
        })
    }
}

/// Mutable state of one compilation
struct Compilation<'g> {
    aliases: AliasAllocator,
    primary: SelectStatement,
    batches: Vec<BatchedLoad>,
    nodes: Vec<LoaderNode>,
    multiplies_rows: bool,
    root: &'g EntityDef,
    root_id: EntityId,
}

impl<'g> Compilation<'g> {
    fn statement_mut(&mut self, source: RowSource) -> &mut SelectStatement {
        match source {
            RowSource::Primary => &mut self.primary,
            RowSource::Batch(index) => &mut self.batches[index].statement,
        }
    }

    fn project(&mut self, source: RowSource, alias: &str, entity: &EntityDef) {
        let statement = self.statement_mut(source);
        for column in &entity.columns {
            statement.push_column(
                ColumnRef::qualified(alias, column.clone()),
                Some(format!("{}.{}", alias, column)),
            );
        }
    }
}

/// Pure compiler from [`LoadRequest`] to [`LoadPlan`]
pub struct PlanCompiler<'g> {
    graph: &'g SchemaGraph,
}

impl<'g> PlanCompiler<'g> {
    pub fn new(graph: &'g SchemaGraph) -> Self {
        Self { graph }
    }

    pub fn compile(&self, request: &LoadRequest) -> ModelResult<LoadPlan> {
        let root_id = self.graph.entity_id(&request.model)?;
        let root = self.graph.entity(root_id);

        if let Some(self_key) = &request.self_key {
            require_column(root, self_key)?;
        }

        let mut aliases = AliasAllocator::new();
        let root_alias = aliases.allocate(&root.table);

        let mut compilation = Compilation {
            aliases,
            primary: SelectStatement::from_table(root.table.clone(), root_alias.clone()),
            batches: Vec::new(),
            nodes: vec![LoaderNode {
                id: NodeId::ROOT,
                name: root.name.clone(),
                relation: None,
                entity: root_id,
                parent: None,
                cardinality: Cardinality::One,
                strategy: LoadStrategy::Root,
                source: RowSource::Primary,
                alias: root_alias.clone(),
                primary_key: root.primary_key.clone(),
                columns: root.columns.clone(),
                children: Vec::new(),
            }],
            multiplies_rows: false,
            root,
            root_id,
        };
        compilation.project(RowSource::Primary, &root_alias, root);

        // Shared by every path; the root itself is not pre-seeded
        let mut visited: HashMap<EntityId, NodeId> = HashMap::new();

        for name in request.relation_names() {
            let path = self.graph.resolve(root_id, &name);
            let mut current = NodeId::ROOT;

            for relation in path.descriptors(self.graph) {
                if let Some(&existing) = visited.get(&relation.target) {
                    tracing::debug!(
                        relation = %relation.name,
                        requested = %name,
                        "target already loaded, reusing its node"
                    );
                    current = existing;
                    continue;
                }

                let node = self.attach(&mut compilation, current, relation, request)?;
                visited.insert(relation.target, node);
                current = node;
            }
        }

        tracing::debug!(
            root = %root.name,
            nodes = compilation.nodes.len(),
            batches = compilation.batches.len(),
            "compiled load plan"
        );

        Ok(LoadPlan {
            root: root_id,
            root_table: root.table.clone(),
            primary: compilation.primary,
            batches: compilation.batches,
            nodes: compilation.nodes,
            multiplies_rows: compilation.multiplies_rows,
        })
    }

    fn attach(
        &self,
        compilation: &mut Compilation<'g>,
        parent: NodeId,
        relation: &RelationshipDescriptor,
        request: &LoadRequest,
    ) -> ModelResult<NodeId> {
        let target = self.graph.entity(relation.target);
        let parent_alias = compilation.nodes[parent.0].alias.clone();
        let parent_source = compilation.nodes[parent.0].source;
        let adjustment = request.adjustments.get(&relation.name).cloned();

        let (strategy, source, alias) = match relation.cardinality {
            Cardinality::One => {
                let alias = self.join_direct(compilation, parent_source, &parent_alias, relation, target, adjustment);
                (LoadStrategy::Joined, parent_source, alias)
            }
            Cardinality::Many => match (&request.self_key, request.limit) {
                (Some(self_key), _) if relation.target == compilation.root_id => {
                    let alias = self.join_self(
                        compilation,
                        parent,
                        &parent_alias,
                        self_key,
                        &request.ordering,
                        adjustment,
                    )?;
                    (LoadStrategy::SelfAliased, parent_source, alias)
                }
                (_, Some(limit)) => {
                    let alias = self.join_lateral(
                        compilation,
                        parent_source,
                        &parent_alias,
                        relation,
                        target,
                        &request.ordering,
                        limit,
                        adjustment,
                    )?;
                    (LoadStrategy::BoundedLateral, parent_source, alias)
                }
                (_, None) => {
                    let (index, alias) =
                        self.batch(compilation, relation, target, &request.ordering, adjustment)?;
                    (LoadStrategy::Batched, RowSource::Batch(index), alias)
                }
            },
        };

        let id = NodeId(compilation.nodes.len());
        compilation.nodes.push(LoaderNode {
            id,
            name: relation.name.clone(),
            relation: Some(relation.id),
            entity: relation.target,
            parent: Some(parent),
            cardinality: relation.cardinality,
            strategy,
            source,
            alias,
            primary_key: target.primary_key.clone(),
            columns: target.columns.clone(),
            children: Vec::new(),
        });
        compilation.nodes[parent.0].children.push(id);

        if let RowSource::Batch(index) = source {
            compilation.batches[index].node = id;
        }

        Ok(id)
    }

    /// Left outer join of a to-one relation into the parent's statement
    fn join_direct(
        &self,
        compilation: &mut Compilation<'g>,
        source: RowSource,
        parent_alias: &str,
        relation: &RelationshipDescriptor,
        target: &EntityDef,
        adjustment: Option<Condition>,
    ) -> String {
        let mut left_alias = parent_alias.to_string();
        let mut join = relation.join.clone();

        if let Some(junction) = &relation.junction {
            let junction_alias = compilation.aliases.allocate(&junction.table);
            let on = pairs_equal(&relation.join, &left_alias, &junction_alias);
            compilation.statement_mut(source).push_join(JoinClause {
                join_type: JoinType::Left,
                source: JoinSource::Table(junction.table.clone()),
                alias: junction_alias.clone(),
                on,
            });
            left_alias = junction_alias;
            join = junction.target.clone();
        }

        let alias = compilation.aliases.allocate(&target.table);
        let mut on = pairs_equal(&join, &left_alias, &alias);
        if let Some(adjustment) = adjustment {
            on = on.and(adjustment.qualified(&alias));
        }

        compilation.statement_mut(source).push_join(JoinClause {
            join_type: JoinType::Left,
            source: JoinSource::Table(target.table.clone()),
            alias: alias.clone(),
            on,
        });
        compilation.project(source, &alias, target);
        alias
    }

    /// Inner join of an alias of the root type on `parent.<first ordering or pk> = alias.<self_key>`.
    ///
    /// Being an inner join, it drops parents without a matching child: such
    /// roots are missing from the hydrated records, while `count` over the same
    /// predicates still includes them.
    fn join_self(
        &self,
        compilation: &mut Compilation<'g>,
        parent: NodeId,
        parent_alias: &str,
        self_key: &str,
        ordering: &[OrderSpec],
        adjustment: Option<Condition>,
    ) -> ModelResult<String> {
        let root = compilation.root;
        let parent_entity = self.graph.entity(compilation.nodes[parent.0].entity);
        let parent_column = ordering
            .first()
            .map(|spec| spec.column.clone())
            .unwrap_or_else(|| parent_entity.primary_key.clone());
        require_column(parent_entity, &parent_column)?;

        let source = compilation.nodes[parent.0].source;
        let alias = compilation.aliases.allocate(&root.table);
        let mut on = ColumnRef::qualified(parent_alias, parent_column)
            .eq_col(ColumnRef::qualified(alias.clone(), self_key));
        if let Some(adjustment) = adjustment {
            on = on.and(adjustment.qualified(&alias));
        }

        compilation.statement_mut(source).push_join(JoinClause {
            join_type: JoinType::Inner,
            source: JoinSource::Table(root.table.clone()),
            alias: alias.clone(),
            on,
        });
        compilation.project(source, &alias, root);
        if source == RowSource::Primary {
            compilation.multiplies_rows = true;
        }
        Ok(alias)
    }

    /// Lateral join of the top `limit` children per parent
    #[allow(clippy::too_many_arguments)]
    fn join_lateral(
        &self,
        compilation: &mut Compilation<'g>,
        source: RowSource,
        parent_alias: &str,
        relation: &RelationshipDescriptor,
        target: &EntityDef,
        ordering: &[OrderSpec],
        limit: u32,
        adjustment: Option<Condition>,
    ) -> ModelResult<String> {
        let inner_alias = compilation.aliases.allocate(&target.table);
        let mut inner = SelectStatement::from_table(target.table.clone(), inner_alias.clone());
        for column in &target.columns {
            inner.push_column(ColumnRef::qualified(inner_alias.clone(), column.clone()), None);
        }

        match &relation.junction {
            Some(junction) => {
                let junction_alias = compilation.aliases.allocate(&junction.table);
                inner.push_join(JoinClause {
                    join_type: JoinType::Inner,
                    source: JoinSource::Table(junction.table.clone()),
                    alias: junction_alias.clone(),
                    on: pairs_equal(&junction.target, &junction_alias, &inner_alias),
                });
                inner.push_condition(pairs_equal(&relation.join, parent_alias, &junction_alias));
            }
            None => {
                inner.push_condition(pairs_equal(&relation.join, parent_alias, &inner_alias));
            }
        }

        if let Some(adjustment) = adjustment {
            inner.push_condition(adjustment.qualified(&inner_alias));
        }

        inner = order_children(inner, &inner_alias, target, ordering)?;
        inner = inner.limit(limit as u64);

        let alias = compilation.aliases.allocate(&target.table);
        compilation.statement_mut(source).push_join(JoinClause {
            join_type: JoinType::Left,
            source: JoinSource::Lateral(Box::new(inner)),
            alias: alias.clone(),
            on: Condition::Literal(true),
        });
        compilation.project(source, &alias, target);
        if source == RowSource::Primary {
            compilation.multiplies_rows = true;
        }
        Ok(alias)
    }

    /// Secondary statement loading whole collections for all parents at once
    fn batch(
        &self,
        compilation: &mut Compilation<'g>,
        relation: &RelationshipDescriptor,
        target: &EntityDef,
        ordering: &[OrderSpec],
        adjustment: Option<Condition>,
    ) -> ModelResult<(usize, String)> {
        let alias = compilation.aliases.allocate(&target.table);
        let mut statement = SelectStatement::from_table(target.table.clone(), alias.clone());

        let link_alias = match &relation.junction {
            Some(junction) => {
                let junction_alias = compilation.aliases.allocate(&junction.table);
                statement.push_join(JoinClause {
                    join_type: JoinType::Inner,
                    source: JoinSource::Table(junction.table.clone()),
                    alias: junction_alias.clone(),
                    on: pairs_equal(&junction.target, &junction_alias, &alias),
                });
                junction_alias
            }
            None => alias.clone(),
        };

        let link: Vec<ColumnRef> = relation
            .join
            .right_columns()
            .map(|column| ColumnRef::qualified(link_alias.clone(), column))
            .collect();
        let link_labels: Vec<String> = (0..link.len()).map(|i| format!("{}.__link{}", alias, i)).collect();
        for (column, label) in link.iter().zip(&link_labels) {
            statement.push_column(column.clone(), Some(label.clone()));
        }

        if let Some(adjustment) = adjustment {
            statement.push_condition(adjustment.qualified(&alias));
        }
        if !ordering.is_empty() {
            statement = order_children(statement, &alias, target, ordering)?;
        }

        let index = compilation.batches.len();
        compilation.batches.push(BatchedLoad {
            // Patched once the node exists
            node: NodeId::ROOT,
            statement,
            parent_columns: relation.join.left_columns().map(str::to_string).collect(),
            link,
            link_labels,
        });
        compilation.project(RowSource::Batch(index), &alias, target);
        Ok((index, alias))
    }
}

/// `left.a = right.b AND ...` for every pair of the join condition
fn pairs_equal(join: &JoinCondition, left_alias: &str, right_alias: &str) -> Condition {
    Condition::all(
        join.pairs()
            .iter()
            .map(|(left, right)| {
                ColumnRef::qualified(left_alias, left.clone()).eq_col(ColumnRef::qualified(right_alias, right.clone()))
            })
            .collect(),
    )
}

/// Apply ordering to a child statement; descending on the primary key when none is given
fn order_children(
    mut statement: SelectStatement,
    alias: &str,
    target: &EntityDef,
    ordering: &[OrderSpec],
) -> ModelResult<SelectStatement> {
    if ordering.is_empty() {
        return Ok(statement.order_by(
            ColumnRef::qualified(alias, target.primary_key.clone()),
            OrderDirection::Desc,
        ));
    }

    for spec in ordering {
        require_column(target, &spec.column)?;
        statement = statement.order_by(ColumnRef::qualified(alias, spec.column.clone()), spec.direction);
    }
    Ok(statement)
}

fn require_column(entity: &EntityDef, column: &str) -> ModelResult<()> {
    if entity.has_column(column) {
        Ok(())
    } else {
        Err(ModelError::from(QueryError::UnknownColumn {
            entity: entity.name.clone(),
            column: column.to_string(),
        }))
    }
}
