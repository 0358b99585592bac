//! Compiled load plans

use crate::query::{BoundQuery, ColumnRef, Condition, FromSource, OrderSpec, SelectStatement};
use crate::relationships::{Cardinality, EntityId, RelationId};

/// Index of a loader node inside a [`LoadPlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// How a node's records reach the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStrategy {
    /// The queried entity itself
    Root,
    /// Left outer join read from the joined row
    Joined,
    /// Ordered, limited correlated sub-select joined laterally
    BoundedLateral,
    /// Aliased self join on the caller-supplied key
    SelfAliased,
    /// Separate statement keyed by the parents' join columns
    Batched,
}

/// Statement a node's columns are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSource {
    Primary,
    Batch(usize),
}

/// One eagerly loaded relation (or the root) in a plan
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderNode {
    pub id: NodeId,
    /// Relation name, or the entity name for the root
    pub name: String,
    pub relation: Option<RelationId>,
    pub entity: EntityId,
    pub parent: Option<NodeId>,
    pub cardinality: Cardinality,
    pub strategy: LoadStrategy,
    pub source: RowSource,
    /// Qualifier of the node's columns in its statement
    pub alias: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub children: Vec<NodeId>,
}

impl LoaderNode {
    /// Result column label of one of the node's columns
    pub fn label(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }
}

/// Secondary statement loading a full collection for every parent at once
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedLoad {
    pub node: NodeId,
    /// Statement without the parent-key filter
    pub statement: SelectStatement,
    /// Parent columns whose values select the children
    pub parent_columns: Vec<String>,
    /// Statement columns compared against the parent values
    pub link: Vec<ColumnRef>,
    /// Result labels of the link columns
    pub link_labels: Vec<String>,
}

impl BatchedLoad {
    /// The statement restricted to children of the given parent key tuples
    pub fn for_parents(&self, keys: &[Vec<crate::backends::DatabaseValue>]) -> SelectStatement {
        let filter = if self.link.len() == 1 {
            self.link[0]
                .clone()
                .is_in(keys.iter().filter_map(|key| key.first().cloned()))
        } else {
            Condition::Or(
                keys.iter()
                    .map(|key| {
                        Condition::all(
                            self.link
                                .iter()
                                .zip(key)
                                .map(|(column, value)| column.clone().eq(value.clone()))
                                .collect(),
                        )
                    })
                    .collect(),
            )
        };
        self.statement.clone().and_where(filter)
    }
}

/// Compiled statement plus the loader tree needed to hydrate nested relations.
///
/// Plans are immutable and shared through the plan cache.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    pub(crate) root: EntityId,
    pub(crate) root_table: String,
    pub(crate) primary: SelectStatement,
    pub(crate) batches: Vec<BatchedLoad>,
    pub(crate) nodes: Vec<LoaderNode>,
    pub(crate) multiplies_rows: bool,
}

impl LoadPlan {
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Primary statement: the root plus every joined relation
    pub fn statement(&self) -> &SelectStatement {
        &self.primary
    }

    pub fn batches(&self) -> &[BatchedLoad] {
        &self.batches
    }

    pub fn nodes(&self) -> &[LoaderNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &LoaderNode {
        &self.nodes[id.0]
    }

    pub fn root_node(&self) -> &LoaderNode {
        &self.nodes[0]
    }

    /// Loaded node for a relation name, if the plan materializes one
    pub fn find(&self, relation_name: &str) -> Option<&LoaderNode> {
        self.nodes.iter().skip(1).find(|node| node.name == relation_name)
    }

    /// Whether the primary statement can return several rows per root
    pub fn multiplies_rows(&self) -> bool {
        self.multiplies_rows
    }

    /// Render the primary statement
    pub fn render(&self) -> BoundQuery {
        self.primary.render()
    }

    /// Primary statement narrowed to root rows matching `predicates`.
    ///
    /// When joins multiply rows, ordering and pagination are applied to the
    /// root table in a derived sub-select so they count roots, not joined rows.
    pub fn select_for(
        &self,
        predicates: &[Condition],
        ordering: &[OrderSpec],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> SelectStatement {
        let root_alias = self.root_node().alias.clone();
        let paginated = limit.is_some() || offset.is_some();

        let mut statement = if self.multiplies_rows && paginated {
            let mut inner = SelectStatement::from_table(self.root_table.clone(), root_alias.clone())
                .all_columns(root_alias.clone());
            for predicate in predicates {
                inner.push_condition(predicate.clone().qualified(&root_alias));
            }
            inner = apply_ordering(inner, &root_alias, ordering);
            inner.limit = limit;
            inner.offset = offset;

            let mut outer = self.primary.clone();
            outer.from = FromSource::Derived {
                query: Box::new(inner),
                alias: root_alias.clone(),
            };
            outer
        } else {
            let mut outer = self.primary.clone();
            for predicate in predicates {
                outer.push_condition(predicate.clone().qualified(&root_alias));
            }
            outer.limit = limit;
            outer.offset = offset;
            outer
        };

        statement = apply_ordering(statement, &root_alias, ordering);
        statement
    }
}

fn apply_ordering(mut statement: SelectStatement, alias: &str, ordering: &[OrderSpec]) -> SelectStatement {
    for spec in ordering {
        statement = statement.order_by(ColumnRef::qualified(alias, spec.column.clone()), spec.direction);
    }
    statement
}
