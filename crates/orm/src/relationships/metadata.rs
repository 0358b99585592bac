//! Relationship Metadata - entity and relationship declarations

use serde::{Deserialize, Serialize};

/// Index of an entity inside a [`SchemaGraph`](super::SchemaGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a relationship descriptor inside a [`SchemaGraph`](super::SchemaGraph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub(crate) usize);

impl RelationId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A persisted record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Type name used to look the entity up
    pub name: String,
    /// Table the entity is stored in
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Every column the entity exposes, primary key first
    pub columns: Vec<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            table: table.into(),
            columns: vec![primary_key.clone()],
            primary_key,
        }
    }

    /// Declare the entity's columns. The primary key is kept in front.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut declared = vec![self.primary_key.clone()];
        for column in columns {
            let column = column.into();
            if !declared.contains(&column) {
                declared.push(column);
            }
        }
        self.columns = declared;
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// How many target records a relationship yields per parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::Many)
    }
}

/// Column equalities joining two tables, as `(left column, right column)` pairs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JoinCondition {
    pairs: Vec<(String, String)>,
}

impl JoinCondition {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::default().and(left, right)
    }

    /// Add another column equality
    pub fn and(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.pairs.push((left.into(), right.into()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn left_columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(left, _)| left.as_str())
    }

    pub fn right_columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, right)| right.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Intermediate table of a many-to-many relationship.
///
/// The descriptor's join condition links the source entity to this table;
/// `target` links this table to the target entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Junction {
    pub table: String,
    pub target: JoinCondition,
}

/// Immutable description of one declared relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub id: RelationId,
    /// Relation name, unique per source entity
    pub name: String,
    pub source: EntityId,
    pub target: EntityId,
    pub cardinality: Cardinality,
    /// Source columns paired with target columns, or with junction columns
    /// when `junction` is set
    pub join: JoinCondition,
    pub junction: Option<Junction>,
    pub inverse: Option<String>,
}

impl RelationshipDescriptor {
    pub fn is_self_referential(&self) -> bool {
        self.source == self.target
    }
}

/// Relationship declaration, resolved into a [`RelationshipDescriptor`] by the graph builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    pub(crate) source: String,
    pub(crate) name: String,
    pub(crate) target: String,
    pub(crate) cardinality: Cardinality,
    pub(crate) join: JoinCondition,
    pub(crate) junction: Option<Junction>,
    pub(crate) inverse: Option<String>,
}

impl RelationDecl {
    fn new(source: &str, name: &str, target: &str, cardinality: Cardinality) -> Self {
        Self {
            source: source.to_string(),
            name: name.to_string(),
            target: target.to_string(),
            cardinality,
            join: JoinCondition::default(),
            junction: None,
            inverse: None,
        }
    }

    /// Declare a relationship yielding at most one target per source
    pub fn one(source: &str, name: &str, target: &str) -> Self {
        Self::new(source, name, target, Cardinality::One)
    }

    /// Declare a relationship yielding a collection of targets per source
    pub fn many(source: &str, name: &str, target: &str) -> Self {
        Self::new(source, name, target, Cardinality::Many)
    }

    /// Join `source.source_column = target.target_column`
    pub fn on(mut self, source_column: &str, target_column: &str) -> Self {
        self.join = self.join.and(source_column, target_column);
        self
    }

    /// Join through a junction table:
    /// `source.key = junction.col` and `junction.col = target.key`
    pub fn through(mut self, table: &str, source: (&str, &str), target: (&str, &str)) -> Self {
        self.join = JoinCondition::new(source.0, source.1);
        self.junction = Some(Junction {
            table: table.to_string(),
            target: JoinCondition::new(target.0, target.1),
        });
        self
    }

    /// Name of the matching relationship declared on the target
    pub fn inverse(mut self, name: &str) -> Self {
        self.inverse = Some(name.to_string());
        self
    }
}
