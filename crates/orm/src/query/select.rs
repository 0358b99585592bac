//! SELECT statement tree

use super::sql_generation::{BoundQuery, SqlWriter};
use super::types::{ColumnRef, JoinType, OrderDirection};
use super::where_clause::Condition;

/// What a statement selects from
#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table { table: String, alias: String },
    /// Sub-select exposed under an alias
    Derived { query: Box<SelectStatement>, alias: String },
}

impl FromSource {
    pub fn alias(&self) -> &str {
        match self {
            FromSource::Table { alias, .. } | FromSource::Derived { alias, .. } => alias,
        }
    }
}

/// What a join brings in
#[derive(Debug, Clone, PartialEq)]
pub enum JoinSource {
    Table(String),
    /// Correlated sub-select evaluated per outer row
    Lateral(Box<SelectStatement>),
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub source: JoinSource,
    pub alias: String,
    pub on: Condition,
}

/// Selected expression
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Column { column: ColumnRef, label: Option<String> },
    /// `alias.*`
    AllFrom(String),
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub(crate) from: FromSource,
    pub(crate) projections: Vec<Projection>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) order_by: Vec<(ColumnRef, OrderDirection)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl SelectStatement {
    fn with_source(from: FromSource) -> Self {
        Self {
            from,
            projections: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// `SELECT ... FROM table AS alias`
    pub fn from_table(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::with_source(FromSource::Table {
            table: table.into(),
            alias: alias.into(),
        })
    }

    /// `SELECT ... FROM (query) AS alias`
    pub fn from_derived(query: SelectStatement, alias: impl Into<String>) -> Self {
        Self::with_source(FromSource::Derived {
            query: Box::new(query),
            alias: alias.into(),
        })
    }

    /// Alias unqualified columns resolve against
    pub fn alias(&self) -> &str {
        self.from.alias()
    }

    pub fn from_source(&self) -> &FromSource {
        &self.from
    }

    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    pub fn column(mut self, column: ColumnRef, label: Option<String>) -> Self {
        self.push_column(column, label);
        self
    }

    pub fn all_columns(mut self, alias: impl Into<String>) -> Self {
        self.projections.push(Projection::AllFrom(alias.into()));
        self
    }

    pub fn push_column(&mut self, column: ColumnRef, label: Option<String>) {
        self.projections.push(Projection::Column { column, label });
    }

    pub fn push_join(&mut self, join: JoinClause) {
        self.joins.push(join);
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.push_condition(condition);
        self
    }

    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn order_by(mut self, column: ColumnRef, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render to SQL with `$n` placeholders
    pub fn render(&self) -> BoundQuery {
        let mut writer = SqlWriter::new();
        self.render_into(&mut writer);
        writer.finish()
    }

    /// Render into an existing writer so nested statements share parameter numbering
    pub fn render_into(&self, writer: &mut SqlWriter) {
        let alias = self.alias().to_string();
        let default_alias = Some(alias.as_str());

        writer.push("SELECT ");
        if self.projections.is_empty() {
            writer.push("*");
        } else {
            writer.push_list(&self.projections, ", ", |w, projection| match projection {
                Projection::Column { column, label } => {
                    w.push_column(column, default_alias);
                    if let Some(label) = label {
                        w.push(" AS ");
                        w.push_ident(label);
                    }
                }
                Projection::AllFrom(alias) => {
                    w.push_ident(alias);
                    w.push(".*");
                }
            });
        }

        writer.push(" FROM ");
        match &self.from {
            FromSource::Table { table, alias } => {
                writer.push_ident(table);
                writer.push(" AS ");
                writer.push_ident(alias);
            }
            FromSource::Derived { query, alias } => {
                writer.push("(");
                query.render_into(writer);
                writer.push(") AS ");
                writer.push_ident(alias);
            }
        }

        for join in &self.joins {
            writer.push(" ");
            writer.push(&join.join_type.to_string());
            writer.push(" ");
            match &join.source {
                JoinSource::Table(table) => writer.push_ident(table),
                JoinSource::Lateral(query) => {
                    writer.push("LATERAL (");
                    query.render_into(writer);
                    writer.push(")");
                }
            }
            writer.push(" AS ");
            writer.push_ident(&join.alias);
            writer.push(" ON ");
            join.on.render(writer, default_alias);
        }

        if !self.conditions.is_empty() {
            writer.push(" WHERE ");
            writer.push_list(&self.conditions, " AND ", |w, condition| {
                condition.render(w, default_alias)
            });
        }

        if !self.order_by.is_empty() {
            writer.push(" ORDER BY ");
            writer.push_list(&self.order_by, ", ", |w, (column, direction)| {
                w.push_column(column, default_alias);
                w.push(&format!(" {}", direction));
            });
        }

        if let Some(limit) = self.limit {
            writer.push(&format!(" LIMIT {}", limit));
        }

        if let Some(offset) = self.offset {
            writer.push(&format!(" OFFSET {}", offset));
        }
    }
}
