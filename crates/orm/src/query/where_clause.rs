//! Predicate expressions over entity columns

use crate::backends::DatabaseValue;
use super::sql_generation::SqlWriter;
use super::types::{ColumnRef, QueryOperator};

/// Boolean expression tree used in WHERE and ON clauses
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: ColumnRef,
        operator: QueryOperator,
        value: DatabaseValue,
    },
    InList {
        column: ColumnRef,
        values: Vec<DatabaseValue>,
        negated: bool,
    },
    Null {
        column: ColumnRef,
        negated: bool,
    },
    /// `left = right` between two columns
    ColumnsEqual(ColumnRef, ColumnRef),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Literal(bool),
}

impl Condition {
    /// Conjunction of every condition; empty means true
    pub fn all(conditions: Vec<Condition>) -> Self {
        match conditions.len() {
            1 => conditions.into_iter().next().unwrap_or(Condition::Literal(true)),
            _ => Condition::And(conditions),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut items) => {
                items.push(other);
                Condition::And(items)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut items) => {
                items.push(other);
                Condition::Or(items)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Qualify every unqualified column with `alias`
    pub fn qualified(self, alias: &str) -> Self {
        match self {
            Condition::Compare { column, operator, value } => Condition::Compare {
                column: column.or_qualifier(alias),
                operator,
                value,
            },
            Condition::InList { column, values, negated } => Condition::InList {
                column: column.or_qualifier(alias),
                values,
                negated,
            },
            Condition::Null { column, negated } => Condition::Null {
                column: column.or_qualifier(alias),
                negated,
            },
            Condition::ColumnsEqual(left, right) => {
                Condition::ColumnsEqual(left.or_qualifier(alias), right.or_qualifier(alias))
            }
            Condition::And(items) => Condition::And(items.into_iter().map(|c| c.qualified(alias)).collect()),
            Condition::Or(items) => Condition::Or(items.into_iter().map(|c| c.qualified(alias)).collect()),
            Condition::Not(inner) => Condition::Not(Box::new(inner.qualified(alias))),
            Condition::Literal(value) => Condition::Literal(value),
        }
    }

    /// Render into `writer`, resolving unqualified columns against `default_alias`
    pub fn render(&self, writer: &mut SqlWriter, default_alias: Option<&str>) {
        match self {
            Condition::Compare { column, operator, value } => {
                writer.push_column(column, default_alias);
                match (operator, value.is_null()) {
                    (QueryOperator::Equal, true) => writer.push(" IS NULL"),
                    (QueryOperator::NotEqual, true) => writer.push(" IS NOT NULL"),
                    _ => {
                        writer.push(&format!(" {} ", operator));
                        writer.push_param(value.clone());
                    }
                }
            }
            Condition::InList { values, negated, .. } if values.is_empty() => {
                writer.push(if *negated { "TRUE" } else { "FALSE" });
            }
            Condition::InList { column, values, negated } => {
                writer.push_column(column, default_alias);
                writer.push(if *negated { " NOT IN (" } else { " IN (" });
                writer.push_list(values, ", ", |w, value| w.push_param(value.clone()));
                writer.push(")");
            }
            Condition::Null { column, negated } => {
                writer.push_column(column, default_alias);
                writer.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Condition::ColumnsEqual(left, right) => {
                writer.push_column(left, default_alias);
                writer.push(" = ");
                writer.push_column(right, default_alias);
            }
            Condition::And(items) => render_group(writer, items, " AND ", "TRUE", default_alias),
            Condition::Or(items) => render_group(writer, items, " OR ", "FALSE", default_alias),
            Condition::Not(inner) => {
                writer.push("NOT (");
                inner.render(writer, default_alias);
                writer.push(")");
            }
            Condition::Literal(value) => writer.push(if *value { "TRUE" } else { "FALSE" }),
        }
    }
}

fn render_group(
    writer: &mut SqlWriter,
    items: &[Condition],
    separator: &str,
    empty: &str,
    default_alias: Option<&str>,
) {
    match items {
        [] => writer.push(empty),
        [single] => single.render(writer, default_alias),
        _ => {
            writer.push("(");
            writer.push_list(items, separator, |w, item| item.render(w, default_alias));
            writer.push(")");
        }
    }
}

impl ColumnRef {
    fn compare(self, operator: QueryOperator, value: impl Into<DatabaseValue>) -> Condition {
        Condition::Compare {
            column: self,
            operator,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::Equal, value)
    }

    pub fn ne(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::NotEqual, value)
    }

    pub fn gt(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::GreaterThan, value)
    }

    pub fn gte(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::GreaterThanOrEqual, value)
    }

    pub fn lt(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::LessThan, value)
    }

    pub fn lte(self, value: impl Into<DatabaseValue>) -> Condition {
        self.compare(QueryOperator::LessThanOrEqual, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Condition {
        self.compare(QueryOperator::Like, pattern.into())
    }

    /// Case-insensitive pattern match
    pub fn ilike(self, pattern: impl Into<String>) -> Condition {
        self.compare(QueryOperator::ILike, pattern.into())
    }

    pub fn is_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        Condition::InList {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<I, V>(self, values: I) -> Condition
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        Condition::InList {
            column: self,
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn is_null(self) -> Condition {
        Condition::Null {
            column: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Condition {
        Condition::Null {
            column: self,
            negated: true,
        }
    }

    pub fn eq_col(self, other: ColumnRef) -> Condition {
        Condition::ColumnsEqual(self, other)
    }
}
