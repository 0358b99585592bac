//! INSERT, UPDATE, DELETE and aggregate statements

use std::collections::BTreeSet;

use crate::backends::Values;
use crate::error::{ModelResult, QueryError};
use super::sql_generation::{BoundQuery, SqlWriter};
use super::where_clause::Condition;

fn render_where(writer: &mut SqlWriter, conditions: &[Condition]) {
    if !conditions.is_empty() {
        writer.push(" WHERE ");
        writer.push_list(conditions, " AND ", |w, condition| condition.render(w, None));
    }
}

/// Multi-row INSERT returning the stored rows
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub(crate) table: String,
    pub(crate) rows: Vec<Values>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: Values) -> Self {
        self.rows.push(values);
        self
    }

    pub fn rows<I: IntoIterator<Item = Values>>(mut self, rows: I) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Union of every row's columns, in column order
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub(crate) fn render_insert(&self, writer: &mut SqlWriter) -> ModelResult<()> {
        if self.rows.is_empty() {
            return Err(QueryError::MissingFields(format!("no rows to insert into '{}'", self.table)).into());
        }

        let columns = self.columns();
        writer.push("INSERT INTO ");
        writer.push_ident(&self.table);

        if columns.is_empty() {
            if self.rows.len() > 1 {
                return Err(QueryError::MissingFields(
                    "multi-row insert needs at least one column".to_string(),
                )
                .into());
            }
            writer.push(" DEFAULT VALUES");
            return Ok(());
        }

        writer.push(" (");
        writer.push_list(&columns, ", ", |w, column| w.push_ident(column));
        writer.push(") VALUES ");
        writer.push_list(&self.rows, ", ", |w, row| {
            w.push("(");
            // Columns missing from a row fall back to their database default
            w.push_list(&columns, ", ", |w, column| match row.get(column) {
                Some(value) => w.push_param(value.clone()),
                None => w.push("DEFAULT"),
            });
            w.push(")");
        });
        Ok(())
    }

    pub fn render(&self) -> ModelResult<BoundQuery> {
        let mut writer = SqlWriter::new();
        self.render_insert(&mut writer)?;
        writer.push(" RETURNING *");
        Ok(writer.finish())
    }
}

/// UPDATE returning the changed rows
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub(crate) table: String,
    pub(crate) values: Values,
    pub(crate) conditions: Vec<Condition>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>, values: Values) -> Self {
        Self {
            table: table.into(),
            values,
            conditions: Vec::new(),
        }
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn render(&self) -> ModelResult<BoundQuery> {
        if self.values.is_empty() {
            return Err(QueryError::MissingFields(format!("no columns to update on '{}'", self.table)).into());
        }

        let mut writer = SqlWriter::new();
        writer.push("UPDATE ");
        writer.push_ident(&self.table);
        writer.push(" SET ");
        let assignments: Vec<_> = self.values.iter().collect();
        writer.push_list(&assignments, ", ", |w, (column, value)| {
            w.push_ident(column);
            w.push(" = ");
            w.push_param((*value).clone());
        });
        render_where(&mut writer, &self.conditions);
        writer.push(" RETURNING *");
        Ok(writer.finish())
    }
}

/// DELETE returning the removed rows
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub(crate) table: String,
    pub(crate) conditions: Vec<Condition>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn render(&self) -> BoundQuery {
        let mut writer = SqlWriter::new();
        writer.push("DELETE FROM ");
        writer.push_ident(&self.table);
        render_where(&mut writer, &self.conditions);
        writer.push(" RETURNING *");
        writer.finish()
    }
}

/// `SELECT count(*)` over matching rows, read back as column `count`
#[derive(Debug, Clone, PartialEq)]
pub struct CountStatement {
    pub(crate) table: String,
    pub(crate) conditions: Vec<Condition>,
}

impl CountStatement {
    pub fn new(table: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            table: table.into(),
            conditions,
        }
    }

    pub fn render(&self) -> BoundQuery {
        let mut writer = SqlWriter::new();
        writer.push("SELECT count(*) AS \"count\" FROM ");
        writer.push_ident(&self.table);
        render_where(&mut writer, &self.conditions);
        writer.finish()
    }
}

/// `SELECT EXISTS (...)`, read back as column `exists`
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsStatement {
    pub(crate) table: String,
    pub(crate) conditions: Vec<Condition>,
}

impl ExistsStatement {
    pub fn new(table: impl Into<String>, conditions: Vec<Condition>) -> Self {
        Self {
            table: table.into(),
            conditions,
        }
    }

    pub fn render(&self) -> BoundQuery {
        let mut writer = SqlWriter::new();
        writer.push("SELECT EXISTS (SELECT 1 FROM ");
        writer.push_ident(&self.table);
        render_where(&mut writer, &self.conditions);
        writer.push(") AS \"exists\"");
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{values, DatabaseValue};
    use crate::query::col;

    #[test]
    fn test_multi_row_insert_fills_defaults() {
        let query = InsertStatement::new("user")
            .row(values([("login", "a"), ("password", "x")]))
            .row(values([("login", "b")]))
            .render()
            .unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO \"user\" (\"login\", \"password\") VALUES ($1, $2), ($3, DEFAULT) RETURNING *"
        );
        assert_eq!(query.params.len(), 3);
    }

    #[test]
    fn test_insert_without_columns() {
        let query = InsertStatement::new("role").row(Values::new()).render().unwrap();
        assert_eq!(query.sql, "INSERT INTO \"role\" DEFAULT VALUES RETURNING *");

        assert!(InsertStatement::new("role").render().is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let update = UpdateStatement::new("user", values([("active", false)]))
            .and_where(col("login").eq("a"))
            .render()
            .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"user\" SET \"active\" = $1 WHERE \"login\" = $2 RETURNING *"
        );

        assert!(UpdateStatement::new("user", Values::new()).render().is_err());

        let delete = DeleteStatement::new("user").and_where(col("login").eq("a")).render();
        assert_eq!(delete.sql, "DELETE FROM \"user\" WHERE \"login\" = $1 RETURNING *");
    }

    #[test]
    fn test_null_values_are_not_bound() {
        let update = UpdateStatement::new(
            "role",
            values([("name", DatabaseValue::from("admin")), ("updated_at", DatabaseValue::Null)]),
        )
        .and_where(col("uuid").eq("r1"))
        .render()
        .unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"role\" SET \"name\" = $1, \"updated_at\" = NULL WHERE \"uuid\" = $2 RETURNING *"
        );
        assert_eq!(update.params, vec![DatabaseValue::from("admin"), DatabaseValue::from("r1")]);

        let insert = InsertStatement::new("user")
            .row(values([("login", DatabaseValue::from("a")), ("role_uuid", DatabaseValue::Null)]))
            .render()
            .unwrap();
        assert!(insert.sql.contains("VALUES ($1, NULL)"));
        assert_eq!(insert.params.len(), 1);
    }

    #[test]
    fn test_count_and_exists() {
        let count = CountStatement::new("user", vec![col("active").eq(true)]).render();
        assert_eq!(count.sql, "SELECT count(*) AS \"count\" FROM \"user\" WHERE \"active\" = $1");

        let exists = ExistsStatement::new("user", vec![col("login").eq("x")]).render();
        assert_eq!(
            exists.sql,
            "SELECT EXISTS (SELECT 1 FROM \"user\" WHERE \"login\" = $1) AS \"exists\""
        );
    }
}
