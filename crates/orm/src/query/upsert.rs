//! INSERT ... ON CONFLICT DO UPDATE

use crate::backends::Values;
use crate::error::{ModelResult, QueryError};
use super::dml::InsertStatement;
use super::sql_generation::{BoundQuery, SqlWriter};

/// Upsert that overwrites every non-conflict column with the proposed row
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertStatement {
    insert: InsertStatement,
    conflict_columns: Vec<String>,
}

impl UpsertStatement {
    pub fn new<I, S>(table: impl Into<String>, conflict_columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            insert: InsertStatement::new(table),
            conflict_columns: conflict_columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn row(mut self, values: Values) -> Self {
        self.insert = self.insert.row(values);
        self
    }

    pub fn rows<I: IntoIterator<Item = Values>>(mut self, rows: I) -> Self {
        self.insert = self.insert.rows(rows);
        self
    }

    /// Columns overwritten on conflict
    pub fn update_columns(&self) -> Vec<String> {
        self.insert
            .columns()
            .into_iter()
            .filter(|column| !self.conflict_columns.contains(column))
            .collect()
    }

    pub fn render(&self) -> ModelResult<BoundQuery> {
        if self.conflict_columns.is_empty() {
            return Err(QueryError::MissingFields("upsert needs at least one conflict column".to_string()).into());
        }

        let mut writer = SqlWriter::new();
        self.insert.render_insert(&mut writer)?;

        writer.push(" ON CONFLICT (");
        writer.push_list(&self.conflict_columns, ", ", |w, column| w.push_ident(column));
        writer.push(") DO UPDATE SET ");

        let mut update_columns = self.update_columns();
        if update_columns.is_empty() {
            // A no-op assignment still makes RETURNING yield the existing row
            update_columns = vec![self.conflict_columns[0].clone()];
        }
        writer.push_list(&update_columns, ", ", |w, column| {
            w.push_ident(column);
            w.push(" = EXCLUDED.");
            w.push_ident(column);
        });

        writer.push(" RETURNING *");
        Ok(writer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::values;

    #[test]
    fn test_upsert_updates_non_conflict_columns() {
        let query = UpsertStatement::new("user", ["login"])
            .row(values([("login", "a"), ("password", "x")]))
            .render()
            .unwrap();

        assert_eq!(
            query.sql,
            "INSERT INTO \"user\" (\"login\", \"password\") VALUES ($1, $2) \
             ON CONFLICT (\"login\") DO UPDATE SET \"password\" = EXCLUDED.\"password\" RETURNING *"
        );
    }

    #[test]
    fn test_upsert_with_only_conflict_columns() {
        let query = UpsertStatement::new("role", ["name"])
            .row(values([("name", "Admin")]))
            .render()
            .unwrap();

        assert!(query.sql.ends_with("DO UPDATE SET \"name\" = EXCLUDED.\"name\" RETURNING *"));
    }

    #[test]
    fn test_upsert_requires_conflict_target() {
        let statement = UpsertStatement::new("role", Vec::<String>::new()).row(values([("name", "Admin")]));
        assert!(statement.render().is_err());
    }
}
