//! SQL text generation with positional parameters

use crate::backends::DatabaseValue;
use super::types::ColumnRef;

/// Rendered SQL plus the parameters bound to its `$n` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// Quote an identifier for PostgreSQL
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Accumulates SQL text and parameters while a statement tree is rendered
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    params: Vec<DatabaseValue>,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub fn push_ident(&mut self, ident: &str) {
        self.sql.push_str(&quote_ident(ident));
    }

    /// Bind a value and write its placeholder.
    ///
    /// NULL is written inline: an untyped bound NULL is inferred as text and
    /// rejected by non-text columns.
    pub fn push_param(&mut self, value: DatabaseValue) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.params.push(value);
        self.sql.push('$');
        self.sql.push_str(&self.params.len().to_string());
    }

    /// Write a column, qualified with `default_alias` when it has no qualifier
    pub fn push_column(&mut self, column: &ColumnRef, default_alias: Option<&str>) {
        if let Some(qualifier) = column.qualifier.as_deref().or(default_alias) {
            self.push_ident(qualifier);
            self.sql.push('.');
        }
        self.push_ident(&column.name);
    }

    /// Write items separated by `separator`
    pub fn push_list<T, F>(&mut self, items: &[T], separator: &str, mut render: F)
    where
        F: FnMut(&mut Self, &T),
    {
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(separator);
            }
            render(self, item);
        }
    }

    pub fn finish(self) -> BoundQuery {
        BoundQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::col;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("user"), "\"user\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_params_are_numbered_in_order() {
        let mut writer = SqlWriter::new();
        writer.push_column(&col("login"), Some("u0"));
        writer.push(" = ");
        writer.push_param("a".into());
        writer.push(" AND ");
        writer.push_column(&ColumnRef::qualified("r1", "name"), Some("u0"));
        writer.push(" = ");
        writer.push_param("admin".into());

        let query = writer.finish();
        assert_eq!(query.sql, "\"u0\".\"login\" = $1 AND \"r1\".\"name\" = $2");
        assert_eq!(query.params.len(), 2);
    }

    #[test]
    fn test_null_is_written_inline() {
        let mut writer = SqlWriter::new();
        writer.push_param("a".into());
        writer.push(", ");
        writer.push_param(DatabaseValue::Null);
        writer.push(", ");
        writer.push_param(true.into());

        let query = writer.finish();
        assert_eq!(query.sql, "$1, NULL, $2");
        assert_eq!(query.params, vec![DatabaseValue::from("a"), DatabaseValue::from(true)]);
    }
}
