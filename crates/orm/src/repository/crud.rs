//! Generic CRUD Repository
//!
//! One repository per entity, uniform across entity types. Every operation
//! runs on a transaction supplied by the caller and returns raw nested
//! records as JSON objects; shaping them into transfer objects is left to the
//! service layer.

use serde_json::Value as JsonValue;

use crate::backends::{DatabaseTransaction, DatabaseValue, Values};
use crate::error::{ModelError, ModelResult, QueryError};
use crate::loading::{hydration, AliasAllocator, LoadPlan};
use crate::query::{
    BoundQuery, ColumnRef, Condition, CountStatement, DeleteStatement, ExistsStatement, InsertStatement,
    OrderSpec, SelectStatement, UpdateStatement, UpsertStatement,
};
use crate::relationships::{EntityDef, SchemaGraph};
use super::integrity::IntegrityTranslator;
use super::result::{Category, RepoResult};

/// Ordering and window of a `select_many` call
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Defaults to `created_at` ascending when the entity has it, else the primary key
    pub order_by: Vec<OrderSpec>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            order_by: Vec::new(),
            offset: 0,
            limit: 10,
        }
    }
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, spec: impl Into<OrderSpec>) -> Self {
        self.order_by.push(spec.into());
        self
    }
}

/// Repository over one declared entity
#[derive(Debug, Clone)]
pub struct CrudRepository {
    entity: EntityDef,
    integrity: IntegrityTranslator,
}

impl CrudRepository {
    /// Repository for the entity named `model` in `graph`
    pub fn new(graph: &SchemaGraph, model: &str) -> ModelResult<Self> {
        let id = graph.entity_id(model)?;
        Ok(Self::for_entity(graph.entity(id).clone()))
    }

    pub fn for_entity(entity: EntityDef) -> Self {
        Self {
            entity,
            integrity: IntegrityTranslator::default(),
        }
    }

    /// Report integrity violations mentioning `column` as conflicts
    pub fn with_unique(mut self, column: impl Into<String>) -> Self {
        self.integrity = self.integrity.with_unique(column);
        self
    }

    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    pub async fn insert(&self, tx: &mut dyn DatabaseTransaction, values: Values) -> ModelResult<RepoResult<JsonValue>> {
        self.check_columns(values.keys())?;
        let query = InsertStatement::new(self.entity.table.clone()).row(values).render()?;
        let record = self.write_one(tx, query).await?;
        Ok(RepoResult::new(record, Category::Create))
    }

    pub async fn insert_many(&self, tx: &mut dyn DatabaseTransaction, rows: Vec<Values>) -> ModelResult<Vec<JsonValue>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        for row in &rows {
            self.check_columns(row.keys())?;
        }
        let query = InsertStatement::new(self.entity.table.clone()).rows(rows).render()?;
        self.write_all(tx, query).await
    }

    /// First record matching `predicates`, with the plan's relations when one is given
    pub async fn select(
        &self,
        tx: &mut dyn DatabaseTransaction,
        predicates: &[Condition],
        plan: Option<&LoadPlan>,
    ) -> ModelResult<RepoResult<JsonValue>> {
        let record = match plan {
            Some(plan) => {
                self.check_plan(plan)?;
                let statement = plan.select_for(predicates, &[], Some(1), None);
                hydration::load(tx, plan, &statement).await?.into_iter().next()
            }
            None => {
                let query = self.bare_select(predicates, &[], Some(1), None).render();
                match tx.fetch_optional(&query.sql, &query.params).await? {
                    Some(row) => Some(row.to_json()?),
                    None => None,
                }
            }
        };
        Ok(RepoResult::new(record, Category::Select))
    }

    /// Total matching count plus one page of records.
    ///
    /// The page query is skipped when nothing matches.
    pub async fn select_many(
        &self,
        tx: &mut dyn DatabaseTransaction,
        predicates: &[Condition],
        plan: Option<&LoadPlan>,
        page: &Page,
    ) -> ModelResult<(i64, Vec<JsonValue>)> {
        let total = self.count(tx, predicates).await?;
        if total <= 0 {
            return Ok((0, Vec::new()));
        }

        let ordering = self.page_ordering(page)?;
        let records = match plan {
            Some(plan) => {
                self.check_plan(plan)?;
                let statement = plan.select_for(predicates, &ordering, Some(page.limit), Some(page.offset));
                hydration::load(tx, plan, &statement).await?
            }
            None => {
                let query = self
                    .bare_select(predicates, &ordering, Some(page.limit), Some(page.offset))
                    .render();
                let rows = tx.fetch_all(&query.sql, &query.params).await?;
                rows.iter().map(|row| row.to_json()).collect::<ModelResult<Vec<_>>>()?
            }
        };

        Ok((total, records))
    }

    pub async fn update(
        &self,
        tx: &mut dyn DatabaseTransaction,
        predicates: &[Condition],
        values: Values,
    ) -> ModelResult<RepoResult<JsonValue>> {
        self.check_columns(values.keys())?;
        let mut statement = UpdateStatement::new(self.entity.table.clone(), values);
        for predicate in predicates {
            statement = statement.and_where(predicate.clone());
        }
        let record = self.write_one(tx, statement.render()?).await?;
        Ok(RepoResult::new(record, Category::Update))
    }

    /// Update each row by its primary key; returns the number of rows changed
    pub async fn update_many(&self, tx: &mut dyn DatabaseTransaction, rows: Vec<Values>) -> ModelResult<u64> {
        let pk = self.entity.primary_key.clone();
        let mut affected = 0;

        for mut row in rows {
            let key = row
                .remove(&pk)
                .filter(|value| !value.is_null())
                .ok_or_else(|| ModelError::Validation(format!("update_many row is missing '{}'", pk)))?;
            self.check_columns(row.keys())?;

            let query = UpdateStatement::new(self.entity.table.clone(), row)
                .and_where(ColumnRef::new(pk.clone()).eq(key))
                .render()?;
            affected += tx
                .execute(&query.sql, &query.params)
                .await
                .map_err(|e| self.integrity.translate(e))?;
        }

        Ok(affected)
    }

    pub async fn delete(
        &self,
        tx: &mut dyn DatabaseTransaction,
        predicates: &[Condition],
    ) -> ModelResult<RepoResult<JsonValue>> {
        let mut statement = DeleteStatement::new(self.entity.table.clone());
        for predicate in predicates {
            statement = statement.and_where(predicate.clone());
        }
        let query = statement.render();
        let record = match tx.fetch_optional(&query.sql, &query.params).await? {
            Some(row) => Some(row.to_json()?),
            None => None,
        };
        Ok(RepoResult::new(record, Category::Delete))
    }

    /// Insert or, on a conflict over `conflict_columns`, update the other columns
    pub async fn upsert(
        &self,
        tx: &mut dyn DatabaseTransaction,
        conflict_columns: &[&str],
        values: Values,
    ) -> ModelResult<RepoResult<JsonValue>> {
        self.check_columns(values.keys())?;
        self.check_columns(conflict_columns.iter().copied())?;
        let query = UpsertStatement::new(self.entity.table.clone(), conflict_columns.iter().copied())
            .row(values)
            .render()?;
        let record = self.write_one(tx, query).await?;
        Ok(RepoResult::new(record, Category::Create))
    }

    pub async fn upsert_many(
        &self,
        tx: &mut dyn DatabaseTransaction,
        conflict_columns: &[&str],
        rows: Vec<Values>,
    ) -> ModelResult<Vec<JsonValue>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.check_columns(conflict_columns.iter().copied())?;
        for row in &rows {
            self.check_columns(row.keys())?;
        }
        let query = UpsertStatement::new(self.entity.table.clone(), conflict_columns.iter().copied())
            .rows(rows)
            .render()?;
        self.write_all(tx, query).await
    }

    pub async fn exists(&self, tx: &mut dyn DatabaseTransaction, predicates: &[Condition]) -> ModelResult<bool> {
        let query = ExistsStatement::new(self.entity.table.clone(), predicates.to_vec()).render();
        match tx.fetch_optional(&query.sql, &query.params).await? {
            Some(row) => Ok(matches!(row.get_by_name("exists")?, DatabaseValue::Bool(true))),
            None => Ok(false),
        }
    }

    pub async fn count(&self, tx: &mut dyn DatabaseTransaction, predicates: &[Condition]) -> ModelResult<i64> {
        let query = CountStatement::new(self.entity.table.clone(), predicates.to_vec()).render();
        let Some(row) = tx.fetch_optional(&query.sql, &query.params).await? else {
            return Ok(0);
        };

        match row.get_by_name("count")? {
            DatabaseValue::Int64(count) => Ok(count),
            DatabaseValue::Int32(count) => Ok(count as i64),
            other => Err(ModelError::Query(format!("count returned {:?}", other))),
        }
    }

    async fn write_one(&self, tx: &mut dyn DatabaseTransaction, query: BoundQuery) -> ModelResult<Option<JsonValue>> {
        let row = tx
            .fetch_optional(&query.sql, &query.params)
            .await
            .map_err(|e| self.integrity.translate(e))?;
        row.map(|row| row.to_json()).transpose()
    }

    async fn write_all(&self, tx: &mut dyn DatabaseTransaction, query: BoundQuery) -> ModelResult<Vec<JsonValue>> {
        let rows = tx
            .fetch_all(&query.sql, &query.params)
            .await
            .map_err(|e| self.integrity.translate(e))?;
        rows.iter().map(|row| row.to_json()).collect()
    }

    fn bare_select(
        &self,
        predicates: &[Condition],
        ordering: &[OrderSpec],
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> SelectStatement {
        let alias = AliasAllocator::new().allocate(&self.entity.table);
        let mut statement = SelectStatement::from_table(self.entity.table.clone(), alias.clone()).all_columns(alias);
        for predicate in predicates {
            statement.push_condition(predicate.clone());
        }
        for spec in ordering {
            statement = statement.order_by(ColumnRef::new(spec.column.clone()), spec.direction);
        }
        statement.limit = limit;
        statement.offset = offset;
        statement
    }

    fn page_ordering(&self, page: &Page) -> ModelResult<Vec<OrderSpec>> {
        if page.order_by.is_empty() {
            let column = if self.entity.has_column("created_at") {
                "created_at"
            } else {
                self.entity.primary_key.as_str()
            };
            return Ok(vec![OrderSpec::asc(column)]);
        }

        self.check_columns(page.order_by.iter().map(|spec| spec.column.as_str()))?;
        Ok(page.order_by.clone())
    }

    fn check_plan(&self, plan: &LoadPlan) -> ModelResult<()> {
        if plan.root_node().name == self.entity.name {
            Ok(())
        } else {
            Err(ModelError::InvalidParams(format!(
                "plan for '{}' used with repository of '{}'",
                plan.root_node().name,
                self.entity.name
            )))
        }
    }

    fn check_columns<I, S>(&self, columns: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for column in columns {
            let column = column.as_ref();
            if !self.entity.has_column(column) {
                return Err(QueryError::UnknownColumn {
                    entity: self.entity.name.clone(),
                    column: column.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::col;

    fn users() -> CrudRepository {
        CrudRepository::for_entity(
            EntityDef::new("User", "user", "uuid").with_columns(["login", "active", "created_at"]),
        )
        .with_unique("login")
    }

    #[test]
    fn test_default_page() {
        let page = Page::default();
        assert_eq!((page.offset, page.limit), (0, 10));
        assert!(page.order_by.is_empty());
    }

    #[test]
    fn test_page_ordering_falls_back_to_created_at() {
        let ordering = users().page_ordering(&Page::default()).unwrap();
        assert_eq!(ordering, vec![OrderSpec::asc("created_at")]);

        let tags = CrudRepository::for_entity(EntityDef::new("Tag", "tag", "id").with_columns(["label"]));
        assert_eq!(tags.page_ordering(&Page::default()).unwrap(), vec![OrderSpec::asc("id")]);
    }

    #[test]
    fn test_unknown_ordering_column_is_rejected() {
        let err = users().page_ordering(&Page::default().order_by("rank")).unwrap_err();
        assert!(matches!(err, ModelError::Query(_)));
    }

    #[test]
    fn test_bare_select_sql() {
        let query = users()
            .bare_select(&[col("login").ilike("%a%")], &[OrderSpec::asc("created_at")], Some(10), Some(0))
            .render();

        assert_eq!(
            query.sql,
            "SELECT \"u0\".* FROM \"user\" AS \"u0\" WHERE \"u0\".\"login\" ILIKE $1 \
             ORDER BY \"u0\".\"created_at\" ASC LIMIT 10 OFFSET 0"
        );
    }
}
