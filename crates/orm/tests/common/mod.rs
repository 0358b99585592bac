//! Shared fixtures: the demo schema and an in-memory transaction double

#![allow(dead_code)]

use std::collections::VecDeque;

use async_trait::async_trait;
use relgraph_orm::{
    DatabaseRow, DatabaseTransaction, DatabaseValue, EntityDef, LoadPlan, MemoryRow, ModelError, OrmResult,
    RelationDecl, RowSource, SchemaGraph,
};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

/// User/Role plus the Post/Tag/Category demo entities
pub fn schema() -> SchemaGraph {
    init_tracing();
    SchemaGraph::builder()
        .entity(EntityDef::new("Role", "role", "uuid").with_columns(["name", "created_at", "updated_at"]))
        .entity(EntityDef::new("User", "user", "uuid").with_columns([
            "login",
            "password",
            "active",
            "role_uuid",
            "created_at",
            "updated_at",
        ]))
        .entity(EntityDef::new("Post", "post", "id").with_columns(["author_uuid", "title", "created_at"]))
        .entity(EntityDef::new("Tag", "tag", "id").with_columns(["label"]))
        .entity(EntityDef::new("Category", "category", "id").with_columns(["parent_id", "name", "created_at"]))
        .relation(RelationDecl::many("Role", "users", "User").on("uuid", "role_uuid").inverse("role"))
        .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid").inverse("users"))
        .relation(RelationDecl::many("User", "posts", "Post").on("uuid", "author_uuid").inverse("author"))
        .relation(RelationDecl::one("Post", "author", "User").on("author_uuid", "uuid").inverse("posts"))
        .relation(RelationDecl::many("Post", "tags", "Tag").through("post_tag", ("id", "post_id"), ("tag_id", "id")))
        .relation(RelationDecl::many("Category", "children", "Category").on("id", "parent_id").inverse("parent"))
        .relation(RelationDecl::one("Category", "parent", "Category").on("parent_id", "id").inverse("children"))
        .build()
        .expect("demo schema is valid")
}

/// One primary-statement row of `plan`: each `(node, record)` pair fills that
/// node's labelled columns, every other node is NULL
pub fn plan_row(plan: &LoadPlan, parts: &[(&str, JsonValue)]) -> MemoryRow {
    let mut row = MemoryRow::new();
    for node in plan.nodes() {
        let record = parts
            .iter()
            .find(|(name, _)| *name == node.name)
            .map(|(_, record)| record);

        for column in &node.columns {
            let value = record
                .and_then(|record| record.get(column))
                .cloned()
                .map(DatabaseValue::from_json)
                .unwrap_or(DatabaseValue::Null);
            row = row.with(node.label(column), value);
        }
    }
    row
}

/// One row of secondary statement `index`: the link columns carry `link`, the
/// batched node's columns come from `record`, deeper nodes are NULL
pub fn batch_row(plan: &LoadPlan, index: usize, link: &[JsonValue], record: &JsonValue) -> MemoryRow {
    let batch = &plan.batches()[index];
    let mut row = MemoryRow::new();
    for (label, value) in batch.link_labels.iter().zip(link) {
        row = row.with(label.clone(), DatabaseValue::from_json(value.clone()));
    }

    for node in plan.nodes().iter().filter(|node| node.source == RowSource::Batch(index)) {
        for column in &node.columns {
            let value = Some(record)
                .filter(|_| node.id == batch.node)
                .and_then(|record| record.get(column))
                .cloned()
                .map(DatabaseValue::from_json)
                .unwrap_or(DatabaseValue::Null);
            row = row.with(node.label(column), value);
        }
    }
    row
}

/// Installs an env-filtered subscriber once per test binary (`RUST_LOG`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn count_row(count: i64) -> MemoryRow {
    MemoryRow::new().with("count", count)
}

pub fn exists_row(exists: bool) -> MemoryRow {
    MemoryRow::new().with("exists", exists)
}

#[derive(Debug)]
enum Response {
    Rows(Vec<MemoryRow>),
    Affected(u64),
    Fail(ModelError),
}

/// Records every statement and replays queued responses in order.
///
/// With the queue empty, queries return no rows and executes affect none.
#[derive(Debug, Default)]
pub struct RecordingTransaction {
    pub statements: Vec<(String, Vec<DatabaseValue>)>,
    responses: VecDeque<Response>,
}

impl RecordingTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, rows: Vec<MemoryRow>) -> Self {
        self.responses.push_back(Response::Rows(rows));
        self
    }

    pub fn affect(mut self, count: u64) -> Self {
        self.responses.push_back(Response::Affected(count));
        self
    }

    pub fn fail(mut self, error: ModelError) -> Self {
        self.responses.push_back(Response::Fail(error));
        self
    }

    pub fn sql(&self, index: usize) -> &str {
        &self.statements[index].0
    }

    fn next(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Response>> {
        self.statements.push((sql.to_string(), params.to_vec()));
        match self.responses.pop_front() {
            Some(Response::Fail(error)) => Err(error),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl DatabaseTransaction for RecordingTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        Ok(match self.next(sql, params)? {
            Some(Response::Affected(count)) => count,
            Some(Response::Rows(rows)) => rows.len() as u64,
            _ => 0,
        })
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(match self.next(sql, params)? {
            Some(Response::Rows(rows)) => rows
                .into_iter()
                .map(|row| Box::new(row) as Box<dyn DatabaseRow>)
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        Ok(match self.next(sql, params)? {
            Some(Response::Rows(rows)) => rows
                .into_iter()
                .next()
                .map(|row| Box::new(row) as Box<dyn DatabaseRow>),
            _ => None,
        })
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        Ok(())
    }
}
