//! Hydration - folding flat joined rows back into nested records
//!
//! Rows of the primary statement carry every joined node's columns under
//! `alias.column` labels. Records are deduplicated per parent by primary key,
//! so a root repeated by a lateral join still yields one object. Batched
//! collections are fetched afterwards, one statement per batch, keyed by the
//! parent records already hydrated.

use std::collections::{BTreeMap, HashMap};
use serde_json::{Map, Value as JsonValue};

use crate::backends::{DatabaseRow, DatabaseTransaction, DatabaseValue};
use crate::error::ModelResult;
use crate::query::SelectStatement;
use crate::relationships::Cardinality;
use super::plan::{LoadPlan, NodeId, RowSource};

type RecordId = usize;

#[derive(Debug)]
struct Record {
    node: NodeId,
    values: BTreeMap<String, DatabaseValue>,
    children: HashMap<NodeId, Vec<RecordId>>,
}

/// Parent records waiting for one batched collection
#[derive(Debug)]
pub struct PendingBatch {
    pub statement: SelectStatement,
    parents: HashMap<Vec<String>, Vec<RecordId>>,
}

/// Accumulates rows for one [`LoadPlan`] and emits nested JSON objects
#[derive(Debug)]
pub struct Hydrator<'p> {
    plan: &'p LoadPlan,
    records: Vec<Record>,
    seen: HashMap<(Option<RecordId>, NodeId, String), RecordId>,
    roots: Vec<RecordId>,
}

impl<'p> Hydrator<'p> {
    pub fn new(plan: &'p LoadPlan) -> Self {
        Self {
            plan,
            records: Vec::new(),
            seen: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Fold one row of the primary statement
    pub fn absorb_primary(&mut self, row: &dyn DatabaseRow) -> ModelResult<()> {
        self.absorb(row, RowSource::Primary, NodeId::ROOT, None)
    }

    fn absorb(
        &mut self,
        row: &dyn DatabaseRow,
        source: RowSource,
        node_id: NodeId,
        parent: Option<RecordId>,
    ) -> ModelResult<()> {
        let plan = self.plan;
        let node = plan.node(node_id);

        let key = row.get_by_name(&node.label(&node.primary_key))?;
        // Outer join produced no match
        if key.is_null() {
            return Ok(());
        }

        let record = match self.seen.get(&(parent, node_id, key.identity())) {
            Some(&existing) => existing,
            None => {
                let mut values = BTreeMap::new();
                for column in &node.columns {
                    values.insert(column.clone(), row.get_by_name(&node.label(column))?);
                }

                let id = self.records.len();
                self.records.push(Record {
                    node: node_id,
                    values,
                    children: HashMap::new(),
                });
                self.seen.insert((parent, node_id, key.identity()), id);

                match parent {
                    Some(parent) => self.records[parent].children.entry(node_id).or_default().push(id),
                    None => self.roots.push(id),
                }
                id
            }
        };

        for &child in &node.children {
            if plan.node(child).source == source {
                self.absorb(row, source, child, Some(record))?;
            }
        }
        Ok(())
    }

    /// Statement for batch `index` restricted to the hydrated parents' keys.
    ///
    /// `None` when no parent has a complete key.
    pub fn prepare_batch(&self, index: usize) -> Option<PendingBatch> {
        let batch = &self.plan.batches()[index];
        let parent_node = self.plan.node(batch.node).parent?;

        let mut parents: HashMap<Vec<String>, Vec<RecordId>> = HashMap::new();
        let mut keys: Vec<Vec<DatabaseValue>> = Vec::new();

        for (id, record) in self.records.iter().enumerate() {
            if record.node != parent_node {
                continue;
            }

            let key: Option<Vec<DatabaseValue>> = batch
                .parent_columns
                .iter()
                .map(|column| record.values.get(column).filter(|value| !value.is_null()).cloned())
                .collect();
            let Some(key) = key else { continue };

            let identity: Vec<String> = key.iter().map(DatabaseValue::identity).collect();
            let entry = parents.entry(identity).or_default();
            if entry.is_empty() {
                keys.push(key);
            }
            entry.push(id);
        }

        if keys.is_empty() {
            return None;
        }

        Some(PendingBatch {
            statement: batch.for_parents(&keys),
            parents,
        })
    }

    /// Attach rows of batch `index` under every parent sharing their link key
    pub fn absorb_batch(
        &mut self,
        index: usize,
        pending: &PendingBatch,
        rows: &[Box<dyn DatabaseRow>],
    ) -> ModelResult<()> {
        let plan = self.plan;
        let batch = &plan.batches()[index];

        for row in rows {
            let mut link = Vec::with_capacity(batch.link_labels.len());
            for label in &batch.link_labels {
                link.push(row.get_by_name(label)?.identity());
            }

            if let Some(parents) = pending.parents.get(&link) {
                for &parent in parents {
                    self.absorb(row.as_ref(), RowSource::Batch(index), batch.node, Some(parent))?;
                }
            }
        }
        Ok(())
    }

    /// Nested objects, one per distinct root, in first-seen order
    pub fn finish(self) -> Vec<JsonValue> {
        self.roots.iter().map(|&root| self.to_json(root)).collect()
    }

    fn to_json(&self, id: RecordId) -> JsonValue {
        let record = &self.records[id];
        let mut object = Map::new();

        for (column, value) in &record.values {
            object.insert(column.clone(), value.to_json());
        }

        for &child in &self.plan.node(record.node).children {
            let node = self.plan.node(child);
            let loaded = record.children.get(&child).map(Vec::as_slice).unwrap_or(&[]);

            let value = match node.cardinality {
                Cardinality::One => loaded
                    .first()
                    .map(|&first| self.to_json(first))
                    .unwrap_or(JsonValue::Null),
                Cardinality::Many => JsonValue::Array(loaded.iter().map(|&item| self.to_json(item)).collect()),
            };
            object.insert(node.name.clone(), value);
        }

        JsonValue::Object(object)
    }
}

/// Execute `statement` (built from `plan`) plus its batched loads and hydrate the result
pub async fn load(
    tx: &mut dyn DatabaseTransaction,
    plan: &LoadPlan,
    statement: &SelectStatement,
) -> ModelResult<Vec<JsonValue>> {
    let query = statement.render();
    let rows = tx.fetch_all(&query.sql, &query.params).await?;

    let mut hydrator = Hydrator::new(plan);
    for row in &rows {
        hydrator.absorb_primary(row.as_ref())?;
    }

    for index in 0..plan.batches().len() {
        let Some(pending) = hydrator.prepare_batch(index) else {
            tracing::debug!(batch = index, "no parent keys, skipping batched load");
            continue;
        };

        let query = pending.statement.render();
        let rows = tx.fetch_all(&query.sql, &query.params).await?;
        hydrator.absorb_batch(index, &pending, &rows)?;
    }

    Ok(hydrator.finish())
}
