//! Plan Cache - process-local memo of compiled load plans
//!
//! Plans are keyed by the semantic shape of a request. Concurrent first
//! requests for one key may each compile; the first stored plan wins and the
//! redundant ones are dropped. Nothing is ever evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ModelResult;
use crate::query::OrderSpec;
use crate::relationships::EntityId;
use super::plan::LoadPlan;

/// Semantic shape of a load request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub root: EntityId,
    /// Sorted, deduplicated relation names
    pub relations: Vec<String>,
    pub ordering: Vec<OrderSpec>,
    pub limit: Option<u32>,
    pub self_key: Option<String>,
    /// Content fingerprint of the filter adjustments
    pub adjustments: Option<String>,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Compilations discarded because another caller stored the key first
    pub redundant_compiles: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent map from [`CacheKey`] to shared [`LoadPlan`]
#[derive(Debug, Default)]
pub struct PlanCache {
    plans: DashMap<CacheKey, Arc<LoadPlan>>,
    hits: AtomicU64,
    misses: AtomicU64,
    redundant: AtomicU64,
}

impl PlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached plan for `key`, compiling and storing it on a miss.
    ///
    /// `compile` runs without any lock held.
    pub fn get_or_compile<F>(&self, key: CacheKey, compile: F) -> ModelResult<Arc<LoadPlan>>
    where
        F: FnOnce() -> ModelResult<LoadPlan>,
    {
        if let Some(plan) = self.plans.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(plan.value()));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(?key, "plan cache miss");
        let compiled = Arc::new(compile()?);

        match self.plans.entry(key) {
            Entry::Occupied(existing) => {
                self.redundant.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(existing.get()))
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&compiled));
                Ok(compiled)
            }
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<LoadPlan>> {
        self.plans.get(key).map(|plan| Arc::clone(plan.value()))
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            redundant_compiles: self.redundant.load(Ordering::Relaxed),
            entries: self.plans.len(),
        }
    }
}
