//! Loading Module - eager-load compilation, plan caching and hydration

pub mod alias;
pub mod cache;
pub mod eager_loader;
pub mod hydration;
pub mod plan;

pub use alias::AliasAllocator;
pub use cache::{CacheKey, CacheStats, PlanCache};
pub use eager_loader::{global_cache, plan_for, select_with_relationships, LoadRequest, PlanCompiler};
pub use hydration::{load, Hydrator, PendingBatch};
pub use plan::{BatchedLoad, LoadPlan, LoadStrategy, LoaderNode, NodeId, RowSource};
