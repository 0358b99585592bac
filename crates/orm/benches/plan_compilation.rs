//! Plan Compilation Benchmarks
//!
//! Cold compilation of eager-load plans against cached lookups of the same shape

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relgraph_orm::{plan_for, EntityDef, LoadRequest, PlanCache, PlanCompiler, RelationDecl, SchemaGraph};

fn schema() -> SchemaGraph {
    SchemaGraph::builder()
        .entity(EntityDef::new("Role", "role", "uuid").with_columns(["name", "created_at"]))
        .entity(EntityDef::new("User", "user", "uuid").with_columns(["login", "role_uuid", "created_at"]))
        .entity(EntityDef::new("Post", "post", "id").with_columns(["author_uuid", "title", "created_at"]))
        .entity(EntityDef::new("Tag", "tag", "id").with_columns(["label"]))
        .relation(RelationDecl::many("Role", "users", "User").on("uuid", "role_uuid"))
        .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid"))
        .relation(RelationDecl::many("User", "posts", "Post").on("uuid", "author_uuid"))
        .relation(RelationDecl::many("Post", "tags", "Tag").through("post_tag", ("id", "post_id"), ("tag_id", "id")))
        .build()
        .expect("benchmark schema is valid")
}

fn requests() -> Vec<(&'static str, LoadRequest)> {
    vec![
        ("to_one", LoadRequest::new("User").relation("role")),
        ("bounded", LoadRequest::new("Role").relation("users").limit(Some(2)).order_by("created_at")),
        ("batched", LoadRequest::new("Role").relation("users").limit(None)),
        ("deep", LoadRequest::new("Role").relations(["users", "posts", "tags"])),
    ]
}

fn bench_cold_compile(c: &mut Criterion) {
    let graph = schema();
    let mut group = c.benchmark_group("cold_compile");

    for (name, request) in requests() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, request| {
            b.iter(|| PlanCompiler::new(&graph).compile(black_box(request)).unwrap())
        });
    }

    group.finish();
}

fn bench_cached_lookup(c: &mut Criterion) {
    let graph = schema();
    let cache = PlanCache::new();
    let mut group = c.benchmark_group("cached_lookup");

    for (name, request) in requests() {
        plan_for(&graph, &cache, &request).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &request, |b, request| {
            b.iter(|| plan_for(&graph, &cache, black_box(request)).unwrap())
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let graph = schema();
    let plan = PlanCompiler::new(&graph)
        .compile(&LoadRequest::new("Role").relations(["users", "posts", "tags"]))
        .unwrap();

    c.bench_function("render_deep_plan", |b| b.iter(|| black_box(&plan).render()));
}

criterion_group!(benches, bench_cold_compile, bench_cached_lookup, bench_render);
criterion_main!(benches);
