mod common;

use std::sync::Arc;

use relgraph_orm::{
    global_cache, install_with, plan_for, resolve, select_with_relationships, Cardinality, LoadRequest,
    LoadStrategy, OrderSpec, PlanCache, PlanCompiler,
};

#[test]
fn test_user_role_is_single_left_join() {
    let graph = common::schema();
    let user = graph.entity_id("User").unwrap();

    let path = resolve(&graph, user, "role");
    assert_eq!(path.len(), 1);

    let plan = PlanCompiler::new(&graph)
        .compile(&LoadRequest::new("User").relation("role"))
        .unwrap();
    let sql = plan.render().sql;

    assert_eq!(sql.matches("JOIN").count(), 1);
    assert!(sql.contains("FROM \"user\" AS \"u0\" LEFT JOIN \"role\" AS \"r1\" ON \"u0\".\"role_uuid\" = \"r1\".\"uuid\""));

    let role = plan.find("role").unwrap();
    assert_eq!(role.cardinality, Cardinality::One);
    assert_eq!(role.strategy, LoadStrategy::Joined);
}

#[test]
fn test_bfs_finds_shortest_chain() {
    let graph = common::schema();
    let role = graph.entity_id("Role").unwrap();

    let names: Vec<_> = resolve(&graph, role, "tags")
        .descriptors(&graph)
        .map(|relation| relation.name.clone())
        .collect();
    assert_eq!(names, vec!["users", "posts", "tags"]);

    assert!(resolve(&graph, role, "followers").is_empty());
}

#[test]
fn test_shared_intermediate_types_are_loaded_once() {
    let graph = common::schema();
    let plan = PlanCompiler::new(&graph)
        .compile(&LoadRequest::new("Post").relations(["users", "tags", "role", "author"]).limit(Some(3)))
        .unwrap();

    let names: Vec<_> = plan.nodes().iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["Post", "author", "role", "tags"]);

    // "users" leads back to User through author -> role, already loaded
    let role = plan.find("role").unwrap();
    assert_eq!(plan.node(role.parent.unwrap()).name, "author");
    assert_eq!(plan.statement().joins().len(), 3);

    let sql = plan.render().sql;
    assert!(sql.contains("LEFT JOIN \"role\" AS \"r2\" ON \"u1\".\"role_uuid\" = \"r2\".\"uuid\""));
}

#[test]
fn test_bounded_collection_sub_select() {
    let graph = common::schema();
    let plan = PlanCompiler::new(&graph)
        .compile(
            &LoadRequest::new("Role")
                .relation("users")
                .limit(Some(2))
                .order_by(OrderSpec::desc("created_at")),
        )
        .unwrap();

    let sql = plan.render().sql;
    assert!(sql.contains("LEFT JOIN LATERAL (SELECT \"u1\".\"uuid\""));
    assert!(sql.contains("WHERE \"r0\".\"uuid\" = \"u1\".\"role_uuid\" ORDER BY \"u1\".\"created_at\" DESC LIMIT 2) AS \"u2\" ON TRUE"));
    assert_eq!(plan.find("users").unwrap().strategy, LoadStrategy::BoundedLateral);
}

#[test]
fn test_self_referential_collection_with_self_key() {
    let graph = common::schema();
    let plan = PlanCompiler::new(&graph)
        .compile(
            &LoadRequest::new("Category")
                .relation("children")
                .self_key("parent_id")
                .order_by(OrderSpec::asc("id")),
        )
        .unwrap();

    let sql = plan.render().sql;
    assert!(sql.contains("INNER JOIN \"category\" AS \"c1\" ON \"c0\".\"id\" = \"c1\".\"parent_id\""));
    assert!(!sql.contains("LATERAL"));
}

#[test]
fn test_equal_shapes_share_one_plan() {
    let graph = common::schema();
    let cache = PlanCache::new();

    let first = plan_for(&graph, &cache, &LoadRequest::new("User").relations(["role", "posts"])).unwrap();
    let second = plan_for(&graph, &cache, &LoadRequest::new("User").relations(["posts", "role"])).unwrap();
    let bounded = plan_for(&graph, &cache, &LoadRequest::new("User").relations(["posts", "role"]).limit(Some(5))).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &bounded));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_concurrent_first_requests_agree() {
    let graph = common::schema();
    let cache = PlanCache::new();
    let request = LoadRequest::new("Role").relations(["users", "posts"]);

    let rendered: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| plan_for(&graph, &cache, &request).unwrap().render().sql))
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert!(rendered.windows(2).all(|pair| pair[0] == pair[1]));

    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits + stats.misses, 8);
    assert_eq!(stats.misses, 1 + stats.redundant_compiles);
}

#[test]
fn test_global_entry_point_uses_installed_schema() {
    install_with(|| Ok(common::schema())).unwrap();

    let request = LoadRequest::new("User").relation("role");
    let first = select_with_relationships(&request).unwrap();
    let second = select_with_relationships(&request).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!global_cache().is_empty());
}
