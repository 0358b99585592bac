//! Breadth-first relationship path resolution

use std::collections::{HashSet, VecDeque};

use super::metadata::{EntityId, RelationId, RelationshipDescriptor};
use super::registry::SchemaGraph;

/// Ordered relationship hops from a root entity to a named relation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelationshipPath {
    hops: Vec<RelationId>,
}

impl RelationshipPath {
    pub fn hops(&self) -> &[RelationId] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Descriptors along the path, root side first
    pub fn descriptors<'g>(&'g self, graph: &'g SchemaGraph) -> impl Iterator<Item = &'g RelationshipDescriptor> + 'g {
        self.hops.iter().map(move |id| graph.relation(*id))
    }
}

/// Find the shortest chain of relationships leading from `root` to a
/// descriptor named `relation_name`.
///
/// Entity types are marked visited when dequeued and never explored twice,
/// so the search terminates on cyclic schemas. An unknown name yields an
/// empty path.
pub fn resolve(graph: &SchemaGraph, root: EntityId, relation_name: &str) -> RelationshipPath {
    let mut queue: VecDeque<(EntityId, Vec<RelationId>)> = VecDeque::new();
    let mut visited: HashSet<EntityId> = HashSet::new();
    queue.push_back((root, Vec::new()));

    while let Some((node, path)) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }

        for relation in graph.outgoing(node) {
            let mut extended = path.clone();
            extended.push(relation.id);

            if relation.name == relation_name {
                return RelationshipPath { hops: extended };
            }

            if !visited.contains(&relation.target) {
                queue.push_back((relation.target, extended));
            }
        }
    }

    tracing::warn!(
        root = %graph.entity(root).name,
        relation = relation_name,
        "relation is not reachable from root, nothing will be loaded"
    );
    RelationshipPath::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{EntityDef, RelationDecl};

    /// User -> Post -> Comment -> User, plus a long detour to `Tag.label`
    fn graph() -> SchemaGraph {
        SchemaGraph::builder()
            .entity(EntityDef::new("User", "user", "id").with_columns(["name", "profile_id"]))
            .entity(EntityDef::new("Profile", "profile", "id").with_columns(["bio"]))
            .entity(EntityDef::new("Post", "post", "id").with_columns(["author_id"]))
            .entity(EntityDef::new("Comment", "comment", "id").with_columns(["post_id", "author_id"]))
            .entity(EntityDef::new("Tag", "tag", "id").with_columns(["label"]))
            .relation(RelationDecl::one("User", "profile", "Profile").on("profile_id", "id"))
            .relation(RelationDecl::many("User", "posts", "Post").on("id", "author_id"))
            .relation(RelationDecl::many("Post", "comments", "Comment").on("id", "post_id"))
            .relation(RelationDecl::one("Comment", "author", "User").on("author_id", "id"))
            .relation(RelationDecl::many("Profile", "comments", "Comment").on("id", "author_id"))
            .relation(RelationDecl::many("Comment", "tags", "Tag").through("comment_tag", ("id", "comment_id"), ("tag_id", "id")))
            .build()
            .unwrap()
    }

    fn names(graph: &SchemaGraph, path: &RelationshipPath) -> Vec<String> {
        path.descriptors(graph)
            .map(|rel| format!("{}.{}", graph.entity(rel.source).name, rel.name))
            .collect()
    }

    #[test]
    fn test_direct_relation_is_one_hop() {
        let graph = graph();
        let user = graph.entity_id("User").unwrap();

        let path = resolve(&graph, user, "posts");
        assert_eq!(path.len(), 1);
        assert_eq!(names(&graph, &path), vec!["User.posts"]);
    }

    #[test]
    fn test_shortest_path_wins() {
        let graph = graph();
        let user = graph.entity_id("User").unwrap();

        // Both User.profile.comments and User.posts.comments are two hops;
        // declaration order breaks the tie.
        let path = resolve(&graph, user, "comments");
        assert_eq!(names(&graph, &path), vec!["User.profile", "Profile.comments"]);

        let path = resolve(&graph, user, "tags");
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_cycle_terminates_and_unknown_is_empty() {
        let graph = graph();
        let post = graph.entity_id("Post").unwrap();

        assert!(resolve(&graph, post, "followers").is_empty());
        assert_eq!(names(&graph, &resolve(&graph, post, "author")), vec!["Post.comments", "Comment.author"]);
    }

    #[test]
    fn test_self_referential_name_resolves_from_root() {
        let graph = SchemaGraph::builder()
            .entity(EntityDef::new("Category", "category", "id").with_columns(["parent_id"]))
            .relation(RelationDecl::many("Category", "children", "Category").on("id", "parent_id"))
            .build()
            .unwrap();
        let category = graph.entity_id("Category").unwrap();

        let path = graph.resolve(category, "children");
        assert_eq!(path.len(), 1);
        assert!(graph.relation(path.hops()[0]).is_self_referential());
    }
}
