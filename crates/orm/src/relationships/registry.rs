//! Schema Graph - immutable adjacency map of declared relationships
//!
//! The graph is built once from static declarations and shared read-only
//! afterwards. [`install_with`] freezes a process-wide instance.

use std::collections::{HashMap, HashSet};
use once_cell::sync::OnceCell;

use crate::error::{ModelError, ModelResult, RelationshipError};
use super::metadata::{EntityDef, EntityId, RelationDecl, RelationId, RelationshipDescriptor};
use super::resolver::{resolve, RelationshipPath};

static SCHEMA: OnceCell<SchemaGraph> = OnceCell::new();

/// Entity types and their outgoing relationship descriptors
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    entities: Vec<EntityDef>,
    by_name: HashMap<String, EntityId>,
    relations: Vec<RelationshipDescriptor>,
    outgoing: Vec<Vec<RelationId>>,
}

impl SchemaGraph {
    pub fn builder() -> SchemaGraphBuilder {
        SchemaGraphBuilder::default()
    }

    /// Look an entity up by type name
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.by_name.get(name).copied()
    }

    /// Look an entity up by type name, failing on unknown names
    pub fn entity_id(&self, name: &str) -> ModelResult<EntityId> {
        self.find_entity(name)
            .ok_or_else(|| ModelError::Schema(format!("Unknown entity '{}'", name)))
    }

    pub fn entity(&self, id: EntityId) -> &EntityDef {
        &self.entities[id.0]
    }

    pub fn relation(&self, id: RelationId) -> &RelationshipDescriptor {
        &self.relations[id.0]
    }

    /// Outgoing descriptors of an entity, in declaration order
    pub fn outgoing(&self, id: EntityId) -> impl Iterator<Item = &RelationshipDescriptor> {
        self.outgoing[id.0].iter().map(move |rel| &self.relations[rel.0])
    }

    /// Descriptor declared directly on `source` under `name`
    pub fn relation_named(&self, source: EntityId, name: &str) -> Option<&RelationshipDescriptor> {
        self.outgoing(source).find(|rel| rel.name == name)
    }

    /// Shortest relationship path from `root` to a relation called `relation_name`
    pub fn resolve(&self, root: EntityId, relation_name: &str) -> RelationshipPath {
        resolve(self, root, relation_name)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

/// Collects declarations and validates them into a [`SchemaGraph`]
#[derive(Debug, Default)]
pub struct SchemaGraphBuilder {
    entities: Vec<EntityDef>,
    relations: Vec<RelationDecl>,
}

impl SchemaGraphBuilder {
    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn relation(mut self, relation: RelationDecl) -> Self {
        self.relations.push(relation);
        self
    }

    /// Validate every declaration and freeze the graph
    pub fn build(self) -> ModelResult<SchemaGraph> {
        let mut by_name = HashMap::with_capacity(self.entities.len());
        for (index, entity) in self.entities.iter().enumerate() {
            if by_name.insert(entity.name.clone(), EntityId(index)).is_some() {
                return Err(RelationshipError::DuplicateEntity(entity.name.clone()).into());
            }
        }

        let lookup = |relation: &str, entity: &str| {
            by_name.get(entity).copied().ok_or_else(|| RelationshipError::UndeclaredEntity {
                relation: relation.to_string(),
                entity: entity.to_string(),
            })
        };

        let mut relations = Vec::with_capacity(self.relations.len());
        let mut outgoing = vec![Vec::new(); self.entities.len()];
        let mut seen = HashSet::new();

        for decl in self.relations {
            let qualified = format!("{}.{}", decl.source, decl.name);
            let source = lookup(&qualified, &decl.source)?;
            let target = lookup(&qualified, &decl.target)?;

            if !seen.insert((source, decl.name.clone())) {
                return Err(RelationshipError::DuplicateRelation {
                    entity: decl.source.clone(),
                    relation: decl.name.clone(),
                }
                .into());
            }

            if decl.join.is_empty() {
                return Err(RelationshipError::InvalidConfiguration(format!(
                    "relationship '{}' has no join condition",
                    qualified
                ))
                .into());
            }

            let source_def = &self.entities[source.0];
            let target_def = &self.entities[target.0];
            let check = |entity: &EntityDef, column: &str| {
                if entity.has_column(column) {
                    Ok(())
                } else {
                    Err(RelationshipError::UnknownJoinColumn {
                        relation: qualified.clone(),
                        entity: entity.name.clone(),
                        column: column.to_string(),
                    })
                }
            };

            for column in decl.join.left_columns() {
                check(source_def, column)?;
            }
            match &decl.junction {
                Some(junction) => {
                    if junction.target.is_empty() {
                        return Err(RelationshipError::InvalidConfiguration(format!(
                            "junction of '{}' has no join condition",
                            qualified
                        ))
                        .into());
                    }
                    for column in junction.target.right_columns() {
                        check(target_def, column)?;
                    }
                }
                None => {
                    for column in decl.join.right_columns() {
                        check(target_def, column)?;
                    }
                }
            }

            let id = RelationId(relations.len());
            outgoing[source.0].push(id);
            relations.push(RelationshipDescriptor {
                id,
                name: decl.name,
                source,
                target,
                cardinality: decl.cardinality,
                join: decl.join,
                junction: decl.junction,
                inverse: decl.inverse,
            });
        }

        for relation in &relations {
            if let Some(inverse) = &relation.inverse {
                let declared = outgoing[relation.target.0]
                    .iter()
                    .any(|id| relations[id.0].name == *inverse);
                if !declared {
                    return Err(RelationshipError::MissingInverse {
                        relation: format!("{}.{}", self.entities[relation.source.0].name, relation.name),
                        inverse: inverse.clone(),
                    }
                    .into());
                }
            }
        }

        tracing::info!(
            entities = self.entities.len(),
            relations = relations.len(),
            "schema graph built"
        );

        Ok(SchemaGraph {
            entities: self.entities,
            by_name,
            relations,
            outgoing,
        })
    }
}

/// Build and install the process-wide schema graph on first call.
///
/// Later calls return the installed graph without invoking `build`.
pub fn install_with<F>(build: F) -> ModelResult<&'static SchemaGraph>
where
    F: FnOnce() -> ModelResult<SchemaGraph>,
{
    SCHEMA.get_or_try_init(build)
}

/// The installed process-wide schema graph
pub fn global() -> ModelResult<&'static SchemaGraph> {
    SCHEMA
        .get()
        .ok_or_else(|| ModelError::Configuration("schema graph has not been installed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::Cardinality;

    fn user() -> EntityDef {
        EntityDef::new("User", "user", "uuid").with_columns(["login", "role_uuid"])
    }

    fn role() -> EntityDef {
        EntityDef::new("Role", "role", "uuid").with_columns(["name"])
    }

    #[test]
    fn test_build_user_role_graph() {
        let graph = SchemaGraph::builder()
            .entity(role())
            .entity(user())
            .relation(RelationDecl::many("Role", "users", "User").on("uuid", "role_uuid").inverse("role"))
            .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid").inverse("users"))
            .build()
            .unwrap();

        let user_id = graph.entity_id("User").unwrap();
        let role_rel = graph.relation_named(user_id, "role").unwrap();

        assert_eq!(graph.entity(role_rel.target).name, "Role");
        assert_eq!(role_rel.cardinality, Cardinality::One);
        assert_eq!(graph.outgoing(user_id).count(), 1);
        assert_eq!(graph.relation_count(), 2);
    }

    #[test]
    fn test_undeclared_target_is_configuration_error() {
        let err = SchemaGraph::builder()
            .entity(user())
            .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid"))
            .build()
            .unwrap_err();

        assert!(matches!(err, ModelError::Configuration(ref msg) if msg.contains("undeclared entity 'Role'")));
    }

    #[test]
    fn test_unknown_join_column_rejected() {
        let err = SchemaGraph::builder()
            .entity(user())
            .entity(role())
            .relation(RelationDecl::one("User", "role", "Role").on("group_uuid", "uuid"))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("User.group_uuid"));
    }

    #[test]
    fn test_missing_inverse_rejected() {
        let err = SchemaGraph::builder()
            .entity(user())
            .entity(role())
            .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid").inverse("members"))
            .build()
            .unwrap_err();

        assert!(matches!(err, ModelError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_relation_rejected() {
        let err = SchemaGraph::builder()
            .entity(user())
            .entity(role())
            .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid"))
            .relation(RelationDecl::one("User", "role", "Role").on("role_uuid", "uuid"))
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_entity_lookup() {
        let graph = SchemaGraph::builder().entity(user()).build().unwrap();
        assert!(graph.find_entity("Post").is_none());
        assert!(matches!(graph.entity_id("Post"), Err(ModelError::Schema(_))));
    }
}
