//! Error types for the ORM system
//!
//! Provides error handling for schema declaration, plan compilation,
//! repository execution and constraint translation.

use std::fmt;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// SQLSTATE class reported by Postgres for integrity constraint violations
const INTEGRITY_SQLSTATE_CLASS: &str = "23";

/// Error types for ORM operations
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Database connection or query error
    Database(String),
    /// Entity not found
    NotFound(String),
    /// Operation did not affect any entity
    Forbidden(String),
    /// Unique value already taken
    Conflict(String),
    /// Constraint violation reported by the database, not yet classified
    Integrity {
        constraint: Option<String>,
        message: String,
    },
    /// Invalid input passed to an operation
    Validation(String),
    /// Caller supplied parameters that cannot be used together
    InvalidParams(String),
    /// Serialization/deserialization error
    Serialization(String),
    /// Connection pool error
    Connection(String),
    /// Transaction error
    Transaction(String),
    /// Schema declaration or lookup error
    Schema(String),
    /// Query building error
    Query(String),
    /// Configuration error
    Configuration(String),
}

impl ModelError {
    /// Whether the error is a database integrity violation
    pub fn is_integrity(&self) -> bool {
        matches!(self, ModelError::Integrity { .. })
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Database(msg) => write!(f, "Database error: {}", msg),
            ModelError::NotFound(msg) => write!(f, "{}", msg),
            ModelError::Forbidden(msg) => write!(f, "{}", msg),
            ModelError::Conflict(msg) => write!(f, "{}", msg),
            ModelError::Integrity { constraint: Some(name), message } => {
                write!(f, "Integrity violation on '{}': {}", name, message)
            }
            ModelError::Integrity { constraint: None, message } => {
                write!(f, "Integrity violation: {}", message)
            }
            ModelError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ModelError::InvalidParams(msg) => write!(f, "Invalid parameters: {}", msg),
            ModelError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ModelError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ModelError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            ModelError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ModelError::Query(msg) => write!(f, "Query error: {}", msg),
            ModelError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

// Integrity violations keep the constraint name so the repository can classify them
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let is_integrity = db_err
                .code()
                .map(|code| code.starts_with(INTEGRITY_SQLSTATE_CLASS))
                .unwrap_or(false);

            if is_integrity {
                return ModelError::Integrity {
                    constraint: db_err.constraint().map(str::to_string),
                    message: db_err.message().to_string(),
                };
            }
        }

        ModelError::Database(err.to_string())
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

// Convert from anyhow errors
impl From<anyhow::Error> for ModelError {
    fn from(err: anyhow::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

/// Error types for statement rendering
#[derive(Debug, Clone)]
pub enum QueryError {
    /// Statement is missing a required part
    MissingFields(String),
    /// Value cannot be bound as a parameter
    InvalidParameter(String),
    /// Column does not exist on the entity
    UnknownColumn { entity: String, column: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::MissingFields(msg) => write!(f, "Missing fields: {}", msg),
            QueryError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            QueryError::UnknownColumn { entity, column } => {
                write!(f, "Unknown column '{}' on entity '{}'", column, entity)
            }
        }
    }
}

impl std::error::Error for QueryError {}

impl From<QueryError> for ModelError {
    fn from(err: QueryError) -> Self {
        ModelError::Query(err.to_string())
    }
}

/// Error types for relationship declarations
#[derive(Debug, Clone)]
pub enum RelationshipError {
    /// Entity referenced by a relationship was never declared
    UndeclaredEntity { relation: String, entity: String },
    /// Entity declared twice
    DuplicateEntity(String),
    /// Relation name declared twice on the same source
    DuplicateRelation { entity: String, relation: String },
    /// Join condition references a column the entity does not declare
    UnknownJoinColumn {
        relation: String,
        entity: String,
        column: String,
    },
    /// Declared inverse does not exist on the target entity
    MissingInverse { relation: String, inverse: String },
    /// Invalid relationship configuration
    InvalidConfiguration(String),
}

impl fmt::Display for RelationshipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipError::UndeclaredEntity { relation, entity } => write!(
                f,
                "Relationship '{}' references undeclared entity '{}'",
                relation, entity
            ),
            RelationshipError::DuplicateEntity(name) => {
                write!(f, "Entity '{}' is declared more than once", name)
            }
            RelationshipError::DuplicateRelation { entity, relation } => write!(
                f,
                "Relationship '{}' is declared more than once on '{}'",
                relation, entity
            ),
            RelationshipError::UnknownJoinColumn {
                relation,
                entity,
                column,
            } => write!(
                f,
                "Relationship '{}' joins on unknown column '{}.{}'",
                relation, entity, column
            ),
            RelationshipError::MissingInverse { relation, inverse } => write!(
                f,
                "Relationship '{}' declares inverse '{}' which does not exist",
                relation, inverse
            ),
            RelationshipError::InvalidConfiguration(msg) => {
                write!(f, "Invalid relationship configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for RelationshipError {}

impl From<RelationshipError> for ModelError {
    fn from(err: RelationshipError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_error_is_configuration() {
        let err: ModelError = RelationshipError::UndeclaredEntity {
            relation: "role".to_string(),
            entity: "Group".to_string(),
        }
        .into();

        assert!(matches!(err, ModelError::Configuration(_)));
        assert!(err.to_string().contains("undeclared entity 'Group'"));
    }

    #[test]
    fn test_domain_errors_display_message_only() {
        assert_eq!(ModelError::NotFound("Not found".into()).to_string(), "Not found");
        assert_eq!(
            ModelError::Conflict("login already in use".into()).to_string(),
            "login already in use"
        );
    }

    #[test]
    fn test_non_database_sqlx_error_maps_to_database() {
        let err: ModelError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ModelError::Database(_)));
        assert!(!err.is_integrity());
    }
}
