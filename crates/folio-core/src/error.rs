//! Domain-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Domain errors - business logic failures.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Entity not found: {entity_type} {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    /// The denormalized favorite counter disagrees with the edge set.
    #[error("Favorite count of post {post_id} is {counter} but {edges} edges exist")]
    ConsistencyViolation {
        post_id: Uuid,
        counter: i64,
        edges: u64,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] RepoError),
}

impl DomainError {
    pub fn post_not_found(slug: &str) -> Self {
        Self::NotFound {
            entity_type: "post",
            key: slug.to_string(),
        }
    }

    pub fn user_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: "user",
            key: key.to_string(),
        }
    }
}

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    /// Unique key violation.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A referenced row does not exist.
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),
}
