//! Deferred-error result wrapper returned by repository operations

use crate::error::{ModelError, ModelResult};

/// Operation a [`RepoResult`] came from; picks the error raised on absence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Create,
    Select,
    Update,
    Delete,
    Exists,
}

impl Category {
    /// Error reported when a value of this category is demanded but absent
    pub fn absence_error(self) -> ModelError {
        match self {
            Category::Create => ModelError::Forbidden("Cannot be created".to_string()),
            Category::Update => ModelError::Forbidden("Cannot be updated".to_string()),
            Category::Delete => ModelError::Forbidden("Cannot be deleted".to_string()),
            Category::Select | Category::Exists => ModelError::NotFound("Not found".to_string()),
        }
    }
}

/// Optional value that only turns into an error when the caller requires it
#[derive(Debug, Clone, PartialEq)]
pub enum RepoResult<T> {
    Present(T),
    Absent(Category),
}

impl<T> RepoResult<T> {
    pub fn new(value: Option<T>, category: Category) -> Self {
        match value {
            Some(value) => RepoResult::Present(value),
            None => RepoResult::Absent(category),
        }
    }

    /// The value, or the error mapped to the operation's category
    pub fn result(self) -> ModelResult<T> {
        match self {
            RepoResult::Present(value) => Ok(value),
            RepoResult::Absent(category) => Err(category.absence_error()),
        }
    }

    pub fn result_or_none(self) -> Option<T> {
        match self {
            RepoResult::Present(value) => Some(value),
            RepoResult::Absent(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, RepoResult::Present(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RepoResult<U> {
        match self {
            RepoResult::Present(value) => RepoResult::Present(f(value)),
            RepoResult::Absent(category) => RepoResult::Absent(category),
        }
    }
}
