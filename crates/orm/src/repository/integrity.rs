//! Translation of constraint violations into domain conflicts

use crate::error::ModelError;

/// Maps integrity violations on declared unique columns to [`ModelError::Conflict`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityTranslator {
    uniques: Vec<String>,
}

impl IntegrityTranslator {
    pub fn new<I, S>(uniques: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uniques: uniques.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_unique(mut self, column: impl Into<String>) -> Self {
        self.uniques.push(column.into());
        self
    }

    pub fn uniques(&self) -> &[String] {
        &self.uniques
    }

    /// Translate `error`; anything other than an integrity violation passes through
    pub fn translate(&self, error: ModelError) -> ModelError {
        match error {
            ModelError::Integrity { constraint, message } => {
                let matched = self.uniques.iter().find(|unique| {
                    constraint.as_deref().is_some_and(|name| name.contains(unique.as_str()))
                        || message.contains(unique.as_str())
                });

                match matched {
                    Some(unique) => ModelError::Conflict(format!("{} already in use", unique)),
                    None => {
                        tracing::warn!(?constraint, %message, "unclassified integrity violation");
                        ModelError::Database("unclassified integrity violation".to_string())
                    }
                }
            }
            other => other,
        }
    }
}
