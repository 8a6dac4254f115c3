//! Error types for the requirement evaluation subsystem.

use crate::db::{RepositoryError, RequirementId};
use thiserror::Error;

/// Errors that can occur while evaluating a plan.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A plan or plan degree referenced by the caller does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A requirement is stored in a shape the engine cannot score
    #[error("Requirement {requirement_id} is misconfigured: {message}")]
    Configuration {
        requirement_id: RequirementId,
        message: String,
    },

    /// The backing store failed
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl EvaluationError {
    pub(crate) fn configuration(requirement_id: RequirementId, message: impl Into<String>) -> Self {
        EvaluationError::Configuration {
            requirement_id,
            message: message.into(),
        }
    }

    /// Returns true if the error is about the request rather than the data or store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EvaluationError::NotFound { .. })
    }

    /// Returns true if a requirement rule itself is broken.
    pub fn is_configuration(&self) -> bool {
        matches!(self, EvaluationError::Configuration { .. })
    }
}
