use thiserror::Error;

use cardissue_core::DomainError;
use cardissue_vault::VaultError;

use crate::store::StoreError;

/// Error class surfaced to workflow callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    InvalidState,
    TransientDependencyFailure,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Storage, vault or transport unavailable. Not retried by the workflow.
    #[error("dependency failure: {0}")]
    TransientDependencyFailure(String),
}

impl WorkflowError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::InvalidState(_) => ErrorKind::InvalidState,
            WorkflowError::TransientDependencyFailure(_) => ErrorKind::TransientDependencyFailure,
        }
    }

    /// Caused by the request itself; retrying it unchanged cannot succeed.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, WorkflowError::TransientDependencyFailure(_))
    }
}

impl From<DomainError> for WorkflowError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidArgument(m) | DomainError::InvalidId(m) => Self::InvalidArgument(m),
            DomainError::InvalidState(m) => Self::InvalidState(m),
            DomainError::NotFound(m) => Self::NotFound(m),
        }
    }
}

impl From<StoreError> for WorkflowError {
    fn from(e: StoreError) -> Self {
        match e {
            // Another writer moved the card first.
            StoreError::Conflict(m) => Self::InvalidState(m),
            other => Self::TransientDependencyFailure(other.to_string()),
        }
    }
}

impl From<VaultError> for WorkflowError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::InvalidArgument(m) => Self::InvalidArgument(m),
            other => Self::TransientDependencyFailure(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::TransientDependencyFailure(format!("event serialization failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_lower_layers_onto_the_taxonomy() {
        assert_eq!(
            WorkflowError::from(DomainError::invalid_state("x")).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            WorkflowError::from(DomainError::invalid_id("x")).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            WorkflowError::from(StoreError::Unavailable("db down".into())).kind(),
            ErrorKind::TransientDependencyFailure
        );
        assert_eq!(
            WorkflowError::from(StoreError::Conflict("v2".into())).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            WorkflowError::from(VaultError::Unavailable("hsm".into())).kind(),
            ErrorKind::TransientDependencyFailure
        );
    }

    #[test]
    fn only_transient_failures_are_server_side() {
        assert!(WorkflowError::NotFound("c".into()).is_client_error());
        assert!(WorkflowError::invalid_argument("c").is_client_error());
        assert!(!WorkflowError::TransientDependencyFailure("c".into()).is_client_error());
    }
}
