use shared::error::ApiException;
use thiserror::Error;

use crate::{
    ingest::{OverflowRejection, Rejection},
    orchestrator::OrchestratorState,
};

/// Itemized ingest rejections. Files that passed validation were still
/// uploaded; `committed` says how many.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationFailure {
    pub committed: usize,
    pub rejected: Vec<Rejection>,
    pub overflow: Option<OverflowRejection>,
}

impl ValidationFailure {
    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty() && self.overflow.is_none()
    }

    /// One line per rejection, overflow last.
    pub fn messages(&self) -> Vec<String> {
        let mut out: Vec<String> = self.rejected.iter().map(|r| r.to_string()).collect();
        if let Some(overflow) = &self.overflow {
            out.push(overflow.to_string());
        }
        out
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages().join(". "))
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("image validation failed: {0}")]
    Validation(ValidationFailure),
    #[error("cannot {operation} while {state:?}")]
    Precondition {
        operation: &'static str,
        state: OrchestratorState,
    },
    #[error("analysis failed: {message}")]
    TerminalAnalysis { message: String },
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("guide has no navigation steps")]
    EmptyGuide,
    #[error(transparent)]
    Service(anyhow::Error),
}

impl OrchestratorError {
    pub(crate) fn precondition(operation: &'static str, state: OrchestratorState) -> Self {
        OrchestratorError::Precondition { operation, state }
    }

    /// Maps a collaborator failure, promoting a 404 into `NotFound`.
    pub(crate) fn from_service(err: anyhow::Error, resource: impl Into<String>) -> Self {
        match err.downcast_ref::<ApiException>() {
            Some(api) if api.is_not_found() => OrchestratorError::NotFound {
                resource: resource.into(),
            },
            _ => OrchestratorError::Service(err),
        }
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_promoted_from_api_exception() {
        let err = anyhow::Error::new(ApiException::new(404, "Scan not found"));
        let mapped = OrchestratorError::from_service(err, "scan 1");
        assert!(matches!(mapped, OrchestratorError::NotFound { resource } if resource == "scan 1"));
    }

    #[test]
    fn other_failures_stay_service_errors() {
        let err = anyhow::Error::new(ApiException::new(500, "boom"));
        let mapped = OrchestratorError::from_service(err, "scan 1");
        assert!(matches!(mapped, OrchestratorError::Service(_)));
    }
}
