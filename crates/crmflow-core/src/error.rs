// Error types for workflow automation
//
// Errors are bucketed so the HTTP layer can map them without inspecting messages:
// - Unauthorized / Forbidden / NotFound: lookup and ownership failures
// - BusinessRule: request is valid but violates a rule (editing a running campaign, ...)
// - Channel: outbound SMS/email failure (normally recorded on the row, not propagated)
// - Store / Internal: unexpected failures

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for crmflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the workflow engine, dispatcher and campaign service
#[derive(Debug, Error)]
pub enum Error {
    /// No authenticated user
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated user does not own the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Business rule violation, surfaced to callers as a readable message
    #[error("{0}")]
    BusinessRule(String),

    /// Outbound channel (SMS/email) failure
    #[error("Channel error: {0}")]
    Channel(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse error classification used by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    BusinessRule,
    Channel,
    Internal,
}

impl Error {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Error::NotFound { entity, id }
    }

    pub fn rule(msg: impl Into<String>) -> Self {
        Error::BusinessRule(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Error::Channel(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::BusinessRule(_) => ErrorKind::BusinessRule,
            Error::Channel(_) => ErrorKind::Channel,
            Error::Store(_) | Error::Serialization(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let id = Uuid::nil();
        let err = Error::not_found("Workflow template", id);
        assert_eq!(
            err.to_string(),
            format!("Workflow template not found: {}", id)
        );
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_business_rule_message_is_verbatim() {
        let err = Error::rule("Campaign is already running");
        assert_eq!(err.to_string(), "Campaign is already running");
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
    }

    #[test]
    fn test_store_errors_are_internal() {
        assert_eq!(Error::store("connection reset").kind(), ErrorKind::Internal);
        let err: Error = anyhow::anyhow!("boom").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
