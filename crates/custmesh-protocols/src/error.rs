//! Error types for the custmesh protocol layer.

use thiserror::Error;

use crate::workflow::Operation;

/// Errors raised by agent task handlers.
///
/// These propagate out of `execute_task`; the engine converts them into
/// task and workflow failure states. `process_message` never lets them
/// escape - it folds them into a `success=false` response.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(Operation),

    #[error("Customer store session not set")]
    NoSession,

    #[error("Customer {0} not found")]
    CustomerNotFound(String),

    #[error("Customer ID is required for {0}")]
    MissingTarget(Operation),

    #[error("No update data provided")]
    EmptyUpdate,

    #[error("Field {field} cannot be coerced: {message}")]
    Coercion { field: String, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Customer {0} not found")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_unknown_action() {
        let err = AgentError::UnknownAction("reticulate".to_string());
        assert!(err.to_string().contains("Unknown action"));
        assert!(err.to_string().contains("reticulate"));
    }

    #[test]
    fn test_agent_error_no_session() {
        let err = AgentError::NoSession;
        assert!(err.to_string().contains("session not set"));
    }

    #[test]
    fn test_agent_error_from_store() {
        let err: AgentError = StoreError::Query("disk full".to_string()).into();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_store_error_not_found() {
        let err = StoreError::NotFound("CUST001".to_string());
        assert!(err.to_string().contains("CUST001"));
    }
}
