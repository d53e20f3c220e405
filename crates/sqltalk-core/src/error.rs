//! Error taxonomy for the query pipeline

use thiserror::Error;

/// Every way a request can fail. The pipeline stops at the first one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to list tables: {0}")]
    Introspection(String),

    #[error("Schema error for '{table}': {reason}")]
    Schema { table: String, reason: String },

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Execution error for `{sql}`: {reason}")]
    Execution { sql: String, reason: String },
}

impl PipelineError {
    /// Stable label for the stage that failed, used in logs and metrics
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::Connection(_) => "connection",
            PipelineError::Introspection(_) => "introspection",
            PipelineError::Schema { .. } => "schema",
            PipelineError::Generation(_) => "generation",
            PipelineError::Execution { .. } => "execution",
        }
    }
}
