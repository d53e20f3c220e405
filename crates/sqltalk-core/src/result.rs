//! Response shapes
//!
//! Serialized exactly as the transport returns them:
//! `{"sql", "data"}` for reads, `{"sql", "message"}` for writes and
//! `{"error"}` for any failure.

use serde::Serialize;

use crate::database::Row;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryPayload {
    Data {
        data: Vec<Row>,
    },
    Message {
        message: String,
        #[serde(skip)]
        rows_affected: u64,
    },
}

impl QueryPayload {
    pub fn rows(data: Vec<Row>) -> Self {
        QueryPayload::Data { data }
    }

    pub fn affected(rows_affected: u64) -> Self {
        QueryPayload::Message {
            message: format!("{} rows affected.", rows_affected),
            rows_affected,
        }
    }
}

/// A successful run: the SQL that was executed and what it produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutput {
    pub sql: String,
    #[serde(flatten)]
    pub payload: QueryPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Success(QueryOutput),
    Failure { error: String },
}

impl QueryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, QueryResult::Success(_))
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            QueryResult::Success(output) => Some(&output.sql),
            QueryResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryResult::Success(_) => None,
            QueryResult::Failure { error } => Some(error),
        }
    }
}

impl From<Result<QueryOutput, PipelineError>> for QueryResult {
    fn from(result: Result<QueryOutput, PipelineError>) -> Self {
        match result {
            Ok(output) => QueryResult::Success(output),
            Err(err) => QueryResult::Failure {
                error: err.to_string(),
            },
        }
    }
}
