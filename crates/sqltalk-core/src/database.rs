//! Database access capability
//!
//! A backend opens one [`DatabaseSession`] per request from a
//! [`ConnectionDescriptor`]. The session lists tables, describes them, and
//! runs the generated statement inside its own transaction.

use async_trait::async_trait;
use thiserror::Error;

use crate::connection::ConnectionDescriptor;
use crate::schema::Column;

/// One result row. Key order follows the result set's column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("cannot connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("unknown or inaccessible table: {0}")]
    UnknownTable(String),

    #[error("{0}")]
    Query(String),
}

/// How the generated statement is run and reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows
    Read,
    /// Returns an affected-row count
    Write,
}

impl StatementKind {
    /// Read iff the trimmed text starts with `select`, any case
    pub fn classify(sql: &str) -> Self {
        let head = sql.trim_start();
        match head.get(..6) {
            Some(prefix) if prefix.eq_ignore_ascii_case("select") => StatementKind::Read,
            _ => StatementKind::Write,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Rows(Vec<Row>),
    Affected(u64),
}

/// Opens sessions against a target database
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, DatabaseError>;
}

/// A live handle scoped to one request
///
/// Callers must invoke [`close`](DatabaseSession::close) once they are done,
/// whatever the outcome of the other calls.
#[async_trait]
pub trait DatabaseSession: Send {
    /// Real table names, in catalog order
    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError>;

    /// Column name/type pairs for `table`, in ordinal order
    async fn describe_table(&mut self, table: &str) -> Result<Vec<Column>, DatabaseError>;

    /// Run `sql` once in its own transaction, committing on success
    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<ExecutionOutcome, DatabaseError>;

    /// Release the underlying connection
    async fn close(self: Box<Self>) -> Result<(), DatabaseError>;
}
