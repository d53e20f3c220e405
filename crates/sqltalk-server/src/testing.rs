//! In-memory collaborators for handler and router tests

use async_trait::async_trait;
use serde_json::json;
use sqltalk_core::{
    Column, ConnectionDescriptor, DatabaseConnector, DatabaseError, DatabaseSession,
    ExecutionOutcome, GatewayError, LanguageModel, QueryPipeline, Row, StatementKind,
};
use std::sync::Arc;

use crate::http::AppState;
use crate::metrics::Metrics;

/// Serves a single `customers(id int)` table holding one row
pub struct StubConnector {
    pub refuse: bool,
}

#[async_trait]
impl DatabaseConnector for StubConnector {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, DatabaseError> {
        if self.refuse {
            return Err(DatabaseError::Connect {
                target: descriptor.display_target(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(Box::new(StubSession))
    }
}

struct StubSession;

#[async_trait]
impl DatabaseSession for StubSession {
    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError> {
        Ok(vec!["customers".to_string()])
    }

    async fn describe_table(&mut self, table: &str) -> Result<Vec<Column>, DatabaseError> {
        if table == "customers" {
            Ok(vec![Column::new("id", "int")])
        } else {
            Err(DatabaseError::UnknownTable(table.to_string()))
        }
    }

    async fn execute(
        &mut self,
        _sql: &str,
        kind: StatementKind,
    ) -> Result<ExecutionOutcome, DatabaseError> {
        match kind {
            StatementKind::Read => {
                let mut row = Row::new();
                row.insert("id".to_string(), json!(1));
                Ok(ExecutionOutcome::Rows(vec![row]))
            }
            StatementKind::Write => Ok(ExecutionOutcome::Affected(1)),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Names `custmers` on extraction and answers with a fixed SELECT
pub struct StubModel;

#[async_trait]
impl LanguageModel for StubModel {
    async fn complete(&self, system: &str, _user: &str) -> Result<String, GatewayError> {
        if system.starts_with("Extract table names") {
            Ok("custmers".to_string())
        } else {
            Ok("```sql\nSELECT id FROM customers;\n```".to_string())
        }
    }
}

pub fn state(refuse: bool) -> AppState {
    let pipeline = QueryPipeline::new(Arc::new(StubConnector { refuse }), Arc::new(StubModel));
    AppState::new(pipeline, Metrics::new().unwrap())
}
