//! Query synthesis pipeline
//!
//! One request flows straight through:
//!
//! 1. validate the prompt and connection
//! 2. open a session on the target database
//! 3. list the real tables
//! 4. ask the model which tables the prompt mentions
//! 5. fuzzy-correct those names against the real tables
//! 6. describe each resolved table
//! 7. render the schema context
//! 8. ask the model for one SQL statement
//! 9. classify it as read or write
//! 10. execute it and shape the response
//!
//! The first failure ends the request. The session is closed on every path.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionDescriptor, ConnectionParams};
use crate::database::{DatabaseConnector, DatabaseSession, ExecutionOutcome, StatementKind};
use crate::error::PipelineError;
use crate::gateway::{self, LanguageModel};
use crate::resolver::TableResolver;
use crate::result::{QueryOutput, QueryPayload, QueryResult};
use crate::schema::{self, TableSchema};

const MISSING_INPUT: &str = "Prompt or DB connection details missing.";

/// Request body as received from the transport
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub connection: Option<ConnectionParams>,
}

impl QueryRequest {
    /// Validate into a prompt and a typed descriptor
    pub fn into_parts(self) -> Result<(String, ConnectionDescriptor), PipelineError> {
        let connection = match self.connection {
            Some(params) if !params.is_empty() => params,
            _ => return Err(PipelineError::InvalidRequest(MISSING_INPUT.to_string())),
        };
        if self.prompt.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(MISSING_INPUT.to_string()));
        }

        let descriptor = ConnectionDescriptor::try_from(connection)?;
        Ok((self.prompt, descriptor))
    }
}

/// Behaviour switches injected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Describe each resolved table once, keeping first-seen order
    pub dedupe_tables: bool,
    /// Fail before introspection when a resolved name is not in the catalog
    pub strict_tables: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            dedupe_tables: true,
            strict_tables: false,
        }
    }
}

/// Turns a prompt and a connection into executed SQL
///
/// Holds no per-request state; one instance serves any number of
/// concurrent requests.
#[derive(Clone)]
pub struct QueryPipeline {
    connector: Arc<dyn DatabaseConnector>,
    model: Arc<dyn LanguageModel>,
    resolver: TableResolver,
    options: PipelineOptions,
}

impl QueryPipeline {
    pub fn new(connector: Arc<dyn DatabaseConnector>, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            connector,
            model,
            resolver: TableResolver::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: TableResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &TableResolver {
        &self.resolver
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Validate a raw request and run it, folding any error into the result
    pub async fn handle_request(&self, request: QueryRequest) -> QueryResult {
        self.run_request(request).await.into()
    }

    pub async fn run_request(&self, request: QueryRequest) -> Result<QueryOutput, PipelineError> {
        let (prompt, descriptor) = request.into_parts().map_err(|e| {
            warn!(stage = e.stage(), error = %e, "Rejected query request");
            e
        })?;
        self.run(&prompt, Some(&descriptor)).await
    }

    /// Answer `prompt` against the database behind `connection`
    pub async fn handle_query(
        &self,
        prompt: &str,
        connection: Option<&ConnectionDescriptor>,
    ) -> QueryResult {
        self.run(prompt, connection).await.into()
    }

    /// Same as [`handle_query`](Self::handle_query) but keeps the typed error
    pub async fn run(
        &self,
        prompt: &str,
        connection: Option<&ConnectionDescriptor>,
    ) -> Result<QueryOutput, PipelineError> {
        let descriptor = match connection {
            Some(d) if !prompt.trim().is_empty() => d,
            _ => return Err(PipelineError::InvalidRequest(MISSING_INPUT.to_string())),
        };

        let target = descriptor.display_target();
        debug!(db = %target, "Opening database session");

        let mut session = match self.connector.open(descriptor).await {
            Ok(session) => session,
            Err(e) => {
                let err = PipelineError::Connection(e.to_string());
                warn!(stage = err.stage(), db = %target, error = %err, "Query pipeline failed");
                return Err(err);
            }
        };

        let result = self.run_in_session(session.as_mut(), prompt).await;

        if let Err(e) = session.close().await {
            warn!(db = %target, "Failed to close database session: {}", e);
        }

        match &result {
            Ok(output) => match &output.payload {
                QueryPayload::Data { data } => {
                    info!(db = %target, rows = data.len(), "Query answered");
                }
                QueryPayload::Message { rows_affected, .. } => {
                    info!(db = %target, rows_affected = *rows_affected, "Statement executed");
                }
            },
            Err(e) => warn!(stage = e.stage(), db = %target, error = %e, "Query pipeline failed"),
        }

        result
    }

    async fn run_in_session(
        &self,
        session: &mut dyn DatabaseSession,
        prompt: &str,
    ) -> Result<QueryOutput, PipelineError> {
        let catalog = session
            .list_tables()
            .await
            .map_err(|e| PipelineError::Introspection(e.to_string()))?;
        debug!(tables = catalog.len(), "Catalog loaded");

        let candidates = self.extract_tables(prompt).await?;
        let resolved = self.resolve_tables(&candidates, &catalog)?;

        let mut schemas = Vec::with_capacity(resolved.len());
        for table in &resolved {
            schemas.push(describe(&mut *session, table).await?);
        }

        let context = schema::render_context(&schemas);
        debug!("Schema context:\n{}", context);

        let sql = self.synthesize(prompt, &context).await?;
        let kind = StatementKind::classify(&sql);
        info!(kind = ?kind, "Generated SQL: {}", sql);

        let outcome = session
            .execute(&sql, kind)
            .await
            .map_err(|e| PipelineError::Execution {
                sql: sql.clone(),
                reason: e.to_string(),
            })?;

        let payload = match outcome {
            ExecutionOutcome::Rows(rows) => QueryPayload::rows(rows),
            ExecutionOutcome::Affected(n) => QueryPayload::affected(n),
        };

        Ok(QueryOutput { sql, payload })
    }

    async fn extract_tables(&self, prompt: &str) -> Result<Vec<String>, PipelineError> {
        let reply = self
            .model
            .complete(gateway::EXTRACTION_PROMPT, prompt)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let tables = gateway::parse_table_list(&reply);
        debug!(raw = %reply.trim(), extracted = ?tables, "Extracted table names");

        if tables.is_empty() {
            return Err(PipelineError::Generation(
                "model returned no table names for the prompt".to_string(),
            ));
        }
        Ok(tables)
    }

    fn resolve_tables(
        &self,
        candidates: &[String],
        catalog: &[String],
    ) -> Result<Vec<String>, PipelineError> {
        let mut resolved: Vec<String> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let resolution = self.resolver.resolve_detailed(candidate, catalog);
            if resolution.was_corrected() {
                debug!(
                    raw = %resolution.raw,
                    corrected = %resolution.corrected,
                    confidence = resolution.confidence,
                    "Corrected table name"
                );
            }

            if self.options.strict_tables && !catalog.contains(&resolution.corrected) {
                return Err(PipelineError::Schema {
                    table: resolution.corrected,
                    reason: "no matching table in the database".to_string(),
                });
            }

            if self.options.dedupe_tables && resolved.contains(&resolution.corrected) {
                continue;
            }
            resolved.push(resolution.corrected);
        }

        Ok(resolved)
    }

    async fn synthesize(&self, prompt: &str, context: &str) -> Result<String, PipelineError> {
        let reply = self
            .model
            .complete(&gateway::synthesis_prompt(context), prompt)
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let sql = gateway::clean_sql(&reply);
        if sql.is_empty() {
            return Err(PipelineError::Generation(
                "model returned an empty SQL statement".to_string(),
            ));
        }
        Ok(sql)
    }
}

async fn describe(session: &mut dyn DatabaseSession, table: &str) -> Result<TableSchema, PipelineError> {
    let schema_error = |reason: String| PipelineError::Schema {
        table: table.to_string(),
        reason,
    };

    let columns = session
        .describe_table(table)
        .await
        .map_err(|e| schema_error(e.to_string()))?;

    if columns.is_empty() {
        return Err(schema_error("unknown or inaccessible table".to_string()));
    }

    Ok(TableSchema::new(table, columns))
}
