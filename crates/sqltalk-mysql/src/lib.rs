//! MySQL backend for the sqltalk pipeline
//!
//! Opens one plain connection per request (no pool; nothing outlives the
//! request), introspects with `SHOW TABLES` / `DESCRIBE`, and runs the
//! generated statement inside a transaction over the text protocol so any
//! statement MySQL accepts can be executed.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column as _, Connection, Executor, Row as _, TypeInfo};
use sqltalk_core::{
    Column, ConnectionDescriptor, DatabaseConnector, DatabaseError, DatabaseSession,
    ExecutionOutcome, Row, StatementKind,
};
use tracing::debug;

/// Opens [`MySqlSession`]s from per-request credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Build driver options field by field so credentials never pass through a URL string
pub fn connect_options(descriptor: &ConnectionDescriptor) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&descriptor.host)
        .port(descriptor.port)
        .username(&descriptor.user)
        .password(&descriptor.password)
        .database(&descriptor.database)
}

#[async_trait]
impl DatabaseConnector for MySqlConnector {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn DatabaseSession>, DatabaseError> {
        let conn = MySqlConnection::connect_with(&connect_options(descriptor))
            .await
            .map_err(|e| DatabaseError::Connect {
                target: descriptor.display_target(),
                reason: e.to_string(),
            })?;

        debug!(db = %descriptor.display_target(), "MySQL connection opened");
        Ok(Box::new(MySqlSession { conn }))
    }
}

/// A single MySQL connection scoped to one request
pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl DatabaseSession for MySqlSession {
    async fn list_tables(&mut self) -> Result<Vec<String>, DatabaseError> {
        let rows = (&mut self.conn)
            .fetch_all(sqlx::raw_sql("SHOW TABLES"))
            .await
            .map_err(query_error)?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(name) = cell_text(row, 0).map_err(query_error)? {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    async fn describe_table(&mut self, table: &str) -> Result<Vec<Column>, DatabaseError> {
        let sql = format!("DESCRIBE {}", quote_identifier(table));
        let rows = (&mut self.conn)
            .fetch_all(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) => {
                    DatabaseError::UnknownTable(format!("{} ({})", table, db.message()))
                }
                other => query_error(other),
            })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            // Field, Type, Null, Key, Default, Extra
            let name = cell_text(row, 0).map_err(query_error)?.unwrap_or_default();
            let data_type = cell_text(row, 1).map_err(query_error)?.unwrap_or_default();
            columns.push(Column::new(name, data_type));
        }
        Ok(columns)
    }

    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
    ) -> Result<ExecutionOutcome, DatabaseError> {
        // dropping `tx` on an early return rolls it back
        let mut tx = self.conn.begin().await.map_err(query_error)?;

        let outcome = match kind {
            StatementKind::Read => {
                let rows = (&mut *tx)
                    .fetch_all(sqlx::raw_sql(sql))
                    .await
                    .map_err(query_error)?;
                let data = rows
                    .iter()
                    .map(row_to_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(query_error)?;
                ExecutionOutcome::Rows(data)
            }
            StatementKind::Write => {
                let done = (&mut *tx)
                    .execute(sqlx::raw_sql(sql))
                    .await
                    .map_err(query_error)?;
                ExecutionOutcome::Affected(done.rows_affected())
            }
        };

        tx.commit().await.map_err(query_error)?;
        Ok(outcome)
    }

    async fn close(self: Box<Self>) -> Result<(), DatabaseError> {
        self.conn.close().await.map_err(query_error)
    }
}

fn query_error(e: sqlx::Error) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Cell as text regardless of declared type (text protocol)
fn cell_text(row: &MySqlRow, idx: usize) -> Result<Option<String>, sqlx::Error> {
    let bytes: Option<Vec<u8>> = row.try_get_unchecked(idx)?;
    Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
}

/// Convert a result row to a column-ordered JSON object
fn row_to_json(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut object = Row::new();
    for column in row.columns() {
        let bytes: Option<Vec<u8>> = row.try_get_unchecked(column.ordinal())?;
        let value = match bytes {
            None => Value::Null,
            Some(bytes) => text_to_json(column.type_info().name(), &bytes),
        };
        object.insert(column.name().to_string(), value);
    }
    Ok(object)
}

/// Map a text-protocol cell to JSON based on the column's MySQL type name
///
/// Integers and floats become numbers, `JSON` columns are parsed, everything
/// else (DECIMAL, dates, strings) stays a string. Bytes that are not UTF-8
/// are summarised as `<blob N bytes>`.
pub fn text_to_json(type_name: &str, bytes: &[u8]) -> Value {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Value::String(format!("<blob {} bytes>", bytes.len()));
    };
    let as_string = || Value::String(text.to_string());
    let type_name = type_name.to_ascii_uppercase();
    let (base, unsigned) = match type_name.strip_suffix(" UNSIGNED") {
        Some(base) => (base, true),
        None => (type_name.as_str(), false),
    };

    match base {
        "BOOLEAN" => match text {
            "0" => Value::Bool(false),
            "1" => Value::Bool(true),
            _ => as_string(),
        },
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" if unsigned => {
            text.parse::<u64>().map(Value::from).unwrap_or_else(|_| as_string())
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            text.parse::<i64>().map(Value::from).unwrap_or_else(|_| as_string())
        }
        "FLOAT" | "DOUBLE" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(as_string),
        "JSON" => serde_json::from_str(text).unwrap_or_else(|_| as_string()),
        _ => as_string(),
    }
}
