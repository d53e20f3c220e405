//! Tests against a real MySQL server
//!
//! Skipped unless `SQLTALK_TEST_MYSQL_HOST` is set. Other variables:
//! `SQLTALK_TEST_MYSQL_PORT` (3306), `SQLTALK_TEST_MYSQL_USER` (root),
//! `SQLTALK_TEST_MYSQL_PASSWORD` (empty), `SQLTALK_TEST_MYSQL_DATABASE` (test).
//!
//! ```bash
//! docker run -d -p 3306:3306 -e MYSQL_ALLOW_EMPTY_PASSWORD=yes -e MYSQL_DATABASE=test mysql:8
//! SQLTALK_TEST_MYSQL_HOST=127.0.0.1 cargo test -p sqltalk-mysql --test mysql_live
//! ```

use async_trait::async_trait;
use serde_json::json;
use sqltalk_core::{
    ConnectionDescriptor, DatabaseConnector, DatabaseSession, ExecutionOutcome, GatewayError,
    LanguageModel, QueryPipeline, QueryResult, StatementKind,
};
use sqltalk_mysql::MySqlConnector;
use std::sync::Arc;

fn live_descriptor() -> Option<ConnectionDescriptor> {
    let host = std::env::var("SQLTALK_TEST_MYSQL_HOST").ok()?;
    let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());

    Some(ConnectionDescriptor::new(
        host,
        var("SQLTALK_TEST_MYSQL_PORT", "3306").parse().unwrap_or(3306),
        var("SQLTALK_TEST_MYSQL_USER", "root"),
        var("SQLTALK_TEST_MYSQL_PASSWORD", ""),
        var("SQLTALK_TEST_MYSQL_DATABASE", "test"),
    ))
}

macro_rules! require_mysql {
    () => {
        match live_descriptor() {
            Some(d) => d,
            None => {
                println!("⚠️  Skipping: SQLTALK_TEST_MYSQL_HOST not set");
                return;
            }
        }
    };
}

/// Table name unique to this test process so parallel runs don't collide
fn scratch_table(suffix: &str) -> String {
    format!("sqltalk_{}_{}", suffix, std::process::id())
}

async fn setup(session: &mut dyn DatabaseSession, table: &str) {
    session
        .execute(&format!("DROP TABLE IF EXISTS `{}`", table), StatementKind::Write)
        .await
        .unwrap();
    session
        .execute(
            &format!(
                "CREATE TABLE `{}` (id INT PRIMARY KEY, name VARCHAR(64), balance DECIMAL(10,2))",
                table
            ),
            StatementKind::Write,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_introspection_and_execution() {
    let descriptor = require_mysql!();
    let table = scratch_table("customers");

    let mut session = MySqlConnector::new().open(&descriptor).await.unwrap();
    setup(session.as_mut(), &table).await;

    let tables = session.list_tables().await.unwrap();
    assert!(tables.contains(&table), "{:?}", tables);

    let columns = session.describe_table(&table).await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "balance"]);
    assert_eq!(columns[0].data_type, "int");
    assert_eq!(columns[1].data_type, "varchar(64)");

    let inserted = session
        .execute(
            &format!("INSERT INTO `{}` VALUES (1, 'Alice', 10.50), (2, 'Bob', NULL)", table),
            StatementKind::Write,
        )
        .await
        .unwrap();
    assert_eq!(inserted, ExecutionOutcome::Affected(2));

    let selected = session
        .execute(
            &format!("SELECT name, id, balance FROM `{}` ORDER BY id", table),
            StatementKind::Read,
        )
        .await
        .unwrap();
    let ExecutionOutcome::Rows(rows) = selected else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);
    let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "id", "balance"]);
    assert_eq!(rows[0]["id"], json!(1));
    assert_eq!(rows[0]["balance"], json!("10.50"));
    assert_eq!(rows[1]["balance"], json!(null));

    session
        .execute(&format!("DROP TABLE `{}`", table), StatementKind::Write)
        .await
        .unwrap();
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_describe_unknown_table() {
    let descriptor = require_mysql!();

    let mut session = MySqlConnector::new().open(&descriptor).await.unwrap();
    let err = session
        .describe_table("sqltalk_no_such_table")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("sqltalk_no_such_table"), "{}", err);
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_statement_is_rolled_back() {
    let descriptor = require_mysql!();
    let table = scratch_table("rollback");

    let mut session = MySqlConnector::new().open(&descriptor).await.unwrap();
    setup(session.as_mut(), &table).await;

    // second row violates the primary key; the first must not survive
    let result = session
        .execute(
            &format!("INSERT INTO `{}` VALUES (1, 'a', 0), (1, 'b', 0)", table),
            StatementKind::Write,
        )
        .await;
    assert!(result.is_err());

    let count = session
        .execute(&format!("SELECT COUNT(*) AS n FROM `{}`", table), StatementKind::Read)
        .await
        .unwrap();
    let ExecutionOutcome::Rows(rows) = count else {
        panic!("expected rows");
    };
    assert_eq!(rows[0]["n"], json!(0));

    session
        .execute(&format!("DROP TABLE `{}`", table), StatementKind::Write)
        .await
        .unwrap();
    session.close().await.unwrap();
}

struct FixedModel {
    tables: String,
    sql: String,
}

#[async_trait]
impl LanguageModel for FixedModel {
    async fn complete(&self, system: &str, _user: &str) -> Result<String, GatewayError> {
        if system.starts_with("Extract table names") {
            Ok(self.tables.clone())
        } else {
            Ok(self.sql.clone())
        }
    }
}

#[tokio::test]
async fn test_pipeline_end_to_end() {
    let descriptor = require_mysql!();
    let table = scratch_table("people");

    let mut session = MySqlConnector::new().open(&descriptor).await.unwrap();
    setup(session.as_mut(), &table).await;
    session
        .execute(&format!("INSERT INTO `{}` VALUES (1, 'Alice', 1.00)", table), StatementKind::Write)
        .await
        .unwrap();

    // misspell the table so resolution has to correct it
    let typo = table.replacen("people", "peple", 1);
    let model = FixedModel {
        tables: typo,
        sql: format!("SELECT id, name FROM `{}`", table),
    };
    let pipeline = QueryPipeline::new(Arc::new(MySqlConnector::new()), Arc::new(model));

    let result = pipeline.handle_query("list everyone", Some(&descriptor)).await;
    match &result {
        QueryResult::Success(_) => {
            assert_eq!(
                serde_json::to_value(&result).unwrap()["data"],
                json!([{"id": 1, "name": "Alice"}])
            );
        }
        QueryResult::Failure { error } => panic!("pipeline failed: {}", error),
    }

    session
        .execute(&format!("DROP TABLE `{}`", table), StatementKind::Write)
        .await
        .unwrap();
    session.close().await.unwrap();
}
