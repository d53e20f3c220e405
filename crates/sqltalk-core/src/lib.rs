//! sqltalk - natural language questions answered with SQL
//!
//! Turns a prompt plus per-request database credentials into a single SQL
//! statement, runs it, and returns the rows (or the affected-row count).
//!
//! The crate holds the resolution pipeline only. Database drivers and
//! language-model vendors plug in through [`DatabaseConnector`] and
//! [`LanguageModel`].

pub mod connection;
pub mod database;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod resolver;
pub mod result;
pub mod schema;

pub use connection::{ConnectionDescriptor, ConnectionParams};
pub use database::{DatabaseConnector, DatabaseError, DatabaseSession, ExecutionOutcome, Row, StatementKind};
pub use error::PipelineError;
pub use gateway::{GatewayError, LanguageModel};
pub use pipeline::{PipelineOptions, QueryPipeline, QueryRequest};
pub use resolver::{Resolution, TableResolver, DEFAULT_MATCH_THRESHOLD};
pub use result::{QueryOutput, QueryPayload, QueryResult};
pub use schema::{Column, TableSchema};
