//! SQL execution tools.
//!
//! Thin bridge between the MCP tool surface and the gateway: inputs are
//! deserialized tool parameters, outputs are the JSON report shapes callers
//! see. Single statements and batches both come through here; so does
//! `list_databases`, which is just a read against `information_schema`.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::db::session::{Connector, JsonRow};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::models::{QueryOutcome, QueryReport, QueryRequest};
use crate::tools::batch::parse_batch;

/// Input for the run_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSqlInput {
    /// Target database name. Required; every request names its own database.
    pub database: String,
    /// SQL statement to execute. SELECT/SHOW/DESCRIBE/EXPLAIN/WITH return
    /// rows; everything else runs in a transaction and reports affected rows.
    pub sql: String,
}

/// Input for the run_sql_batch tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSqlBatchInput {
    /// Queries as 'database:sql' pairs separated by ';',
    /// e.g. "db1:SELECT * FROM users; db2:SELECT COUNT(*) FROM orders"
    pub queries: String,
}

/// Output from the run_sql_batch tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RunSqlBatchOutput {
    /// Per-query reports, in the same order as the input pairs.
    pub results: Vec<QueryReport>,
    /// Number of queries executed.
    pub count: usize,
}

/// Output from the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    /// Database names visible to the configured account.
    pub databases: Vec<String>,
    /// Number of databases.
    pub count: usize,
}

/// Handler bridging MCP tool calls to the gateway.
pub struct SqlToolHandler<C: Connector> {
    gateway: Arc<Gateway<C>>,
}

impl<C: Connector> SqlToolHandler<C> {
    pub fn new(gateway: Arc<Gateway<C>>) -> Self {
        Self { gateway }
    }

    /// Execute one statement. Always returns a report; failures are folded
    /// into an error-status report rather than raised.
    pub async fn run_sql(&self, input: RunSqlInput) -> QueryReport {
        info!(database = %input.database, "Executing statement");
        let request = QueryRequest::new(input.database, input.sql);
        self.gateway.run(request).await.into_report()
    }

    /// Parse and execute a batch. A malformed batch string is the one
    /// failure that raises instead of producing reports: nothing has been
    /// executed yet at that point.
    pub async fn run_sql_batch(&self, input: RunSqlBatchInput) -> GatewayResult<RunSqlBatchOutput> {
        let requests = parse_batch(&input.queries)?;
        info!(count = requests.len(), "Executing batch");

        let outcomes = self.gateway.run_batch(requests).await;
        let results: Vec<QueryReport> = outcomes
            .into_iter()
            .map(|outcome| outcome.into_report())
            .collect();
        let count = results.len();
        Ok(RunSqlBatchOutput { results, count })
    }

    /// List the databases visible on the server.
    pub async fn list_databases(&self) -> GatewayResult<ListDatabasesOutput> {
        let request = QueryRequest::new(
            "information_schema",
            "SELECT schema_name FROM information_schema.schemata ORDER BY schema_name",
        );

        match self.gateway.run(request).await {
            QueryOutcome::Read { rows, .. } => {
                let databases = database_names_from_rows(&rows);
                let count = databases.len();
                Ok(ListDatabasesOutput { databases, count })
            }
            QueryOutcome::Error { message, .. } => Err(GatewayError::connection(message)),
            QueryOutcome::Write { .. } => Err(GatewayError::internal(
                "Catalog query unexpectedly classified as a write",
            )),
        }
    }
}

/// Pull the schema names out of catalog rows, tolerating either column case.
fn database_names_from_rows(rows: &[JsonRow]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            row.get("schema_name")
                .or_else(|| row.get("SCHEMA_NAME"))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .collect()
}
