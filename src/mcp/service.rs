//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct exposing the SQL execution
//! tools via the MCP protocol using the rmcp framework's macros.

use crate::db::MySqlConnector;
use crate::gateway::Gateway;
use crate::models::QueryReport;
use crate::tools::query::{
    ListDatabasesOutput, RunSqlBatchInput, RunSqlBatchOutput, RunSqlInput, SqlToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayService {
    /// Shared gateway for all SQL execution
    gateway: Arc<Gateway<MySqlConnector>>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    /// Create a new GatewayService over a shared gateway.
    pub fn new(gateway: Arc<Gateway<MySqlConnector>>) -> Self {
        Self {
            gateway,
            tool_router: Self::tool_router(),
        }
    }

    fn handler(&self) -> SqlToolHandler<MySqlConnector> {
        SqlToolHandler::new(self.gateway.clone())
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Execute a SQL statement against a named database.\nSELECT/SHOW/DESCRIBE/EXPLAIN/WITH statements return rows; everything else runs inside a transaction and reports affected rows.\nFailures are reported in the result (status: \"error\"), never as a protocol error."
    )]
    async fn run_sql(&self, Parameters(input): Parameters<RunSqlInput>) -> Json<QueryReport> {
        Json(self.handler().run_sql(input).await)
    }

    #[tool(
        description = "Execute multiple SQL statements concurrently, each against its own database.\nFormat: 'database:sql' pairs separated by ';', e.g. \"db1:SELECT * FROM users; db2:SELECT COUNT(*) FROM orders\".\nResults are returned in input order. A malformed pair fails the whole batch before anything executes."
    )]
    async fn run_sql_batch(
        &self,
        Parameters(input): Parameters<RunSqlBatchInput>,
    ) -> Result<Json<RunSqlBatchOutput>, McpError> {
        self.handler()
            .run_sql_batch(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "List all databases visible on the MySQL server.")]
    async fn list_databases(&self) -> Result<Json<ListDatabasesOutput>, McpError> {
        self.handler()
            .list_databases()
            .await
            .map(Json)
            .map_err(McpError::from)
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mysql-gateway-mcp".to_owned(),
                title: Some("MySQL Gateway MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SQL execution tools for a MySQL server with multiple databases.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to see which databases exist\n\
                2. Call `run_sql` with a `database` and a `sql` statement\n\
                3. For cross-database work, use `run_sql_batch` with 'database:sql' pairs\n\
                \n\
                ## Behavior\n\
                - Every call names its target database; there is no session default\n\
                - Reads (SELECT/SHOW/DESCRIBE/EXPLAIN/WITH) return `data` and `row_count`\n\
                - Writes run in a transaction and return `affected_rows`; failed writes\n\
                  are rolled back automatically\n\
                - Batch items run concurrently but results keep input order\n\
                \n\
                ## Errors\n\
                Per-statement failures come back in the result with status \"error\",\n\
                the failure message, and the offending query echoed back."
                    .to_string(),
            ),
        }
    }
}
