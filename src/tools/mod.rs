//! MCP tool implementations.

pub mod batch;
pub mod query;

pub use batch::parse_batch;
pub use query::{
    ListDatabasesOutput, RunSqlBatchInput, RunSqlBatchOutput, RunSqlInput, SqlToolHandler,
};
