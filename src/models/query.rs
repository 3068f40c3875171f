//! Query-related data models.
//!
//! [`QueryRequest`] is what callers hand the gateway; [`QueryOutcome`] is
//! what they always get back, fault or not. [`QueryReport`] is the outcome
//! flattened into the JSON shape the tools return.

use serde::{Deserialize, Serialize};

use crate::db::session::JsonRow;
use crate::error::{GatewayError, GatewayResult};

/// One unit of work for the gateway: a statement and the database to run
/// it against.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryRequest {
    /// Target database name. Required; there is no default database.
    pub database: String,
    /// The SQL statement to execute.
    pub sql: String,
}

impl QueryRequest {
    /// Create a new query request.
    pub fn new(database: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            sql: sql.into(),
        }
    }

    /// Reject empty fields before any connection is touched.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.database.trim().is_empty() {
            return Err(GatewayError::invalid_request(
                "database must not be empty",
            ));
        }
        if self.sql.trim().is_empty() {
            return Err(GatewayError::invalid_request("SQL must not be empty"));
        }
        Ok(())
    }
}

/// What happened to one request. The gateway never raises; every failure is
/// folded into the `Error` variant with the request echoed back.
#[derive(Debug)]
pub enum QueryOutcome {
    /// A read statement completed; `rows` is always present, possibly empty.
    Read {
        database: String,
        rows: Vec<JsonRow>,
    },
    /// A write statement committed.
    Write {
        database: String,
        rows_affected: u64,
    },
    /// The request failed at some stage; `sql` echoes the offending statement.
    Error {
        database: String,
        sql: String,
        message: String,
    },
}

impl QueryOutcome {
    /// Fold a gateway failure into an error outcome.
    pub fn from_error(request: &QueryRequest, error: &GatewayError) -> Self {
        Self::Error {
            database: request.database.clone(),
            sql: request.sql.clone(),
            message: error.to_string(),
        }
    }

    /// Convert into the serializable report shape.
    pub fn into_report(self) -> QueryReport {
        match self {
            Self::Read { database, rows } => QueryReport {
                status: "success".into(),
                database,
                row_count: Some(rows.len()),
                data: Some(rows),
                affected_rows: None,
                error: None,
                query: None,
            },
            Self::Write {
                database,
                rows_affected,
            } => QueryReport {
                status: "success".into(),
                database,
                data: None,
                row_count: None,
                affected_rows: Some(rows_affected),
                error: None,
                query: None,
            },
            Self::Error {
                database,
                sql,
                message,
            } => QueryReport {
                status: "error".into(),
                database,
                data: None,
                row_count: None,
                affected_rows: None,
                error: Some(message),
                query: Some(sql),
            },
        }
    }
}

/// Serializable per-request report.
///
/// Exactly one of the three field groups is populated:
/// reads carry `data` + `row_count`, writes carry `affected_rows`, and
/// failures carry `error` + the echoed `query`.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct QueryReport {
    /// "success" or "error"
    pub status: String,
    /// The database the request targeted.
    pub database: String,
    /// Result rows for read statements. Present (possibly empty) iff the
    /// request was a successful read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<JsonRow>>,
    /// Number of rows in `data`. Always equals `data.len()` when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Affected-row count for committed writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The statement that failed, echoed for diagnosis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}
