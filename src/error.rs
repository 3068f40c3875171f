//! Error types for the MySQL gateway.
//!
//! All fallible operations in the crate return [`GatewayError`] via the
//! [`GatewayResult`] alias. Variants map one-to-one onto the failure modes a
//! caller can observe: request-shape problems, missing databases, transport
//! trouble, capacity exhaustion, statement failures, and failed rollbacks.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Database '{database}' not found")]
    DatabaseNotFound { database: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Connection pool exhausted: no handle became available within {waited:?}")]
    PoolExhausted { waited: Duration },

    #[error("Statement failed: {message}")]
    Statement {
        message: String,
        /// e.g., "42S02" for unknown table
        sql_state: Option<String>,
    },

    #[error(
        "Rollback failed after statement error: {statement_error} (rollback: {rollback_error})"
    )]
    RollbackFailed {
        statement_error: String,
        rollback_error: String,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(database: impl Into<String>) -> Self {
        Self::DatabaseNotFound {
            database: database.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a pool exhausted error.
    pub fn pool_exhausted(waited: Duration) -> Self {
        Self::PoolExhausted { waited }
    }

    /// Create a statement error with optional SQLSTATE code.
    pub fn statement(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Statement {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a rollback failed error, preserving the original statement error.
    pub fn rollback_failed(
        statement_error: impl Into<String>,
        rollback_error: impl Into<String>,
    ) -> Self {
        Self::RollbackFailed {
            statement_error: statement_error.into(),
            rollback_error: rollback_error.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True when the connection backing the failed operation must not be
    /// returned to the pool.
    ///
    /// A failed rollback may have left a transaction open; a transport-level
    /// failure means the socket itself is suspect. Either way the handle is
    /// torn down instead of re-lent.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Self::RollbackFailed { .. } | Self::Connection { .. }
        )
    }
}

/// Convert sqlx errors to GatewayError.
///
/// Statement-level failures (bad SQL, constraint violations) become
/// `Statement`; everything transport-shaped becomes `Connection`.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                GatewayError::statement(db_err.message(), code)
            }
            sqlx::Error::Configuration(msg) => GatewayError::connection(msg.to_string()),
            sqlx::Error::Io(io_err) => GatewayError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => {
                GatewayError::connection(format!("TLS error: {}", tls_err))
            }
            sqlx::Error::Protocol(msg) => {
                GatewayError::connection(format!("Protocol error: {}", msg))
            }
            sqlx::Error::PoolTimedOut => GatewayError::pool_exhausted(Duration::ZERO),
            sqlx::Error::PoolClosed => GatewayError::connection("Connection pool is closed"),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => GatewayError::internal(
                format!("Column index {} out of bounds (len: {})", index, len),
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                GatewayError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                GatewayError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => GatewayError::internal("Database worker crashed"),
            _ => GatewayError::internal(format!("Unexpected database error: {}", err)),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Convert GatewayError to MCP ErrorData for semantic error categorization.
impl From<GatewayError> for rmcp::ErrorData {
    fn from(err: GatewayError) -> Self {
        match &err {
            // Request-shape and statement problems -> invalid_params
            GatewayError::InvalidRequest { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), None)
            }
            GatewayError::Statement { message, sql_state } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, None)
            }

            // Missing databases -> resource_not_found
            GatewayError::DatabaseNotFound { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), None)
            }

            // Transport / capacity / invariant failures -> internal_error
            GatewayError::Connection { .. }
            | GatewayError::PoolExhausted { .. }
            | GatewayError::RollbackFailed { .. }
            | GatewayError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}
