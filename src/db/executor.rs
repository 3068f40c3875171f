//! Statement execution.
//!
//! Reads run directly and fetch every row. Writes run inside an explicit
//! transaction: begin, execute, commit. When the statement or the commit
//! fails the transaction is rolled back before the error propagates, so a
//! failed write leaves the database exactly as it was. A rollback that also
//! fails is a different animal: the session may have a transaction still
//! open, so it must not go back to the pool. That case is reported as
//! `RollbackFailed`, carrying both errors, and the caller discards the
//! handle.

use tracing::{debug, error};

use crate::db::classifier::StatementKind;
use crate::db::session::{JsonRow, SqlSession};
use crate::error::{GatewayError, GatewayResult};

/// Result of executing one statement.
#[derive(Debug)]
pub enum Execution {
    /// Rows fetched by a read statement.
    Read { rows: Vec<JsonRow> },
    /// Affected-row count reported by a committed write.
    Write { rows_affected: u64 },
}

/// Execute `sql` on `session` according to its classification.
///
/// The session must already be bound to the target database.
pub async fn execute<S: SqlSession>(
    session: &mut S,
    sql: &str,
    kind: StatementKind,
) -> GatewayResult<Execution> {
    match kind {
        StatementKind::Read => {
            let rows = session.fetch_all(sql).await?;
            debug!(row_count = rows.len(), "Read statement completed");
            Ok(Execution::Read { rows })
        }
        StatementKind::Write => execute_write(session, sql).await,
    }
}

async fn execute_write<S: SqlSession>(session: &mut S, sql: &str) -> GatewayResult<Execution> {
    session.begin().await?;

    let rows_affected = match session.execute(sql).await {
        Ok(n) => n,
        Err(statement_error) => {
            if let Err(rollback_error) = session.rollback().await {
                error!(
                    statement_error = %statement_error,
                    rollback_error = %rollback_error,
                    "Rollback failed, connection will be discarded"
                );
                return Err(GatewayError::rollback_failed(
                    statement_error.to_string(),
                    rollback_error.to_string(),
                ));
            }
            return Err(statement_error);
        }
    };

    // A failed commit may leave the transaction open; roll it back so the
    // write's partial effect cannot leak into the next borrower's statements
    if let Err(commit_error) = session.commit().await {
        if let Err(rollback_error) = session.rollback().await {
            error!(
                commit_error = %commit_error,
                rollback_error = %rollback_error,
                "Rollback after failed commit also failed, connection will be discarded"
            );
            return Err(GatewayError::rollback_failed(
                commit_error.to_string(),
                rollback_error.to_string(),
            ));
        }
        return Err(commit_error);
    }

    debug!(rows_affected, "Write statement committed");
    Ok(Execution::Write { rows_affected })
}
